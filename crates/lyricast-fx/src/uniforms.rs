//! Uniform values for the generated shaders at a point in time.

use std::collections::BTreeMap;

use lyricast_core::Color;

use crate::animation;
use crate::effect::EffectParams;
use crate::stack::EffectLayer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    Bool(bool),
}

fn vec3(c: Color) -> UniformValue {
    UniformValue::Vec3([c.r, c.g, c.b])
}

/// Timing of the line being drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformContext {
    /// Absolute playback time in seconds.
    pub time: f64,
    /// Seconds since the line became visible.
    pub line_time: f64,
    pub line_duration: f64,
    pub char_count: usize,
}

pub type UniformMap = BTreeMap<String, UniformValue>;

fn put(out: &mut UniformMap, name: &str, value: UniformValue) {
    out.entry(name.to_string()).or_insert(value);
}

/// Uniform values for the enabled layers. When a type appears more than once
/// the first layer wins, matching the generated shader.
pub fn uniforms(active: &[&EffectLayer], ctx: &UniformContext) -> UniformMap {
    let mut out = UniformMap::new();
    put(&mut out, "time", UniformValue::Float(ctx.time as f32));

    for layer in active {
        let t = ctx.line_time;
        match &layer.params {
            EffectParams::Glow(p) => {
                put(&mut out, "enableGlow", UniformValue::Bool(true));
                put(&mut out, "glowColor", vec3(p.color));
                put(&mut out, "glowRadius", UniformValue::Float(p.radius as f32));
                put(&mut out, "glowIntensity", UniformValue::Float(p.intensity as f32));
                put(&mut out, "glowFalloff", UniformValue::Float(p.falloff as f32));
            }
            EffectParams::Outline(p) => {
                put(&mut out, "enableOutline", UniformValue::Bool(true));
                put(&mut out, "outlineColor", vec3(p.color));
                put(&mut out, "outlineWidth", UniformValue::Float(p.width as f32));
                put(&mut out, "outlineSoftness", UniformValue::Float(p.softness as f32));
                put(&mut out, "outlineQuality", UniformValue::Int(p.quality.min(32) as i32));
            }
            EffectParams::Shadow(p) => {
                put(&mut out, "enableShadow", UniformValue::Bool(true));
                put(&mut out, "shadowColor", vec3(p.color));
                put(
                    &mut out,
                    "shadowOffset",
                    UniformValue::Vec2([p.offset_x as f32, p.offset_y as f32]),
                );
                put(&mut out, "shadowBlur", UniformValue::Float(p.blur_radius as f32));
                put(&mut out, "shadowOpacity", UniformValue::Float(p.opacity as f32));
            }
            EffectParams::Fade(p) => {
                let alpha = animation::fade_alpha(p, t, ctx.line_duration);
                put(&mut out, "fadeAlpha", UniformValue::Float(alpha as f32));
            }
            EffectParams::Bounce(p) => {
                put(&mut out, "bounceAmplitude", UniformValue::Float(p.amplitude as f32));
                put(&mut out, "bounceFrequency", UniformValue::Float(p.frequency as f32));
                put(&mut out, "bounceDamping", UniformValue::Float(p.damping as f32));
            }
            EffectParams::Wave(p) => {
                put(&mut out, "waveAmplitude", UniformValue::Float(p.amplitude as f32));
                put(&mut out, "waveFrequency", UniformValue::Float(p.frequency as f32));
                put(&mut out, "waveSpeed", UniformValue::Float(p.speed as f32));
            }
            EffectParams::ColorTransition(p) => {
                put(&mut out, "transitionStartColor", vec3(p.start_color));
                put(&mut out, "transitionEndColor", vec3(p.end_color));
                let progress = animation::transition_progress(p, t);
                put(&mut out, "transitionProgress", UniformValue::Float(progress as f32));
            }
            EffectParams::Typewriter(p) => {
                let visible = animation::typewriter_visible(p, t, ctx.char_count);
                put(
                    &mut out,
                    "typewriterVisibleChars",
                    UniformValue::Float(visible as f32),
                );
            }
            // CPU-only material effects have no uniforms
            _ => {}
        }
    }
    out
}
