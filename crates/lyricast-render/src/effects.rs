//! CPU effect compositing.
//!
//! Mirrors the generated fragment shader pixel for pixel for the shader-backed
//! effect types, and approximates the material effects (neon, fire, ice, metal,
//! glass, rainbow) with simple blends. Layers are applied in composite order;
//! each layer's result is folded into the running canvas through the layer's
//! blend mode and opacity.

use std::collections::HashMap;
use std::f64::consts::TAU;

use lyricast_core::{BlendMode, Color};
use lyricast_fx::animation;
use lyricast_fx::params::{
    ColorTransitionParams, FireParams, GlassParams, GlowParams, IceParams, MetalParams,
    NeonParams, OutlineParams, RainbowDirection, RainbowParams, ShadowParams,
};
use lyricast_fx::{EffectLayer, EffectParams, EffectType};

use crate::blur::gaussian_blur;
use crate::mask::{AlphaMask, Canvas};
use crate::text::RasterizedText;

/// Timing of the line being composited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectContext {
    /// Absolute playback time.
    pub time: f64,
    /// Seconds since the line appeared.
    pub line_time: f64,
    pub line_duration: f64,
}

/// Geometry after the animation effects ran.
#[derive(Debug, Clone)]
pub struct Motion {
    pub mask: AlphaMask,
    /// Whole-line vertical offset in pixels, screen space (down is positive).
    pub offset_y: i32,
}

/// Apply typewriter, wave and bounce. Only the first layer of each type
/// counts, as in the vertex shader.
pub fn apply_motion(layers: &[&EffectLayer], text: &RasterizedText, ctx: &EffectContext) -> Motion {
    let mut mask = text.mask.clone();
    let mut offset_y = 0;
    let mut seen: Vec<EffectType> = Vec::new();

    for layer in layers {
        let effect_type = layer.effect_type();
        if !effect_type.is_animation() || seen.contains(&effect_type) {
            continue;
        }
        seen.push(effect_type);
        let t = ctx.line_time;
        match &layer.params {
            EffectParams::Typewriter(p) => {
                let visible = animation::typewriter_visible(p, t, text.char_count());
                if let Some(&(x0, _)) = text.char_spans.get(visible) {
                    mask.clear_columns(x0, mask.width as i32);
                }
            }
            EffectParams::Wave(p) => {
                let pad = text.padding as f64;
                mask = mask.displace_columns(|x| {
                    -animation::wave_offset(p, t, x as f64 - pad).round() as i32
                });
            }
            EffectParams::Bounce(p) => {
                // clamped to the frame by the caller
                offset_y = shift(-animation::bounce_offset(p, t), i32::MAX);
            }
            _ => {}
        }
    }
    Motion { mask, offset_y }
}

/// Blurred copies of the text mask, shared by the layers of one line.
struct Blurs<'a> {
    mask: &'a AlphaMask,
    cache: HashMap<u32, AlphaMask>,
}

impl<'a> Blurs<'a> {
    fn new(mask: &'a AlphaMask) -> Self {
        Self {
            mask,
            cache: HashMap::new(),
        }
    }

    fn get(&mut self, radius: f64) -> &AlphaMask {
        let radius = radius.max(0.0) as f32;
        self.cache
            .entry(radius.to_bits())
            .or_insert_with(|| gaussian_blur(self.mask, radius))
    }
}

/// Round a pixel shift and keep it within `reach`.
#[inline]
fn shift(v: f64, reach: i32) -> i32 {
    (v.round() as i32).clamp(-reach, reach)
}

#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn mix_rgb(px: &mut [f32; 4], c: Color, t: f32) {
    px[0] = mix(px[0], c.r, t);
    px[1] = mix(px[1], c.g, t);
    px[2] = mix(px[2], c.b, t);
}

#[inline]
fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Composite all enabled layers over the text fill.
pub fn composite(
    layers: &[&EffectLayer],
    mask: &AlphaMask,
    fill: Canvas,
    ctx: &EffectContext,
) -> Canvas {
    let mut blurs = Blurs::new(mask);
    let mut state = fill;
    for layer in layers {
        let Some(out) = apply_layer(layer, &state, mask, &mut blurs, ctx) else {
            continue;
        };
        state = fold(state, out, layer.blend_mode, layer.opacity);
    }
    state
}

fn fold(state: Canvas, out: Canvas, mode: BlendMode, opacity: f32) -> Canvas {
    if mode == BlendMode::Normal && opacity >= 1.0 {
        return out;
    }
    let o = opacity.clamp(0.0, 1.0);
    let mut result = state;
    for (s, e) in result.pixels.iter_mut().zip(&out.pixels) {
        for c in 0..3 {
            s[c] = mix(s[c], mode.blend_channel(s[c], e[c]), o);
        }
        s[3] = mix(s[3], e[3], o);
    }
    result
}

fn apply_layer(
    layer: &EffectLayer,
    state: &Canvas,
    mask: &AlphaMask,
    blurs: &mut Blurs<'_>,
    ctx: &EffectContext,
) -> Option<Canvas> {
    let mut out = state.clone();
    let t = ctx.line_time;
    match &layer.params {
        EffectParams::Shadow(p) => shadow(&mut out, mask, blurs, p),
        EffectParams::Outline(p) => outline(&mut out, mask, p),
        EffectParams::Glow(p) => glow(&mut out, mask, blurs, p),
        EffectParams::ColorTransition(p) => color_transition(&mut out, mask, p, t),
        EffectParams::Fade(p) => {
            let alpha = animation::fade_alpha(p, t, ctx.line_duration) as f32;
            for px in &mut out.pixels {
                px[3] *= alpha;
            }
        }
        EffectParams::Neon(p) => neon(&mut out, mask, blurs, p, t),
        EffectParams::Fire(p) => fire(&mut out, mask, blurs, p, t),
        EffectParams::Ice(p) => ice(&mut out, mask, p, t),
        EffectParams::Metal(p) => metal(&mut out, mask, p),
        EffectParams::Glass(p) => glass(&mut out, mask, p),
        EffectParams::Rainbow(p) => rainbow(&mut out, mask, p, t),
        EffectParams::Bounce(_) | EffectParams::Wave(_) | EffectParams::Typewriter(_) => {
            return None
        }
    }
    Some(out)
}

fn for_each_pixel(out: &mut Canvas, mut f: impl FnMut(i32, i32, &mut [f32; 4])) {
    let w = out.width as usize;
    for (i, px) in out.pixels.iter_mut().enumerate() {
        f((i % w) as i32, (i / w) as i32, px);
    }
}

fn shadow(out: &mut Canvas, mask: &AlphaMask, blurs: &mut Blurs<'_>, p: &ShadowParams) {
    let blurred = blurs.get(p.blur_radius);
    let reach = mask.reach();
    let (ox, oy) = (shift(p.offset_x, reach), shift(p.offset_y, reach));
    let opacity = p.opacity as f32;
    for_each_pixel(out, |x, y, px| {
        let s = blurred.sample(x - ox, y - oy);
        let text = mask.sample(x, y);
        if s > 0.1 && text < 0.1 {
            mix_rgb(px, p.color, opacity);
            px[3] = px[3].max(s * opacity);
        }
    });
}

fn outline(out: &mut Canvas, mask: &AlphaMask, p: &OutlineParams) {
    let dilated = mask.dilate(p.width as f32, p.quality.min(32));
    let softness = (p.softness as f32).max(1e-3);
    for_each_pixel(out, |x, y, px| {
        let m = dilated.sample(x, y);
        let text = mask.sample(x, y);
        if m > 0.1 && text < 0.1 {
            let edge = smoothstep(0.1, 0.1 + softness, m);
            mix_rgb(px, p.color, edge);
            px[3] = px[3].max(edge);
        }
    });
}

fn glow(out: &mut Canvas, mask: &AlphaMask, blurs: &mut Blurs<'_>, p: &GlowParams) {
    let blurred = blurs.get(p.radius);
    let intensity = p.intensity as f32;
    if p.inner {
        for_each_pixel(out, |x, y, px| {
            let text = mask.sample(x, y);
            let inner = ((1.0 - blurred.sample(x, y)) * intensity).clamp(0.0, 1.0);
            mix_rgb(px, p.color, inner * text);
        });
        return;
    }
    let falloff = p.falloff as f32;
    for_each_pixel(out, |x, y, px| {
        let text = mask.sample(x, y);
        let g = blurred.sample(x, y).powf(falloff) * intensity;
        mix_rgb(px, p.color, (g * 0.5).clamp(0.0, 1.0) * (1.0 - text));
        px[3] = px[3].max(g.clamp(0.0, 1.0));
    });
}

fn color_transition(out: &mut Canvas, mask: &AlphaMask, p: &ColorTransitionParams, t: f64) {
    let progress = animation::transition_progress(p, t) as f32;
    let target = p.start_color.lerp(&p.end_color, progress);
    for_each_pixel(out, |x, y, px| {
        mix_rgb(px, target, mask.sample(x, y));
    });
}

fn neon(out: &mut Canvas, mask: &AlphaMask, blurs: &mut Blurs<'_>, p: &NeonParams, t: f64) {
    let flicker = if p.flicker_enabled {
        1.0 - p.flicker_intensity * 0.5 * (1.0 + (t * p.flicker_speed * TAU).sin())
    } else {
        1.0
    };
    let intensity = (p.glow_intensity * flicker) as f32;
    let tube = mask.dilate((p.tube_width * 0.5) as f32, 8);
    let blurred = blurs.get(p.glow_radius);
    for_each_pixel(out, |x, y, px| {
        let text = tube.sample(x, y);
        let g = (blurred.sample(x, y) * intensity).clamp(0.0, 1.0);
        mix_rgb(px, p.glow_color, (g * 0.6) * (1.0 - text));
        px[3] = px[3].max(g * p.glow_color.a);
        mix_rgb(px, p.core_color, text);
        px[3] = px[3].max(text);
    });
}

fn heat_color(v: f32) -> Color {
    Color::rgb(1.0, 0.25 + 0.65 * v, 0.1 * v)
}

fn fire(out: &mut Canvas, mask: &AlphaMask, blurs: &mut Blurs<'_>, p: &FireParams, t: f64) {
    let blurred = blurs.get(p.flame_width * 0.25);
    let reach = mask.reach();
    let rise = shift(p.flame_height * 0.3, reach);
    let phase = t * p.animation_speed * TAU;
    let height = out.height.max(1) as f32;
    for_each_pixel(out, |x, y, px| {
        let sway = if p.heat_distortion {
            shift(p.turbulence * 4.0 * (y as f64 * 0.2 + phase).sin(), reach)
        } else {
            0
        };
        let text = mask.sample(x, y);
        let flame = blurred.sample(x + sway, y + rise);
        if text < 0.1 && flame > 0.05 {
            mix_rgb(px, heat_color(flame), (flame * 1.5).clamp(0.0, 1.0));
            px[3] = px[3].max(flame);
        }
        // hotter toward the bottom of the glyphs
        let v = y as f32 / height;
        mix_rgb(px, heat_color(v), text * 0.7);
    });
}

/// Stable per-pixel noise in 0..1.
fn hash_noise(x: i32, y: i32, seed: u32) -> f32 {
    let mut h = (x as u32).wrapping_mul(374_761_393)
        ^ (y as u32).wrapping_mul(668_265_263)
        ^ seed.wrapping_mul(2_246_822_519);
    h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
    (h ^ (h >> 16)) as f32 / u32::MAX as f32
}

fn ice(out: &mut Canvas, mask: &AlphaMask, p: &IceParams, t: f64) {
    let frost = mask.dilate(p.crystal_size as f32, 8);
    let seed = (t * 4.0).floor() as u32;
    let frost_intensity = p.frost_intensity as f32;
    for_each_pixel(out, |x, y, px| {
        let text = mask.sample(x, y);
        let f = frost.sample(x, y);
        if f > 0.1 && text < 0.1 {
            mix_rgb(px, p.ice_color, frost_intensity);
            px[3] = px[3].max(f * p.ice_color.a * 0.5);
        }
        let refract = 1.0 - p.refraction_strength as f32 * 0.3;
        let tinted = Color::rgb(
            p.ice_color.r * refract,
            p.ice_color.g * refract,
            p.ice_color.b,
        );
        mix_rgb(px, tinted, frost_intensity * text);
        if p.sparkle_enabled && text > 0.5 && hash_noise(x, y, seed) < p.sparkle_density as f32 * 0.1
        {
            mix_rgb(px, Color::WHITE, 1.0);
        }
    });
}

fn metal(out: &mut Canvas, mask: &AlphaMask, p: &MetalParams) {
    let base = p.metal_type.base_color();
    let (w, h) = (out.width.max(1) as f32, out.height.max(1) as f32);
    let reflection = p.reflection_strength as f32;
    let roughness = (p.roughness as f32).clamp(0.0, 1.0);
    let metallic = (p.metallic as f32).clamp(0.0, 1.0);
    let anisotropy = p.anisotropy as f32;
    for_each_pixel(out, |x, y, px| {
        let text = mask.sample(x, y);
        if text <= 0.0 {
            return;
        }
        let v = y as f32 / h + anisotropy * (x as f32 / w - 0.5) * 0.5;
        let band = 1.0 - ((v - 0.45).abs() * 2.0).min(1.0);
        let shade = mix(0.55 + 0.45 * band * reflection, 0.75, roughness);
        let shaded = Color::rgb(base.r * shade, base.g * shade, base.b * shade);
        mix_rgb(px, shaded, metallic * text);
    });
}

fn glass(out: &mut Canvas, mask: &AlphaMask, p: &GlassParams) {
    let transparency = (p.transparency as f32).clamp(0.0, 1.0);
    let reach = mask.reach();
    let lip = shift(p.thickness.max(1.0), reach);
    let gloss = 1.0 - (p.surface_roughness as f32).clamp(0.0, 1.0);
    let bend = shift((p.refraction_index - 1.0).max(0.0) * 2.0, reach);
    for_each_pixel(out, |x, y, px| {
        let text = mask.sample(x, y);
        if text <= 0.0 {
            return;
        }
        mix_rgb(px, p.tint_color, 0.5 * text);
        px[3] *= 1.0 - transparency * text;
        // specular rim along the top edge of each glyph
        if text > 0.5 && mask.sample(x + bend, y - lip) < 0.5 {
            mix_rgb(px, Color::WHITE, 0.6 * gloss);
            px[3] = px[3].max(0.8 * gloss);
        }
    });
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Color {
    let h = h.rem_euclid(1.0) * 6.0;
    let i = h.floor();
    let f = h - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i as i32 {
        0 => Color::rgb(v, t, p),
        1 => Color::rgb(q, v, p),
        2 => Color::rgb(p, v, t),
        3 => Color::rgb(p, q, v),
        4 => Color::rgb(t, p, v),
        _ => Color::rgb(v, p, q),
    }
}

fn rainbow(out: &mut Canvas, mask: &AlphaMask, p: &RainbowParams, t: f64) {
    let (w, h) = (out.width.max(1) as f32, out.height.max(1) as f32);
    let shift = if p.cycle_duration > 0.0 {
        (t / p.cycle_duration * p.hue_shift_speed) as f32
    } else {
        0.0
    };
    let width = (p.rainbow_width as f32).max(1e-3);
    let saturation = (p.saturation as f32).clamp(0.0, 1.0);
    let brightness = (p.brightness as f32).clamp(0.0, 1.0);
    for_each_pixel(out, |x, y, px| {
        let text = mask.sample(x, y);
        if text <= 0.0 {
            return;
        }
        let (u, v) = (x as f32 / w, y as f32 / h);
        let pos = match p.direction {
            RainbowDirection::Horizontal => u,
            RainbowDirection::Vertical => v,
            RainbowDirection::Diagonal => (u + v) * 0.5,
            RainbowDirection::Radial => ((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt() * 2.0,
        };
        let c = hsv_to_rgb(pos / width + shift, saturation, brightness);
        mix_rgb(px, c, text);
    });
}
