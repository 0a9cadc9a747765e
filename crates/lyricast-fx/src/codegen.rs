//! GLSL source generation for the live preview.
//!
//! Output depends only on which effect types are active, their sub-feature
//! flags and their order; parameter values travel as uniforms. Uniform
//! declarations are emitted in canonical type order and composition steps
//! in layer order. Types without shader code are skipped.

use lyricast_core::hash::{hash_shader, ContentHash};

use crate::effect::EffectType;
use crate::stack::EffectLayer;

/// A vertex/fragment shader pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    /// Content fingerprint, usable as a compiled-program cache key.
    pub fn fingerprint(&self) -> ContentHash {
        hash_shader(&self.vertex, &self.fragment)
    }
}

/// One composition step: an effect type plus its sub-feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    effect_type: EffectType,
    flags: u32,
}

const GLOW_INNER: u32 = 1;

/// Distinct shader-backed types in first-occurrence layer order.
fn plan(active: &[&EffectLayer]) -> Vec<Step> {
    let mut steps: Vec<Step> = Vec::new();
    for layer in active {
        let effect_type = layer.effect_type();
        if !effect_type.has_shader_code() {
            continue;
        }
        if steps.iter().any(|s| s.effect_type == effect_type) {
            continue;
        }
        steps.push(Step {
            effect_type,
            flags: layer.params.variant_flags(),
        });
    }
    steps
}

fn has(steps: &[Step], effect_type: EffectType) -> bool {
    steps.iter().any(|s| s.effect_type == effect_type)
}

/// Generate shader source for the given enabled layers (in composite order).
pub fn generate(active: &[&EffectLayer]) -> ShaderSource {
    let steps = plan(active);
    ShaderSource {
        vertex: vertex_source(&steps),
        fragment: fragment_source(&steps),
    }
}

fn vertex_source(steps: &[Step]) -> String {
    let mut src = String::with_capacity(1024);
    src.push_str(
        "#version 330 core
layout(location = 0) in vec2 position;
layout(location = 1) in vec2 texCoord;
layout(location = 2) in float charIndex;

uniform mat4 projection;
uniform mat4 model;
uniform float time;
uniform vec2 textSize;
",
    );

    for effect_type in EffectType::ALL {
        if !has(steps, effect_type) {
            continue;
        }
        match effect_type {
            EffectType::Bounce => src.push_str(
                "uniform float bounceAmplitude;
uniform float bounceFrequency;
uniform float bounceDamping;
",
            ),
            EffectType::Wave => src.push_str(
                "uniform float waveAmplitude;
uniform float waveFrequency;
uniform float waveSpeed;
",
            ),
            EffectType::Typewriter => src.push_str("uniform float typewriterVisibleChars;\n"),
            _ => {}
        }
    }

    src.push_str(
        "
out vec2 vTexCoord;
out float vCharVisible;

void main() {
    vec2 pos = position;
    vCharVisible = 1.0;
",
    );

    for step in steps {
        match step.effect_type {
            EffectType::Bounce => src.push_str(
                "    pos.y += bounceAmplitude * sin(time * bounceFrequency * 6.2831853) * exp(-bounceDamping * time);\n",
            ),
            EffectType::Wave => src.push_str(
                "    pos.y += waveAmplitude * sin(time * waveSpeed * 6.2831853 + position.x * waveFrequency * 0.1);\n",
            ),
            EffectType::Typewriter => {
                src.push_str("    vCharVisible = step(charIndex + 0.5, typewriterVisibleChars);\n")
            }
            _ => {}
        }
    }

    src.push_str(
        "    vTexCoord = texCoord;
    gl_Position = projection * model * vec4(pos, 0.0, 1.0);
}
",
    );
    src
}

fn fragment_source(steps: &[Step]) -> String {
    let mut src = String::with_capacity(4096);
    src.push_str(
        "#version 330 core
in vec2 vTexCoord;
in float vCharVisible;
out vec4 fragColor;

uniform sampler2D textTexture;
uniform vec2 textSize;
uniform vec4 textColor;
uniform float time;
",
    );

    for effect_type in EffectType::ALL {
        if !has(steps, effect_type) {
            continue;
        }
        match effect_type {
            EffectType::Glow => src.push_str(
                "
uniform bool enableGlow;
uniform vec3 glowColor;
uniform float glowRadius;
uniform float glowIntensity;
uniform float glowFalloff;
",
            ),
            EffectType::Outline => src.push_str(
                "
uniform bool enableOutline;
uniform vec3 outlineColor;
uniform float outlineWidth;
uniform float outlineSoftness;
uniform int outlineQuality;
",
            ),
            EffectType::Shadow => src.push_str(
                "
uniform bool enableShadow;
uniform vec3 shadowColor;
uniform vec2 shadowOffset;
uniform float shadowBlur;
uniform float shadowOpacity;
",
            ),
            EffectType::Fade => src.push_str(
                "
uniform float fadeAlpha;
",
            ),
            EffectType::ColorTransition => src.push_str(
                "
uniform vec3 transitionStartColor;
uniform vec3 transitionEndColor;
uniform float transitionProgress;
",
            ),
            _ => {}
        }
    }

    src.push_str(
        "
float sampleMask(vec2 uv) {
    return texture(textTexture, uv).a;
}
",
    );

    if has(steps, EffectType::Glow) || has(steps, EffectType::Shadow) {
        src.push_str(
            "
float gaussianBlur(vec2 uv, float radius) {
    vec2 texel = 1.0 / textSize;
    float total = 0.0;
    float weightSum = 0.0;
    for (int x = -4; x <= 4; x++) {
        for (int y = -4; y <= 4; y++) {
            vec2 offset = vec2(float(x), float(y)) * texel * radius * 0.25;
            float w = exp(-float(x * x + y * y) / 8.0);
            total += sampleMask(uv + offset) * w;
            weightSum += w;
        }
    }
    return total / weightSum;
}
",
        );
    }

    if has(steps, EffectType::Outline) {
        src.push_str(
            "
float dilateMask(vec2 uv, float width, int quality) {
    vec2 texel = 1.0 / textSize;
    float m = sampleMask(uv);
    for (int i = 0; i < 32; i++) {
        if (i >= quality) break;
        float angle = 6.2831853 * float(i) / float(quality);
        for (float r = 1.0; r <= width; r += 1.0) {
            m = max(m, sampleMask(uv + vec2(cos(angle), sin(angle)) * texel * r));
        }
    }
    return m;
}
",
        );
    }

    src.push_str(
        "
void main() {
    float text = sampleMask(vTexCoord) * vCharVisible;
    vec4 color = vec4(textColor.rgb, textColor.a * text);
",
    );

    for step in steps {
        match step.effect_type {
            EffectType::Shadow => src.push_str(
                "
    // shadow
    if (enableShadow) {
        float shadowSample = gaussianBlur(vTexCoord - shadowOffset / textSize, shadowBlur);
        if (shadowSample > 0.1 && text < 0.1) {
            color.rgb = mix(color.rgb, shadowColor, shadowOpacity);
            color.a = max(color.a, shadowSample * shadowOpacity);
        }
    }
",
            ),
            EffectType::Outline => src.push_str(
                "
    // outline
    if (enableOutline) {
        float outlineMask = dilateMask(vTexCoord, outlineWidth, outlineQuality);
        float edge = smoothstep(0.1, 0.1 + outlineSoftness, outlineMask);
        if (outlineMask > 0.1 && text < 0.1) {
            color.rgb = mix(color.rgb, outlineColor, edge);
            color.a = max(color.a, edge);
        }
    }
",
            ),
            EffectType::Glow if step.flags & GLOW_INNER != 0 => src.push_str(
                "
    // inner glow
    if (enableGlow) {
        float inner = clamp((1.0 - gaussianBlur(vTexCoord, glowRadius)) * glowIntensity, 0.0, 1.0);
        color.rgb = mix(color.rgb, glowColor, inner * text);
    }
",
            ),
            EffectType::Glow => src.push_str(
                "
    // glow
    if (enableGlow) {
        float glowMask = pow(gaussianBlur(vTexCoord, glowRadius), glowFalloff) * glowIntensity;
        color.rgb = mix(color.rgb, glowColor, clamp(glowMask * 0.5, 0.0, 1.0) * (1.0 - text));
        color.a = max(color.a, clamp(glowMask, 0.0, 1.0));
    }
",
            ),
            EffectType::ColorTransition => src.push_str(
                "
    // color transition
    vec3 transitionColor = mix(transitionStartColor, transitionEndColor, transitionProgress);
    color.rgb = mix(color.rgb, transitionColor, text);
",
            ),
            EffectType::Fade => src.push_str(
                "
    // fade
    color.a *= fadeAlpha;
",
            ),
            _ => {}
        }
    }

    src.push_str(
        "
    fragColor = color;
}
",
    );
    src
}
