use serde::{Deserialize, Serialize};

use crate::params::*;

/// Every effect kind a layer can hold, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Glow,
    Outline,
    Shadow,
    Fade,
    Bounce,
    Wave,
    ColorTransition,
    Typewriter,
    Neon,
    Fire,
    Ice,
    Metal,
    Glass,
    Rainbow,
}

impl EffectType {
    pub const ALL: [EffectType; 14] = [
        EffectType::Glow,
        EffectType::Outline,
        EffectType::Shadow,
        EffectType::Fade,
        EffectType::Bounce,
        EffectType::Wave,
        EffectType::ColorTransition,
        EffectType::Typewriter,
        EffectType::Neon,
        EffectType::Fire,
        EffectType::Ice,
        EffectType::Metal,
        EffectType::Glass,
        EffectType::Rainbow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectType::Glow => "glow",
            EffectType::Outline => "outline",
            EffectType::Shadow => "shadow",
            EffectType::Fade => "fade",
            EffectType::Bounce => "bounce",
            EffectType::Wave => "wave",
            EffectType::ColorTransition => "color_transition",
            EffectType::Typewriter => "typewriter",
            EffectType::Neon => "neon",
            EffectType::Fire => "fire",
            EffectType::Ice => "ice",
            EffectType::Metal => "metal",
            EffectType::Glass => "glass",
            EffectType::Rainbow => "rainbow",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Human readable name for editor lists.
    pub fn label(&self) -> &'static str {
        match self {
            EffectType::Glow => "Glow",
            EffectType::Outline => "Outline",
            EffectType::Shadow => "Drop Shadow",
            EffectType::Fade => "Fade In/Out",
            EffectType::Bounce => "Bounce",
            EffectType::Wave => "Wave",
            EffectType::ColorTransition => "Color Transition",
            EffectType::Typewriter => "Typewriter",
            EffectType::Neon => "Neon",
            EffectType::Fire => "Fire",
            EffectType::Ice => "Ice",
            EffectType::Metal => "Metal",
            EffectType::Glass => "Glass",
            EffectType::Rainbow => "Rainbow",
        }
    }

    /// Whether the shader generator has a code path for this type.
    /// The advanced material effects are CPU-composited only.
    pub fn has_shader_code(&self) -> bool {
        !matches!(
            self,
            EffectType::Neon
                | EffectType::Fire
                | EffectType::Ice
                | EffectType::Metal
                | EffectType::Glass
                | EffectType::Rainbow
        )
    }

    /// Animation effects move or reveal glyphs instead of recoloring them.
    pub fn is_animation(&self) -> bool {
        matches!(
            self,
            EffectType::Bounce | EffectType::Wave | EffectType::Typewriter
        )
    }
}

impl std::fmt::Display for EffectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed parameters, one variant per effect type.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectParams {
    Glow(GlowParams),
    Outline(OutlineParams),
    Shadow(ShadowParams),
    Fade(FadeParams),
    Bounce(BounceParams),
    Wave(WaveParams),
    ColorTransition(ColorTransitionParams),
    Typewriter(TypewriterParams),
    Neon(NeonParams),
    Fire(FireParams),
    Ice(IceParams),
    Metal(MetalParams),
    Glass(GlassParams),
    Rainbow(RainbowParams),
}

macro_rules! each_params {
    ($value:expr, $p:ident => $body:expr) => {
        match $value {
            EffectParams::Glow($p) => $body,
            EffectParams::Outline($p) => $body,
            EffectParams::Shadow($p) => $body,
            EffectParams::Fade($p) => $body,
            EffectParams::Bounce($p) => $body,
            EffectParams::Wave($p) => $body,
            EffectParams::ColorTransition($p) => $body,
            EffectParams::Typewriter($p) => $body,
            EffectParams::Neon($p) => $body,
            EffectParams::Fire($p) => $body,
            EffectParams::Ice($p) => $body,
            EffectParams::Metal($p) => $body,
            EffectParams::Glass($p) => $body,
            EffectParams::Rainbow($p) => $body,
        }
    };
}

impl EffectParams {
    /// Type-specific defaults.
    pub fn defaults(effect_type: EffectType) -> Self {
        match effect_type {
            EffectType::Glow => EffectParams::Glow(Default::default()),
            EffectType::Outline => EffectParams::Outline(Default::default()),
            EffectType::Shadow => EffectParams::Shadow(Default::default()),
            EffectType::Fade => EffectParams::Fade(Default::default()),
            EffectType::Bounce => EffectParams::Bounce(Default::default()),
            EffectType::Wave => EffectParams::Wave(Default::default()),
            EffectType::ColorTransition => EffectParams::ColorTransition(Default::default()),
            EffectType::Typewriter => EffectParams::Typewriter(Default::default()),
            EffectType::Neon => EffectParams::Neon(Default::default()),
            EffectType::Fire => EffectParams::Fire(Default::default()),
            EffectType::Ice => EffectParams::Ice(Default::default()),
            EffectType::Metal => EffectParams::Metal(Default::default()),
            EffectType::Glass => EffectParams::Glass(Default::default()),
            EffectType::Rainbow => EffectParams::Rainbow(Default::default()),
        }
    }

    pub fn effect_type(&self) -> EffectType {
        match self {
            EffectParams::Glow(_) => EffectType::Glow,
            EffectParams::Outline(_) => EffectType::Outline,
            EffectParams::Shadow(_) => EffectType::Shadow,
            EffectParams::Fade(_) => EffectType::Fade,
            EffectParams::Bounce(_) => EffectType::Bounce,
            EffectParams::Wave(_) => EffectType::Wave,
            EffectParams::ColorTransition(_) => EffectType::ColorTransition,
            EffectParams::Typewriter(_) => EffectType::Typewriter,
            EffectParams::Neon(_) => EffectType::Neon,
            EffectParams::Fire(_) => EffectType::Fire,
            EffectParams::Ice(_) => EffectType::Ice,
            EffectParams::Metal(_) => EffectType::Metal,
            EffectParams::Glass(_) => EffectType::Glass,
            EffectParams::Rainbow(_) => EffectType::Rainbow,
        }
    }

    pub fn keys(&self) -> &'static [&'static str] {
        each_params!(self, p => p.keys())
    }

    pub fn set(&mut self, key: &str, value: &ParamValue) -> Assign {
        each_params!(self, p => p.set(key, value))
    }

    pub fn get(&self, key: &str) -> Option<ParamValue> {
        each_params!(self, p => p.get(key))
    }

    pub fn to_map(&self) -> ParamMap {
        each_params!(self, p => p.to_map())
    }

    /// Sub-feature toggles that change generated shader code.
    pub fn variant_flags(&self) -> u32 {
        match self {
            EffectParams::Glow(g) if g.inner => 1,
            _ => 0,
        }
    }
}
