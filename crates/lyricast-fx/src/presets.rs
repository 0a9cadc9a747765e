//! Built-in effect presets.

use crate::effect::EffectType;
use crate::param_map;
use crate::params::ParamMap;

#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Vec<(EffectType, ParamMap)>,
}

impl Preset {
    /// Layers in composite order, as (type, parameter overrides).
    pub fn layers(&self) -> Vec<(EffectType, ParamMap)> {
        (self.build)()
    }
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "karaoke_classic",
        description: "Black outline with a soft yellow glow",
        build: || {
            vec![
                (
                    EffectType::Outline,
                    param_map! { "width" => 3.0, "color" => vec![0.0, 0.0, 0.0], "softness" => 0.3 },
                ),
                (
                    EffectType::Glow,
                    param_map! { "radius" => 4.0, "intensity" => 0.6, "color" => vec![1.0, 1.0, 0.0] },
                ),
            ]
        },
    },
    Preset {
        name: "neon_style",
        description: "Bright cyan glow over a thin blue outline",
        build: || {
            vec![
                (
                    EffectType::Glow,
                    param_map! { "radius" => 8.0, "intensity" => 1.0, "color" => vec![0.0, 1.0, 1.0] },
                ),
                (
                    EffectType::Outline,
                    param_map! { "width" => 1.0, "color" => vec![0.0, 0.5, 1.0], "softness" => 0.8 },
                ),
            ]
        },
    },
    Preset {
        name: "dramatic_shadow",
        description: "Heavy drop shadow with a white outline",
        build: || {
            vec![
                (
                    EffectType::Shadow,
                    param_map! {
                        "offset_x" => 5.0,
                        "offset_y" => 5.0,
                        "blur_radius" => 3.0,
                        "color" => vec![0.0, 0.0, 0.0],
                        "opacity" => 0.8,
                    },
                ),
                (
                    EffectType::Outline,
                    param_map! { "width" => 2.0, "color" => vec![1.0, 1.0, 1.0], "softness" => 0.2 },
                ),
            ]
        },
    },
    Preset {
        name: "karaoke_neon",
        description: "Flickering neon tube",
        build: || {
            vec![(
                EffectType::Neon,
                param_map! {
                    "glow_color" => vec![0.0, 1.0, 1.0, 1.0],
                    "glow_radius" => 15.0,
                    "glow_intensity" => 2.5,
                    "flicker_enabled" => true,
                },
            )]
        },
    },
    Preset {
        name: "movie_classic",
        description: "Plain subtitle with a soft shadow",
        build: || {
            vec![(
                EffectType::Shadow,
                param_map! {
                    "offset_x" => 2.0,
                    "offset_y" => 2.0,
                    "blur_radius" => 2.0,
                    "color" => vec![0.0, 0.0, 0.0, 0.8],
                },
            )]
        },
    },
    Preset {
        name: "gaming_fire",
        description: "Animated flames with a black outline",
        build: || {
            vec![
                (
                    EffectType::Fire,
                    param_map! { "flame_height" => 25.0, "animation_speed" => 4.0, "turbulence" => 0.7 },
                ),
                (
                    EffectType::Outline,
                    param_map! { "width" => 2.0, "color" => vec![0.0, 0.0, 0.0, 1.0] },
                ),
            ]
        },
    },
    Preset {
        name: "elegant_gold",
        description: "Gold metal with a long soft shadow",
        build: || {
            vec![
                (
                    EffectType::Metal,
                    param_map! { "metal_type" => "gold", "reflection_strength" => 0.6 },
                ),
                (
                    EffectType::Shadow,
                    param_map! {
                        "offset_x" => 3.0,
                        "offset_y" => 3.0,
                        "blur_radius" => 4.0,
                        "color" => vec![0.0, 0.0, 0.0, 0.5],
                    },
                ),
            ]
        },
    },
];

pub fn all() -> &'static [Preset] {
    PRESETS
}

pub fn find(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name)
}

pub fn names() -> Vec<&'static str> {
    PRESETS.iter().map(|p| p.name).collect()
}
