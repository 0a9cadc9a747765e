//! Parameter values at the boundary between typed effect fields and the
//! loosely typed maps the editor and saved configurations use.

use std::collections::BTreeMap;

use lyricast_core::{Color, Easing};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A single effect parameter as it appears in JSON or an editor form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::List(v)
    }
}

/// Ordered name -> value map. Ordering keeps exported configurations stable.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Build a [`ParamMap`] from `key => value` pairs.
#[macro_export]
macro_rules! param_map {
    () => { $crate::params::ParamMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::params::ParamMap::new();
        $(map.insert(($key).to_string(), $crate::params::ParamValue::from($value));)+
        map
    }};
}

/// Outcome of assigning one key on a typed parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assign {
    Applied,
    /// Not a field of this effect type; the caller keeps it in the extension map.
    Unknown,
    /// A known field given a value of the wrong shape; ignored.
    Mistyped,
}

/// Conversion between a typed field and a [`ParamValue`].
pub trait ParamField: Sized {
    fn from_param(value: &ParamValue) -> Option<Self>;
    fn to_param(&self) -> ParamValue;
}

impl ParamField for f64 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    fn to_param(&self) -> ParamValue {
        ParamValue::Number(*self)
    }
}

impl ParamField for u32 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Number(n) if n.is_finite() && *n >= 0.0 => Some(n.round() as u32),
            _ => None,
        }
    }

    fn to_param(&self) -> ParamValue {
        ParamValue::Number(*self as f64)
    }
}

impl ParamField for bool {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn to_param(&self) -> ParamValue {
        ParamValue::Bool(*self)
    }
}

impl ParamField for Color {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::List(c) if c.len() >= 3 => {
                let c: Vec<f32> = c.iter().map(|v| *v as f32).collect();
                Some(Color::from_slice(&c))
            }
            ParamValue::Text(hex) => Color::from_hex(hex).ok(),
            _ => None,
        }
    }

    fn to_param(&self) -> ParamValue {
        ParamValue::List(self.to_array().iter().map(|v| *v as f64).collect())
    }
}

fn enum_from_text<T: DeserializeOwned>(value: &ParamValue) -> Option<T> {
    match value {
        ParamValue::Text(s) => serde_json::from_value(serde_json::Value::String(s.clone())).ok(),
        _ => None,
    }
}

fn enum_to_text<T: Serialize>(value: &T) -> ParamValue {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => ParamValue::Text(s),
        _ => ParamValue::Text(String::new()),
    }
}

macro_rules! text_enum_field {
    ($($ty:ty),*) => {$(
        impl ParamField for $ty {
            fn from_param(value: &ParamValue) -> Option<Self> {
                enum_from_text(value)
            }

            fn to_param(&self) -> ParamValue {
                enum_to_text(self)
            }
        }
    )*};
}

/// How a color transition moves between its two colors over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    Smooth,
    Pulse,
    Flash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetalKind {
    #[default]
    Chrome,
    Gold,
    Silver,
    Copper,
    Steel,
}

impl MetalKind {
    /// Base tint of the metal surface.
    pub fn base_color(&self) -> Color {
        match self {
            MetalKind::Chrome => Color::rgb(0.85, 0.87, 0.9),
            MetalKind::Gold => Color::rgb(1.0, 0.8, 0.0),
            MetalKind::Silver => Color::rgb(0.75, 0.75, 0.78),
            MetalKind::Copper => Color::rgb(0.72, 0.45, 0.2),
            MetalKind::Steel => Color::rgb(0.55, 0.58, 0.62),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RainbowDirection {
    #[default]
    Horizontal,
    Vertical,
    Diagonal,
    Radial,
}

text_enum_field!(Easing, TransitionKind, MetalKind, RainbowDirection);

/// Declares a typed parameter struct with defaults and key-based access.
macro_rules! effect_params {
    ($(
        $(#[$meta:meta])*
        $name:ident { $($field:ident : $ty:ty = $default:expr),* $(,)? }
    )*) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $(pub $field: $ty),*
        }

        impl Default for $name {
            fn default() -> Self {
                Self { $($field: $default),* }
            }
        }

        impl $name {
            pub const KEYS: &'static [&'static str] = &[$(stringify!($field)),*];

            pub fn keys(&self) -> &'static [&'static str] {
                Self::KEYS
            }

            pub fn set(&mut self, key: &str, value: &ParamValue) -> Assign {
                match key {
                    $(stringify!($field) => match <$ty as ParamField>::from_param(value) {
                        Some(v) => {
                            self.$field = v;
                            Assign::Applied
                        }
                        None => Assign::Mistyped,
                    },)*
                    _ => Assign::Unknown,
                }
            }

            pub fn get(&self, key: &str) -> Option<ParamValue> {
                match key {
                    $(stringify!($field) => Some(self.$field.to_param()),)*
                    _ => None,
                }
            }

            pub fn to_map(&self) -> ParamMap {
                let mut map = ParamMap::new();
                $(map.insert(stringify!($field).to_string(), self.$field.to_param());)*
                map
            }
        }
    )*};
}

effect_params! {
    /// Blurred halo around (or inside, with `inner`) the glyphs.
    GlowParams {
        radius: f64 = 5.0,
        intensity: f64 = 0.8,
        color: Color = Color::YELLOW,
        falloff: f64 = 2.0,
        inner: bool = false,
    }

    OutlineParams {
        width: f64 = 2.0,
        color: Color = Color::BLACK,
        softness: f64 = 0.5,
        quality: u32 = 8,
    }

    ShadowParams {
        offset_x: f64 = 3.0,
        offset_y: f64 = 3.0,
        blur_radius: f64 = 2.0,
        color: Color = Color::BLACK,
        opacity: f64 = 0.7,
    }

    FadeParams {
        fade_in_duration: f64 = 0.5,
        fade_out_duration: f64 = 0.5,
        fade_type: Easing = Easing::Linear,
    }

    /// Damped vertical bounce.
    BounceParams {
        amplitude: f64 = 10.0,
        frequency: f64 = 2.0,
        damping: f64 = 0.8,
        duration: f64 = 1.0,
    }

    WaveParams {
        amplitude: f64 = 5.0,
        frequency: f64 = 1.0,
        speed: f64 = 2.0,
    }

    ColorTransitionParams {
        start_color: Color = Color::WHITE,
        end_color: Color = Color::RED,
        duration: f64 = 2.0,
        transition_type: TransitionKind = TransitionKind::Smooth,
    }

    /// Reveals characters one at a time; `speed` scales `character_delay`.
    TypewriterParams {
        speed: f64 = 1.0,
        character_delay: f64 = 0.1,
    }

    NeonParams {
        glow_color: Color = Color::CYAN,
        core_color: Color = Color::WHITE,
        glow_radius: f64 = 12.0,
        glow_intensity: f64 = 2.0,
        flicker_enabled: bool = true,
        flicker_speed: f64 = 5.0,
        flicker_intensity: f64 = 0.3,
        tube_width: f64 = 2.0,
    }

    FireParams {
        flame_height: f64 = 30.0,
        flame_width: f64 = 20.0,
        animation_speed: f64 = 3.0,
        turbulence: f64 = 0.5,
        heat_distortion: bool = true,
    }

    IceParams {
        ice_color: Color = Color::rgba(0.7, 0.9, 1.0, 0.8),
        frost_intensity: f64 = 0.6,
        crystal_size: f64 = 2.0,
        refraction_strength: f64 = 0.3,
        sparkle_enabled: bool = true,
        sparkle_density: f64 = 0.1,
    }

    MetalParams {
        metal_type: MetalKind = MetalKind::Chrome,
        reflection_strength: f64 = 0.8,
        roughness: f64 = 0.1,
        metallic: f64 = 1.0,
        anisotropy: f64 = 0.0,
    }

    GlassParams {
        transparency: f64 = 0.3,
        refraction_index: f64 = 1.5,
        thickness: f64 = 5.0,
        surface_roughness: f64 = 0.05,
        tint_color: Color = Color::WHITE,
    }

    RainbowParams {
        hue_shift_speed: f64 = 1.0,
        saturation: f64 = 1.0,
        brightness: f64 = 1.0,
        rainbow_width: f64 = 1.0,
        direction: RainbowDirection = RainbowDirection::Horizontal,
        cycle_duration: f64 = 3.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let glow = GlowParams::default();
        assert_eq!(glow.radius, 5.0);
        assert_eq!(glow.color, Color::YELLOW);
        assert_eq!(OutlineParams::default().quality, 8);
        assert_eq!(ShadowParams::default().opacity, 0.7);
    }

    #[test]
    fn test_set_known_unknown_mistyped() {
        let mut glow = GlowParams::default();
        assert_eq!(glow.set("radius", &ParamValue::Number(9.0)), Assign::Applied);
        assert_eq!(glow.radius, 9.0);
        assert_eq!(glow.set("sparkle", &ParamValue::Bool(true)), Assign::Unknown);
        assert_eq!(glow.set("radius", &ParamValue::Text("big".into())), Assign::Mistyped);
        assert_eq!(glow.radius, 9.0);
    }

    #[test]
    fn test_color_from_list_and_hex() {
        let mut outline = OutlineParams::default();
        outline.set("color", &ParamValue::List(vec![0.0, 0.5, 1.0]));
        assert_eq!(outline.color, Color::rgb(0.0, 0.5, 1.0));
        outline.set("color", &ParamValue::Text("#FF0000".into()));
        assert_eq!(outline.color, Color::RED);
        assert_eq!(
            outline.set("color", &ParamValue::List(vec![1.0])),
            Assign::Mistyped
        );
    }

    #[test]
    fn test_enum_fields() {
        let mut fade = FadeParams::default();
        assert_eq!(fade.set("fade_type", &"ease_in_out".into()), Assign::Applied);
        assert_eq!(fade.fade_type, Easing::EaseInOut);
        assert_eq!(fade.get("fade_type"), Some(ParamValue::Text("ease_in_out".into())));
        assert_eq!(fade.set("fade_type", &"bouncy".into()), Assign::Mistyped);
    }

    #[test]
    fn test_to_map_has_every_key() {
        let map = MetalParams::default().to_map();
        for key in MetalParams::KEYS {
            assert!(map.contains_key(*key), "missing {}", key);
        }
        assert_eq!(map["metal_type"], ParamValue::Text("chrome".into()));
    }

    #[test]
    fn test_untagged_json() {
        let map: ParamMap =
            serde_json::from_str(r#"{"a": 1.5, "b": true, "c": [1, 0, 0], "d": "pulse"}"#).unwrap();
        assert_eq!(map["a"], ParamValue::Number(1.5));
        assert_eq!(map["b"], ParamValue::Bool(true));
        assert_eq!(map["c"], ParamValue::List(vec![1.0, 0.0, 0.0]));
        assert_eq!(map["d"], ParamValue::Text("pulse".into()));
    }

    #[test]
    fn test_param_map_macro() {
        let map = param_map! { "width" => 3.0, "inner" => true };
        assert_eq!(map.len(), 2);
        assert_eq!(map["inner"], ParamValue::Bool(true));
    }
}
