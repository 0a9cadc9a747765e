use serde::{Deserialize, Serialize};

/// Blend mode used when folding an effect layer into the composited text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Standard alpha blending (Porter-Duff "over").
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
    Add,
}

impl BlendMode {
    pub const ALL: [BlendMode; 8] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::Difference,
        BlendMode::Add,
    ];

    /// Blend one normalized channel `src` onto `dst`.
    pub fn blend_channel(&self, dst: f32, src: f32) -> f32 {
        let v = match self {
            BlendMode::Normal => src,
            BlendMode::Multiply => dst * src,
            BlendMode::Screen => 1.0 - (1.0 - dst) * (1.0 - src),
            BlendMode::Overlay => {
                if dst < 0.5 {
                    2.0 * dst * src
                } else {
                    1.0 - 2.0 * (1.0 - dst) * (1.0 - src)
                }
            }
            BlendMode::Darken => dst.min(src),
            BlendMode::Lighten => dst.max(src),
            BlendMode::Difference => (dst - src).abs(),
            BlendMode::Add => dst + src,
        };
        v.clamp(0.0, 1.0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::Difference => "difference",
            BlendMode::Add => "add",
        }
    }
}

/// Easing curve for fades and transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Apply the easing function to a normalized time value t in [0, 1].
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_boundaries() {
        for easing in [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
        ] {
            assert!(easing.apply(0.0).abs() < 0.001, "{:?} should start at 0", easing);
            assert!(
                (easing.apply(1.0) - 1.0).abs() < 0.001,
                "{:?} should end at 1",
                easing
            );
        }
    }

    #[test]
    fn test_easing_shapes() {
        assert!(Easing::EaseIn.apply(0.5) < 0.5);
        assert!(Easing::EaseOut.apply(0.5) > 0.5);
        assert!((Easing::EaseInOut.apply(0.5) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_easing_serde_names() {
        let e: Easing = serde_json::from_str("\"ease_in_out\"").unwrap();
        assert_eq!(e, Easing::EaseInOut);
    }

    #[test]
    fn test_blend_channel() {
        assert_eq!(BlendMode::Normal.blend_channel(0.2, 0.8), 0.8);
        assert!((BlendMode::Multiply.blend_channel(0.5, 0.5) - 0.25).abs() < 1e-6);
        assert!((BlendMode::Screen.blend_channel(0.5, 0.5) - 0.75).abs() < 1e-6);
        assert_eq!(BlendMode::Add.blend_channel(0.7, 0.7), 1.0);
        assert_eq!(BlendMode::Darken.blend_channel(0.3, 0.6), 0.3);
        assert!((BlendMode::Difference.blend_channel(0.3, 0.6) - 0.3).abs() < 1e-6);
    }
}
