//! Time-dependent effect values shared by the CPU compositor and the
//! uniform calculator. `t` is always seconds since the line became visible.

use std::f64::consts::TAU;

use crate::params::{
    BounceParams, ColorTransitionParams, FadeParams, TransitionKind, TypewriterParams, WaveParams,
};

/// Vertical offset in pixels of a damped bounce.
pub fn bounce_offset(p: &BounceParams, t: f64) -> f64 {
    p.amplitude * (t * p.frequency * TAU).sin() * (-p.damping * t).exp()
}

/// Vertical offset in pixels for the glyph column at `x`.
pub fn wave_offset(p: &WaveParams, t: f64, x: f64) -> f64 {
    p.amplitude * (t * p.speed * TAU + x * p.frequency * 0.1).sin()
}

/// Alpha multiplier for fade in/out over a line lasting `line_duration`.
pub fn fade_alpha(p: &FadeParams, t: f64, line_duration: f64) -> f64 {
    let mut alpha: f64 = 1.0;
    if p.fade_in_duration > 0.0 && t < p.fade_in_duration {
        alpha = alpha.min(p.fade_type.apply(t / p.fade_in_duration));
    }
    let remaining = line_duration - t;
    if p.fade_out_duration > 0.0 && remaining < p.fade_out_duration {
        alpha = alpha.min(p.fade_type.apply(remaining / p.fade_out_duration));
    }
    alpha.clamp(0.0, 1.0)
}

/// Blend factor between `start_color` (0.0) and `end_color` (1.0).
pub fn transition_progress(p: &ColorTransitionParams, t: f64) -> f64 {
    if p.duration <= 0.0 {
        return 1.0;
    }
    let phase = t / p.duration;
    match p.transition_type {
        TransitionKind::Smooth => {
            let x = phase.clamp(0.0, 1.0);
            x * x * (3.0 - 2.0 * x)
        }
        TransitionKind::Pulse => 0.5 - 0.5 * (phase.max(0.0) * TAU).cos(),
        TransitionKind::Flash => {
            if phase.max(0.0).fract() < 0.5 {
                0.0
            } else {
                1.0
            }
        }
    }
}

/// Number of leading characters revealed at `t`.
pub fn typewriter_visible(p: &TypewriterParams, t: f64, total_chars: usize) -> usize {
    if p.character_delay <= 0.0 || p.speed <= 0.0 {
        return total_chars;
    }
    let per_char = p.character_delay / p.speed;
    let shown = (t.max(0.0) / per_char + 1e-9).floor() as usize + 1;
    shown.min(total_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricast_core::Easing;

    #[test]
    fn test_bounce_starts_at_rest_and_decays() {
        let p = BounceParams::default();
        assert!(bounce_offset(&p, 0.0).abs() < 1e-9);
        // quarter period of the first oscillation is the peak
        let peak = bounce_offset(&p, 0.125);
        let later = bounce_offset(&p, 2.125);
        assert!(peak > 0.0);
        assert!(later.abs() < peak.abs());
    }

    #[test]
    fn test_wave_varies_by_column() {
        let p = WaveParams::default();
        assert_ne!(wave_offset(&p, 0.3, 0.0), wave_offset(&p, 0.3, 20.0));
        assert!(wave_offset(&p, 0.3, 7.0).abs() <= p.amplitude + 1e-9);
    }

    #[test]
    fn test_fade_alpha_in_and_out() {
        let p = FadeParams::default();
        assert_eq!(fade_alpha(&p, 0.0, 4.0), 0.0);
        assert!((fade_alpha(&p, 0.25, 4.0) - 0.5).abs() < 1e-9);
        assert_eq!(fade_alpha(&p, 2.0, 4.0), 1.0);
        assert!((fade_alpha(&p, 3.75, 4.0) - 0.5).abs() < 1e-9);
        assert_eq!(fade_alpha(&p, 4.0, 4.0), 0.0);
    }

    #[test]
    fn test_fade_easing_applies() {
        let p = FadeParams {
            fade_type: Easing::EaseIn,
            ..FadeParams::default()
        };
        assert!((fade_alpha(&p, 0.25, 4.0) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_transition_kinds() {
        let mut p = ColorTransitionParams::default();
        assert_eq!(transition_progress(&p, 0.0), 0.0);
        assert!((transition_progress(&p, 1.0) - 0.5).abs() < 1e-9);
        assert_eq!(transition_progress(&p, 5.0), 1.0);

        p.transition_type = TransitionKind::Pulse;
        assert!((transition_progress(&p, 1.0) - 1.0).abs() < 1e-9);
        assert!(transition_progress(&p, 2.0).abs() < 1e-9);

        p.transition_type = TransitionKind::Flash;
        assert_eq!(transition_progress(&p, 0.5), 0.0);
        assert_eq!(transition_progress(&p, 1.5), 1.0);
    }

    #[test]
    fn test_typewriter_reveal() {
        let p = TypewriterParams::default();
        assert_eq!(typewriter_visible(&p, 0.0, 10), 1);
        assert_eq!(typewriter_visible(&p, 0.35, 10), 4);
        assert_eq!(typewriter_visible(&p, 50.0, 10), 10);
        let fast = TypewriterParams {
            speed: 2.0,
            ..TypewriterParams::default()
        };
        assert_eq!(typewriter_visible(&fast, 0.35, 10), 8);
    }
}
