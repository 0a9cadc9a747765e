//! Export settings, presets and validation against FFmpeg capabilities.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;
use crate::error::SettingsError;

/// Upper bound accepted for the output frame rate.
pub const MAX_FPS: f64 = 120.0;

/// Output encoding parameters. Bitrates are in kbps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub bitrate: u32,
    pub codec: String,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: u32,
    pub preset: String,
    /// Constant rate factor. When set, replaces bitrate rate control.
    pub crf: Option<i32>,
    pub profile: String,
    pub level: String,
    pub audio_sample_rate: u32,
    pub audio_channels: u32,
    pub container_format: String,
    pub max_bitrate: Option<u32>,
    pub buffer_size: Option<u32>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output.mp4"),
            width: 1920,
            height: 1080,
            fps: 30.0,
            bitrate: 8000,
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: 128,
            preset: "medium".to_string(),
            crf: None,
            profile: "high".to_string(),
            level: "4.0".to_string(),
            audio_sample_rate: 44100,
            audio_channels: 2,
            container_format: "mp4".to_string(),
            max_bitrate: None,
            buffer_size: None,
        }
    }
}

impl ExportSettings {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            ..Self::default()
        }
    }

    /// Copy the quality preset's resolution and rate control onto these
    /// settings. Returns `None` when no preset has that name.
    pub fn with_quality_preset(mut self, name: &str) -> Option<Self> {
        let preset = quality_presets().into_iter().find(|p| p.name == name)?;
        preset.apply(&mut self);
        Some(self)
    }

    pub fn apply_format(&mut self, format: &FormatOption) {
        self.container_format = format.container.to_string();
        self.codec = format.codec.to_string();
        self.pixel_format = format.pixel_format.to_string();
        self.audio_codec = format.audio_codec.to_string();
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A named quality level.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityPreset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub bitrate: u32,
    pub preset: &'static str,
    pub crf: i32,
    pub profile: &'static str,
    pub level: Option<&'static str>,
}

impl QualityPreset {
    pub fn apply(&self, settings: &mut ExportSettings) {
        settings.width = self.width;
        settings.height = self.height;
        settings.fps = self.fps;
        settings.bitrate = self.bitrate;
        settings.preset = self.preset.to_string();
        settings.crf = Some(self.crf);
        settings.profile = self.profile.to_string();
        if let Some(level) = self.level {
            settings.level = level.to_string();
        }
    }
}

pub fn quality_presets() -> Vec<QualityPreset> {
    let preset = |name, width, height, bitrate, speed, crf, profile, level| QualityPreset {
        name,
        width,
        height,
        fps: 30.0,
        bitrate,
        preset: speed,
        crf,
        profile,
        level,
    };
    vec![
        preset("Web Low (480p)", 854, 480, 1500, "fast", 28, "main", None),
        preset("Web Medium (720p)", 1280, 720, 3000, "medium", 23, "high", None),
        preset("HD (1080p)", 1920, 1080, 6000, "medium", 20, "high", None),
        preset("HD High Quality", 1920, 1080, 12000, "slow", 18, "high", None),
        preset("4K (2160p)", 3840, 2160, 25000, "medium", 20, "high", Some("5.1")),
        preset("Archive Quality", 1920, 1080, 50000, "veryslow", 12, "high", None),
    ]
}

/// A container and codec combination offered to users.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOption {
    pub name: &'static str,
    pub container: &'static str,
    pub codec: &'static str,
    pub pixel_format: &'static str,
    pub audio_codec: &'static str,
    pub description: &'static str,
}

pub fn format_options() -> Vec<FormatOption> {
    vec![
        FormatOption {
            name: "MP4 (H.264)",
            container: "mp4",
            codec: "libx264",
            pixel_format: "yuv420p",
            audio_codec: "aac",
            description: "Most compatible format, good for web and mobile",
        },
        FormatOption {
            name: "MP4 (H.265)",
            container: "mp4",
            codec: "libx265",
            pixel_format: "yuv420p",
            audio_codec: "aac",
            description: "Better compression, newer devices only",
        },
        FormatOption {
            name: "MKV (H.264)",
            container: "mkv",
            codec: "libx264",
            pixel_format: "yuv420p",
            audio_codec: "aac",
            description: "Open container, good for archival",
        },
        FormatOption {
            name: "AVI (H.264)",
            container: "avi",
            codec: "libx264",
            pixel_format: "yuv420p",
            audio_codec: "aac",
            description: "Legacy format, wide compatibility",
        },
    ]
}

/// Check settings against what the installed FFmpeg supports. Returns every
/// problem found; an empty list means the settings are usable.
///
/// Only the video codec is checked against the codec list.
pub fn validate(settings: &ExportSettings, caps: &Capabilities) -> Vec<SettingsError> {
    let mut errors = Vec::new();

    if !caps.supports_codec(&settings.codec) {
        errors.push(SettingsError::MissingCodec(settings.codec.clone()));
    }
    if !caps.supports_format(&settings.container_format) {
        errors.push(SettingsError::MissingFormat(settings.container_format.clone()));
    }

    let (w, h) = (settings.width, settings.height);
    if w == 0 || h == 0 {
        errors.push(SettingsError::NonPositiveResolution { width: w, height: h });
    } else if w % 2 != 0 || h % 2 != 0 {
        errors.push(SettingsError::OddResolution { width: w, height: h });
    }

    // NaN fails both comparisons.
    if !(settings.fps > 0.0 && settings.fps <= MAX_FPS) {
        errors.push(SettingsError::FrameRate(settings.fps));
    }
    if settings.bitrate == 0 {
        errors.push(SettingsError::Bitrate);
    }
    if let Some(crf) = settings.crf {
        if !(0..=51).contains(&crf) {
            errors.push(SettingsError::Crf(crf));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&ExportSettings::default(), &Capabilities::full()).is_empty());
    }

    #[test]
    fn test_rejects_odd_and_zero_resolution() {
        let caps = Capabilities::full();
        let mut s = ExportSettings::default();
        s.width = 1921;
        assert_eq!(
            validate(&s, &caps),
            vec![SettingsError::OddResolution { width: 1921, height: 1080 }]
        );
        s.width = 0;
        assert!(matches!(
            validate(&s, &caps)[0],
            SettingsError::NonPositiveResolution { .. }
        ));
    }

    #[test]
    fn test_fps_bounds() {
        let caps = Capabilities::full();
        for (fps, ok) in [(0.0, false), (-1.0, false), (0.5, true), (120.0, true), (120.1, false), (f64::NAN, false)] {
            let s = ExportSettings {
                fps,
                ..ExportSettings::default()
            };
            assert_eq!(validate(&s, &caps).is_empty(), ok, "fps {}", fps);
        }
    }

    #[test]
    fn test_crf_bounds() {
        let caps = Capabilities::full();
        for (crf, ok) in [(-1, false), (0, true), (51, true), (52, false)] {
            let s = ExportSettings {
                crf: Some(crf),
                ..ExportSettings::default()
            };
            assert_eq!(validate(&s, &caps).is_empty(), ok, "crf {}", crf);
        }
    }

    #[test]
    fn test_missing_capabilities_are_named() {
        let caps = Capabilities {
            available: true,
            codecs: vec!["libx264".into()],
            formats: vec!["mp4".into()],
            ..Capabilities::default()
        };
        let mut s = ExportSettings::default();
        s.codec = "libx265".into();
        s.container_format = "mkv".into();
        let errors = validate(&s, &caps);
        assert_eq!(
            errors,
            vec![
                SettingsError::MissingCodec("libx265".into()),
                SettingsError::MissingFormat("mkv".into()),
            ]
        );
    }

    #[test]
    fn test_zero_bitrate_rejected() {
        let s = ExportSettings {
            bitrate: 0,
            ..ExportSettings::default()
        };
        assert_eq!(validate(&s, &Capabilities::full()), vec![SettingsError::Bitrate]);
    }

    #[test]
    fn test_quality_preset_applies() {
        let s = ExportSettings::new("out.mp4")
            .with_quality_preset("4K (2160p)")
            .unwrap();
        assert_eq!((s.width, s.height), (3840, 2160));
        assert_eq!(s.crf, Some(20));
        assert_eq!(s.level, "5.1");
        assert!(ExportSettings::default().with_quality_preset("nope").is_none());
        for preset in quality_presets() {
            let s = ExportSettings::default().with_quality_preset(preset.name).unwrap();
            assert!(validate(&s, &Capabilities::full()).is_empty(), "{}", preset.name);
        }
    }

    #[test]
    fn test_apply_format() {
        let mut s = ExportSettings::default();
        let mkv = format_options().into_iter().find(|f| f.container == "mkv").unwrap();
        s.apply_format(&mkv);
        assert_eq!(s.container_format, "mkv");
        assert_eq!(s.codec, "libx264");
    }

    #[test]
    fn test_settings_from_partial_json() {
        let s: ExportSettings = serde_json::from_str(r#"{"width": 1280, "height": 720, "crf": 23}"#).unwrap();
        assert_eq!(s.width, 1280);
        assert_eq!(s.crf, Some(23));
        assert_eq!(s.codec, "libx264");
    }
}
