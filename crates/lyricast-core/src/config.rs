use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LyricastError, LyricastResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Explicit TTF/OTF used for subtitle text. Searched in `font_dirs` otherwise.
    pub font_path: Option<PathBuf>,
    pub font_dirs: Vec<PathBuf>,
    /// Flat background used when the project has no image or video.
    pub background_color: String,
    pub texture_cache_size: usize,
    /// Output height at which a style's font size is used unscaled.
    pub reference_height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_dirs: vec![
                PathBuf::from("/usr/share/fonts"),
                PathBuf::from("/usr/local/share/fonts"),
                PathBuf::from("/System/Library/Fonts"),
                PathBuf::from("C:\\Windows\\Fonts"),
            ],
            background_color: "#000000".to_string(),
            texture_cache_size: 100,
            reference_height: 720,
        }
    }
}

/// What the frame pump does when the writer queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Drop the frame after `enqueue_timeout_ms`. The output gets shorter.
    #[default]
    Drop,
    /// Wait for queue space, observing cancellation. Output keeps its nominal length.
    Block,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub ffmpeg_path: String,
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub writer_poll_ms: u64,
    pub terminate_grace_secs: u64,
    pub kill_wait_secs: u64,
    pub writer_join_timeout_secs: u64,
    pub exit_wait_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub progress_every_frames: u64,
    pub backpressure: Backpressure,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            queue_capacity: 10,
            enqueue_timeout_ms: 50,
            writer_poll_ms: 100,
            terminate_grace_secs: 5,
            kill_wait_secs: 2,
            writer_join_timeout_secs: 30,
            exit_wait_timeout_secs: 60,
            probe_timeout_secs: 10,
            progress_every_frames: 10,
            backpressure: Backpressure::Drop,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// How many frames the video background decoder keeps ahead of the playhead.
    pub decode_ahead_frames: usize,
    /// How many already-shown frames stay cached behind the playhead.
    pub decode_keep_behind: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            decode_ahead_frames: 48,
            decode_keep_behind: 8,
        }
    }
}

/// Contents of `lyricast.toml`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LyricastConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

impl LyricastConfig {
    pub const FILE_NAME: &'static str = "lyricast.toml";

    pub fn load_from_file(path: &Path) -> LyricastResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> LyricastResult<Self> {
        toml::from_str(contents).map_err(|e| LyricastError::Config(e.to_string()))
    }

    pub fn save_to_file(&self, path: &Path) -> LyricastResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| LyricastError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> LyricastResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LyricastConfig::default();
        assert_eq!(cfg.render.texture_cache_size, 100);
        assert_eq!(cfg.export.queue_capacity, 10);
        assert_eq!(cfg.export.progress_every_frames, 10);
        assert_eq!(cfg.export.backpressure, Backpressure::Drop);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = LyricastConfig::from_toml(
            r#"
            [export]
            backpressure = "block"
            queue_capacity = 4
            "#,
        )
        .unwrap();
        assert_eq!(cfg.export.backpressure, Backpressure::Block);
        assert_eq!(cfg.export.queue_capacity, 4);
        assert_eq!(cfg.export.ffmpeg_path, "ffmpeg");
        assert_eq!(cfg.render.reference_height, 720);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = LyricastConfig::from_toml("[export\nqueue").unwrap_err();
        assert!(matches!(err, LyricastError::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("lyricast-cfg-{}.toml", std::process::id()));
        let mut cfg = LyricastConfig::default();
        cfg.preview.decode_ahead_frames = 12;
        cfg.save_to_file(&path).unwrap();
        let loaded = LyricastConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.preview.decode_ahead_frames, 12);
        let _ = std::fs::remove_file(&path);
    }
}
