//! The project aggregate handed to the renderer and exporter.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LyricastError, LyricastResult};
use crate::subtitle::SubtitleTrack;
use crate::time::Duration;

/// Duration used when a project has neither media nor subtitles.
pub const FALLBACK_DURATION_SECS: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSource {
    pub path: PathBuf,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSource {
    pub path: PathBuf,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subtitle_file: SubtitleTrack,
    #[serde(default)]
    pub video_file: Option<VideoSource>,
    #[serde(default)]
    pub image_file: Option<ImageSource>,
    #[serde(default)]
    pub audio_file: Option<AudioSource>,
}

impl Project {
    pub fn new(name: impl Into<String>, subtitles: SubtitleTrack) -> Self {
        Self {
            name: name.into(),
            subtitle_file: subtitles,
            ..Self::default()
        }
    }

    pub fn load_json(path: &Path) -> LyricastResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LyricastError::asset(format!("cannot read project: {}", e), path))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Export length: audio, then video, then the last subtitle, then 60 s.
    pub fn duration(&self) -> Duration {
        let known = |d: Option<f64>| d.filter(|v| v.is_finite() && *v > 0.0);
        let secs = known(self.audio_file.as_ref().and_then(|a| a.duration))
            .or_else(|| known(self.video_file.as_ref().and_then(|v| v.duration)))
            .or_else(|| known(self.subtitle_file.end_time()))
            .unwrap_or(FALLBACK_DURATION_SECS);
        Duration::from_seconds(secs)
    }

    /// Number of frames an export at `fps` renders.
    pub fn total_frames(&self, fps: f64) -> u64 {
        self.duration().frame_count(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::SubtitleLine;

    #[test]
    fn test_duration_prefers_audio() {
        let mut p = Project::default();
        p.video_file = Some(VideoSource {
            path: "bg.mp4".into(),
            duration: Some(30.0),
        });
        p.audio_file = Some(AudioSource {
            path: "song.mp3".into(),
            duration: Some(12.5),
        });
        assert_eq!(p.duration().as_seconds(), 12.5);
        p.audio_file = None;
        assert_eq!(p.duration().as_seconds(), 30.0);
    }

    #[test]
    fn test_duration_from_subtitles_then_fallback() {
        let p = Project::new(
            "song",
            SubtitleTrack::new(vec![
                SubtitleLine::new(0.0, 5.0, "A"),
                SubtitleLine::new(5.0, 10.0, "B"),
            ]),
        );
        assert_eq!(p.duration().as_seconds(), 10.0);
        assert_eq!(p.total_frames(30.0), 300);
        assert_eq!(Project::default().duration().as_seconds(), FALLBACK_DURATION_SECS);
    }

    #[test]
    fn test_project_json_roundtrip_shape() {
        let json = r#"{
            "name": "demo",
            "subtitle_file": {"lines": [{"start_time": 0.0, "end_time": 1.0, "text": "hi"}]},
            "audio_file": {"path": "a.wav", "duration": 3.0}
        }"#;
        let p: Project = serde_json::from_str(json).unwrap();
        assert_eq!(p.subtitle_file.lines.len(), 1);
        assert_eq!(p.duration().as_seconds(), 3.0);
        assert!(p.video_file.is_none());
    }
}
