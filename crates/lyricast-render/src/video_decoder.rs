//! Video background decoding through an FFmpeg subprocess.
//!
//! [`VideoDecoder::extract_frame`] is the one-shot path: one blocking FFmpeg
//! run per frame, used for single-frame renders. Continuous playback and
//! export go through [`crate::decode_cache`], which streams frames from one
//! long-lived process built by [`stream_args`].

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use lyricast_core::{Color, FrameBuffer, LyricastError, LyricastResult};

/// Gray frame returned when FFmpeg runs but produces nothing usable.
pub fn placeholder_frame(width: u32, height: u32) -> FrameBuffer {
    FrameBuffer::solid(width, height, &Color::rgba(0.2, 0.2, 0.2, 1.0))
}

/// Arguments that decode `path` from `start_secs` onward as raw RGBA frames
/// of `width`x`height` at `fps` on stdout.
pub fn stream_args(path: &Path, start_secs: f64, width: u32, height: u32, fps: f64) -> Vec<String> {
    vec![
        "-nostdin".into(),
        "-v".into(),
        "error".into(),
        "-ss".into(),
        format!("{:.3}", start_secs.max(0.0)),
        "-i".into(),
        path.to_string_lossy().into_owned(),
        "-an".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", width, height),
        "-r".into(),
        format!("{}", fps),
        "-".into(),
    ]
}

/// Frames kept by [`VideoDecoder`] unless configured otherwise.
pub const DEFAULT_CACHED_FRAMES: usize = 32;

/// (path, millisecond timestamp, width, height)
type FrameKey = (PathBuf, u64, u32, u32);

/// Blocking frame extractor with a small per-timestamp cache. Evicts the
/// oldest frame when full.
pub struct VideoDecoder {
    ffmpeg_path: PathBuf,
    frame_cache: DashMap<FrameKey, FrameBuffer>,
    order: Mutex<VecDeque<FrameKey>>,
    capacity: usize,
}

impl VideoDecoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            frame_cache: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_CACHED_FRAMES,
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Extract the frame at `timestamp_secs`, scaled to the target size.
    ///
    /// A missing file or an FFmpeg that cannot be started is an error. An
    /// FFmpeg run that fails or returns short output yields the gray placeholder.
    pub fn extract_frame(
        &self,
        path: &Path,
        timestamp_secs: f64,
        width: u32,
        height: u32,
    ) -> LyricastResult<FrameBuffer> {
        let key = (
            path.to_path_buf(),
            (timestamp_secs.max(0.0) * 1000.0) as u64,
            width,
            height,
        );
        if let Some(cached) = self.frame_cache.get(&key) {
            return Ok(cached.clone());
        }

        if !path.exists() {
            return Err(LyricastError::asset(
                format!("video file not found: {}", path.display()),
                path,
            ));
        }

        let output = Command::new(&self.ffmpeg_path)
            .args(["-nostdin", "-v", "error", "-ss"])
            .arg(format!("{:.3}", timestamp_secs.max(0.0)))
            .arg("-i")
            .arg(path)
            .args(["-vframes", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "-s"])
            .arg(format!("{}x{}", width, height))
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                LyricastError::Encode(format!(
                    "failed to run {}: {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            tracing::warn!(
                "frame extraction at {:.3}s failed: {}",
                timestamp_secs,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(placeholder_frame(width, height));
        }

        let expected = width as usize * height as usize * 4;
        if output.stdout.len() < expected {
            tracing::warn!(
                "short frame from ffmpeg: expected {} bytes, got {}",
                expected,
                output.stdout.len()
            );
            return Ok(placeholder_frame(width, height));
        }

        let mut data = output.stdout;
        data.truncate(expected);
        let fb = FrameBuffer::from_rgba(width, height, data)?;
        self.remember(key, fb.clone());
        Ok(fb)
    }

    fn remember(&self, key: FrameKey, frame: FrameBuffer) {
        if self.capacity == 0 {
            return;
        }
        let mut order = self.order.lock();
        if self.frame_cache.insert(key.clone(), frame).is_none() {
            order.push_back(key);
        }
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.frame_cache.remove(&oldest);
            }
        }
    }

    pub fn clear_cache(&self) {
        let mut order = self.order.lock();
        order.clear();
        self.frame_cache.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.frame_cache.len()
    }
}

impl Default for VideoDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_args_shape() {
        let args = stream_args(Path::new("bg.mp4"), 2.5, 320, 240, 30.0);
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-ss") + 1], "2.500");
        assert_eq!(args[pos("-i") + 1], "bg.mp4");
        assert_eq!(args[pos("-s") + 1], "320x240");
        assert_eq!(args[pos("-r") + 1], "30");
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_negative_start_clamps() {
        let args = stream_args(Path::new("bg.mp4"), -1.0, 2, 2, 24.0);
        assert!(args.contains(&"0.000".to_string()));
    }

    #[test]
    fn test_extract_missing_file() {
        let decoder = VideoDecoder::default();
        let result = decoder.extract_frame(Path::new("/nonexistent/video.mp4"), 0.0, 320, 240);
        assert!(matches!(result, Err(LyricastError::Asset { .. })));
        assert_eq!(decoder.cache_size(), 0);
    }

    #[test]
    fn test_cache_is_bounded() {
        let decoder = VideoDecoder::default().with_cache_capacity(3);
        let key = |ms: u64| (PathBuf::from("bg.mp4"), ms, 2, 2);
        for ms in 0..10 {
            decoder.remember(key(ms), placeholder_frame(2, 2));
        }
        decoder.remember(key(9), placeholder_frame(2, 2));
        assert_eq!(decoder.cache_size(), 3);
        assert!(decoder.frame_cache.contains_key(&key(7)));
        assert!(!decoder.frame_cache.contains_key(&key(6)));
        decoder.clear_cache();
        assert_eq!(decoder.cache_size(), 0);
    }

    #[test]
    fn test_placeholder_is_gray() {
        let fb = placeholder_frame(2, 2);
        assert_eq!(fb.get_pixel(1, 1), Some([51, 51, 51, 255]));
    }
}
