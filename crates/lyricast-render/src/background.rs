//! Frame backgrounds: flat color, still image or video.

use std::path::PathBuf;
use std::sync::Arc;

use lyricast_core::{Color, FrameBuffer, LyricastConfig, Project, Timestamp};

use crate::decode_cache::{DecodeAheadCache, FfmpegStreamOpener, StreamOpener};
use crate::image_loader::{cover, load_image};
use crate::video_decoder::VideoDecoder;

/// How video backgrounds are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoMode {
    /// Decode-ahead stream; never blocks the render call.
    #[default]
    Streaming,
    /// One blocking FFmpeg run per frame. Suited to single-frame renders.
    Extract,
}

pub enum Background {
    Solid(Color),
    Image(FrameBuffer),
    Video {
        cache: DecodeAheadCache,
        fps: f64,
        last: Option<Arc<FrameBuffer>>,
        fill: Color,
    },
    VideoExtract {
        decoder: VideoDecoder,
        path: PathBuf,
        fill: Color,
    },
}

/// Parse the configured background color, falling back to black.
pub fn background_color(config: &LyricastConfig) -> Color {
    Color::from_hex(&config.render.background_color).unwrap_or_else(|_| {
        tracing::warn!(
            "invalid background color '{}', using black",
            config.render.background_color
        );
        Color::BLACK
    })
}

impl Background {
    /// Pick the project's background: video, then image, then the flat color.
    /// Unusable media degrades to the next option with a warning.
    pub fn for_project(
        project: &Project,
        width: u32,
        height: u32,
        fps: f64,
        config: &LyricastConfig,
        mode: VideoMode,
    ) -> Self {
        let fill = background_color(config);

        if let Some(video) = &project.video_file {
            match mode {
                VideoMode::Extract => {
                    return Background::VideoExtract {
                        decoder: VideoDecoder::new(&config.export.ffmpeg_path),
                        path: video.path.clone(),
                        fill,
                    }
                }
                VideoMode::Streaming => {
                    let opener: Arc<dyn StreamOpener> = Arc::new(FfmpegStreamOpener {
                        ffmpeg_path: PathBuf::from(&config.export.ffmpeg_path),
                        path: video.path.clone(),
                        width,
                        height,
                        fps,
                    });
                    match DecodeAheadCache::start(opener, &config.preview) {
                        Ok(cache) => return Background::streaming(cache, fps, fill),
                        Err(e) => tracing::warn!("video background disabled: {}", e),
                    }
                }
            }
        }

        if let Some(image) = &project.image_file {
            match load_image(&image.path).and_then(|fb| cover(&fb, width, height)) {
                Ok(fb) => return Background::Image(fb),
                Err(e) => tracing::warn!("image background disabled: {}", e),
            }
        }

        Background::Solid(fill)
    }

    pub fn streaming(cache: DecodeAheadCache, fps: f64, fill: Color) -> Self {
        Background::Video {
            cache,
            fps,
            last: None,
            fill,
        }
    }

    /// The background at time `t`, at exactly `width`x`height`.
    pub fn frame_at(&mut self, t: f64, width: u32, height: u32) -> FrameBuffer {
        match self {
            Background::Solid(color) => FrameBuffer::solid(width, height, color),
            Background::Image(fb) => fb.clone(),
            Background::Video {
                cache,
                fps,
                last,
                fill,
            } => {
                let index = Timestamp::from_seconds(t).to_frame(*fps);
                if let Some(frame) = cache.frame_at(index) {
                    *last = Some(frame);
                }
                match last {
                    Some(frame) if frame.width == width && frame.height == height => {
                        (**frame).clone()
                    }
                    _ => FrameBuffer::solid(width, height, fill),
                }
            }
            Background::VideoExtract {
                decoder,
                path,
                fill,
            } => decoder
                .extract_frame(path, t, width, height)
                .unwrap_or_else(|e| {
                    tracing::warn!("video frame at {:.3}s unavailable: {}", t, e);
                    FrameBuffer::solid(width, height, fill)
                }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Background::Solid(_) => "solid",
            Background::Image(_) => "image",
            Background::Video { .. } => "video",
            Background::VideoExtract { .. } => "video-extract",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode_cache::FrameStream;
    use lyricast_core::{ImageSource, LyricastResult, PreviewConfig, VideoSource};

    #[test]
    fn test_solid_from_config() {
        let mut config = LyricastConfig::default();
        config.render.background_color = "#FF0000".into();
        let mut bg =
            Background::for_project(&Project::default(), 4, 4, 30.0, &config, VideoMode::Streaming);
        assert_eq!(bg.kind(), "solid");
        assert_eq!(bg.frame_at(0.0, 4, 4).get_pixel(0, 0), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_bad_color_is_black() {
        let mut config = LyricastConfig::default();
        config.render.background_color = "nope".into();
        assert_eq!(background_color(&config), Color::BLACK);
    }

    #[test]
    fn test_missing_image_falls_back_to_solid() {
        let mut project = Project::default();
        project.image_file = Some(ImageSource {
            path: "/nonexistent/cover.png".into(),
        });
        let bg = Background::for_project(
            &project,
            4,
            4,
            30.0,
            &LyricastConfig::default(),
            VideoMode::Streaming,
        );
        assert_eq!(bg.kind(), "solid");
    }

    #[test]
    fn test_video_takes_priority() {
        let mut project = Project::default();
        project.image_file = Some(ImageSource {
            path: "/nonexistent/cover.png".into(),
        });
        project.video_file = Some(VideoSource {
            path: "/nonexistent/bg.mp4".into(),
            duration: None,
        });
        let bg = Background::for_project(
            &project,
            4,
            4,
            30.0,
            &LyricastConfig::default(),
            VideoMode::Extract,
        );
        assert_eq!(bg.kind(), "video-extract");
    }

    struct Blue;

    impl FrameStream for Blue {
        fn next_frame(&mut self) -> LyricastResult<Option<FrameBuffer>> {
            Ok(Some(FrameBuffer::solid(2, 2, &Color::BLUE)))
        }
    }

    struct BlueOpener;

    impl StreamOpener for BlueOpener {
        fn open(&self, _start: u64) -> LyricastResult<Box<dyn FrameStream>> {
            Ok(Box::new(Blue))
        }
    }

    #[test]
    fn test_video_reuses_last_frame() {
        let cache = DecodeAheadCache::start(Arc::new(BlueOpener), &PreviewConfig::default()).unwrap();
        cache
            .wait_frame(0, std::time::Duration::from_secs(5))
            .unwrap();
        let mut bg = Background::streaming(cache, 30.0, Color::RED);
        assert_eq!(bg.frame_at(0.0, 2, 2).get_pixel(0, 0), Some([0, 0, 255, 255]));
        // mismatched size never shows a stretched frame
        assert_eq!(bg.frame_at(0.0, 3, 3).get_pixel(0, 0), Some([255, 0, 0, 255]));
    }

    /// Frames whose first two bytes carry their index.
    struct Stamped {
        next: u64,
    }

    impl FrameStream for Stamped {
        fn next_frame(&mut self) -> LyricastResult<Option<FrameBuffer>> {
            if self.next >= 300 {
                return Ok(None);
            }
            let [lo, hi, ..] = (self.next as u16).to_le_bytes();
            self.next += 1;
            FrameBuffer::from_rgba(1, 1, vec![lo, hi, 0, 255]).map(Some)
        }
    }

    struct StampedOpener;

    impl StreamOpener for StampedOpener {
        fn open(&self, start: u64) -> LyricastResult<Box<dyn FrameStream>> {
            Ok(Box::new(Stamped { next: start }))
        }
    }

    #[test]
    fn test_video_frame_matches_tick_index() {
        let cache = DecodeAheadCache::start(Arc::new(StampedOpener), &PreviewConfig::default()).unwrap();
        let mut bg = Background::streaming(cache, 30.0, Color::RED);
        let mut mismatches = Vec::new();
        for i in 0..300u64 {
            if let Background::Video { cache, .. } = &bg {
                cache.wait_frame(i, std::time::Duration::from_secs(5)).unwrap();
            }
            let frame = bg.frame_at(i as f64 / 30.0, 1, 1);
            let shown = u16::from_le_bytes([frame.data[0], frame.data[1]]) as u64;
            if shown != i {
                mismatches.push((i, shown));
            }
        }
        assert!(mismatches.is_empty(), "{:?}", mismatches);
    }
}
