//! Frame rendering: background, visible subtitle lines and their effects.

use std::path::PathBuf;

use lyricast_core::{
    FrameBuffer, LyricastConfig, LyricastError, LyricastResult, Project, SubtitleLine,
};
use lyricast_fx::{generate, EffectStack, ShaderSource};

use crate::background::{background_color, Background, VideoMode};
use crate::cache::TextureCache;
use crate::effects::{apply_motion, composite, EffectContext};
use crate::karaoke::char_colors;
use crate::layout::{position, scaled_font_size};
use crate::mask::Canvas;
use crate::text::{rasterize_line, FontLibrary};

/// A subtitle line as placed on the last rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSubtitle {
    pub text: String,
    pub style_name: String,
    /// Top-left of the text box, excluding effect padding.
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub start_time: f64,
    pub end_time: f64,
}

/// Media paths a background was built from.
type BackgroundKey = (Option<PathBuf>, Option<PathBuf>);

fn background_key(project: &Project) -> BackgroundKey {
    (
        project.video_file.as_ref().map(|v| v.path.clone()),
        project.image_file.as_ref().map(|i| i.path.clone()),
    )
}

/// Lines visible at `t`, boundary-inclusive, with the line starting at a
/// shared boundary taking precedence.
pub fn visible_subtitles(project: &Project, t: f64) -> Vec<&SubtitleLine> {
    project.subtitle_file.visible_lines(t)
}

/// CPU frame renderer. Frames are produced strictly one at a time.
pub struct FrameRenderer {
    width: u32,
    height: u32,
    fps: f64,
    config: LyricastConfig,
    fonts: FontLibrary,
    textures: TextureCache,
    effects: EffectStack,
    video_mode: VideoMode,
    background: Option<(BackgroundKey, Background)>,
    frames_rendered: u64,
    drops: u64,
    last_rendered: Vec<RenderedSubtitle>,
}

impl FrameRenderer {
    pub fn new(width: u32, height: u32, fps: f64, config: LyricastConfig) -> LyricastResult<Self> {
        if width == 0 || height == 0 {
            return Err(LyricastError::invalid(format!(
                "output size {}x{} must be non-zero",
                width, height
            )));
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(LyricastError::invalid(format!("fps {} must be positive", fps)));
        }
        tracing::debug!(width, height, fps, "frame renderer created");
        Ok(Self {
            width,
            height,
            fps,
            fonts: FontLibrary::from_config(&config.render),
            textures: TextureCache::new(config.render.texture_cache_size),
            config,
            effects: EffectStack::new(),
            video_mode: VideoMode::Streaming,
            background: None,
            frames_rendered: 0,
            drops: 0,
            last_rendered: Vec::new(),
        })
    }

    pub fn with_fonts(mut self, fonts: FontLibrary) -> Self {
        self.fonts = fonts;
        self.textures.clear();
        self
    }

    pub fn with_effects(mut self, effects: EffectStack) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_video_mode(mut self, mode: VideoMode) -> Self {
        self.video_mode = mode;
        self.background = None;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn effects(&self) -> &EffectStack {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectStack {
        &mut self.effects
    }

    /// Shader source for the currently enabled layers.
    pub fn shader(&self) -> ShaderSource {
        generate(&self.effects.active_layers())
    }

    /// Frames that fell back to a flat frame after a render error.
    pub fn drop_count(&self) -> u64 {
        self.drops
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Subtitles placed on the most recent frame.
    pub fn last_rendered(&self) -> &[RenderedSubtitle] {
        &self.last_rendered
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    /// Render the frame at `t`. Never fails: on error the frame is the flat
    /// background color and the drop counter increments.
    pub fn render(&mut self, t: f64, project: &Project) -> FrameBuffer {
        self.frames_rendered += 1;
        match self.try_render(t, project) {
            Ok(frame) => frame,
            Err(e) => {
                self.drops += 1;
                self.last_rendered.clear();
                tracing::warn!("frame at {:.3}s failed, using fallback: {}", t, e);
                FrameBuffer::solid(self.width, self.height, &background_color(&self.config))
            }
        }
    }

    /// Render the frame at `t`, propagating errors.
    pub fn try_render(&mut self, t: f64, project: &Project) -> LyricastResult<FrameBuffer> {
        let mut frame = self.background_frame(t, project);
        let layers = self.effects.active_layers();
        let mut placed = Vec::new();

        for line in visible_subtitles(project, t) {
            let style = project.subtitle_file.style(&line.style);
            let size = scaled_font_size(&style, self.height, self.config.render.reference_height);
            let key = TextureCache::key(&line.text, &style.name, size, self.width, self.height);
            let face = self.fonts.face(&style.font_name);
            let text = self
                .textures
                .get_or_try_insert(key, || rasterize_line(&*face, &line.text, size))?;

            let ctx = EffectContext {
                time: t,
                line_time: t - line.start_time,
                line_duration: line.duration(),
            };
            let motion = apply_motion(&layers, &text, &ctx);
            let colors = char_colors(line, &style, t);
            let fill = Canvas::fill_mask(&motion.mask, |x| {
                text.char_at_column(x)
                    .and_then(|i| colors.get(i).copied())
                    .unwrap_or(style.primary_color)
            });
            let canvas = composite(&layers, &motion.mask, fill, &ctx);

            let pad = text.padding;
            let content = (
                text.mask.width.saturating_sub(pad * 2),
                text.mask.height.saturating_sub(pad * 2),
            );
            let (x, y) = position(&style, (self.width, self.height), content);
            let offset_y = motion.offset_y.clamp(-(self.height as i32), self.height as i32);
            canvas.draw_onto(
                &mut frame,
                x.saturating_sub(pad as i32),
                y.saturating_sub(pad as i32).saturating_add(offset_y),
            );

            placed.push(RenderedSubtitle {
                text: line.text.clone(),
                style_name: style.name.clone(),
                x,
                y: y.saturating_add(offset_y),
                width: content.0,
                height: content.1,
                start_time: line.start_time,
                end_time: line.end_time,
            });
        }

        self.last_rendered = placed;
        Ok(frame)
    }

    fn background_frame(&mut self, t: f64, project: &Project) -> FrameBuffer {
        let key = background_key(project);
        let current = matches!(&self.background, Some((k, _)) if *k == key);
        if !current {
            let bg = Background::for_project(
                project,
                self.width,
                self.height,
                self.fps,
                &self.config,
                self.video_mode,
            );
            tracing::debug!(kind = bg.kind(), "background selected");
            self.background = Some((key, bg));
        }
        match self.background.as_mut() {
            Some((_, bg)) => bg.frame_at(t, self.width, self.height),
            None => FrameBuffer::solid(self.width, self.height, &background_color(&self.config)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{BoxRasterizer, Glyph, TextRasterizer};
    use lyricast_core::hash::hash_frame;
    use lyricast_core::{SubtitleTrack, WordTiming};
    use lyricast_fx::{param_map, EffectType};
    use std::sync::Arc;

    fn renderer() -> FrameRenderer {
        FrameRenderer::new(320, 180, 30.0, LyricastConfig::default())
            .unwrap()
            .with_fonts(FontLibrary::with_fallback(Arc::new(BoxRasterizer)))
    }

    fn project(lines: Vec<SubtitleLine>) -> Project {
        Project::new("test", SubtitleTrack::new(lines))
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(FrameRenderer::new(0, 10, 30.0, LyricastConfig::default()).is_err());
        assert!(FrameRenderer::new(10, 10, 0.0, LyricastConfig::default()).is_err());
    }

    #[test]
    fn test_empty_frame_is_background() {
        let mut r = renderer();
        let frame = r.render(1.0, &project(vec![]));
        assert_eq!((frame.width, frame.height), (320, 180));
        assert_eq!(frame.get_pixel(160, 90), Some([0, 0, 0, 255]));
        assert!(r.last_rendered().is_empty());
    }

    #[test]
    fn test_line_is_drawn_bottom_center() {
        let mut r = renderer();
        let p = project(vec![SubtitleLine::new(0.0, 2.0, "hello")]);
        let frame = r.render(1.0, &p);
        let placed = &r.last_rendered()[0];
        assert_eq!(placed.text, "hello");
        assert!(placed.height > 0);
        assert_eq!(placed.y, 180 - 10 - placed.height as i32);
        assert_ne!(hash_frame(&frame), hash_frame(&r.render(3.0, &p)));
    }

    #[test]
    fn test_karaoke_changes_pixels_over_time() {
        let mut r = FrameRenderer::new(640, 360, 30.0, LyricastConfig::default())
            .unwrap()
            .with_fonts(FontLibrary::with_fallback(Arc::new(BoxRasterizer)));
        let line = SubtitleLine::new(0.0, 4.0, "sing song")
            .with_words(vec![WordTiming::new("sing", 0.0, 1.0), WordTiming::new("song", 1.0, 2.0)]);
        let p = project(vec![line]);
        let early = hash_frame(&r.render(0.1, &p));
        let late = hash_frame(&r.render(3.0, &p));
        assert_ne!(early, late);
    }

    #[test]
    fn test_texture_cache_reused_across_frames() {
        let mut r = renderer();
        let p = project(vec![SubtitleLine::new(0.0, 2.0, "cached")]);
        r.render(0.5, &p);
        r.render(0.6, &p);
        assert_eq!(r.texture_cache().len(), 1);
        assert_eq!(r.texture_cache().stats(), (1, 1));
    }

    struct Broken;

    impl TextRasterizer for Broken {
        fn glyph(&self, _ch: char, _size: f32) -> LyricastResult<Glyph> {
            Err(LyricastError::render("glyph cache corrupted"))
        }

        fn line_metrics(&self, size: f32) -> (f32, f32) {
            (size, 0.0)
        }
    }

    #[test]
    fn test_render_failure_falls_back_and_counts() {
        let mut config = LyricastConfig::default();
        config.render.background_color = "#0000FF".into();
        let mut r = FrameRenderer::new(64, 64, 30.0, config)
            .unwrap()
            .with_fonts(FontLibrary::with_fallback(Arc::new(Broken)));
        let p = project(vec![SubtitleLine::new(0.0, 2.0, "x")]);
        assert!(r.try_render(1.0, &p).is_err());
        let frame = r.render(1.0, &p);
        assert_eq!(frame.get_pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(r.drop_count(), 1);
        // no visible line, no failure
        r.render(5.0, &p);
        assert_eq!(r.drop_count(), 1);
    }

    #[test]
    fn test_huge_bounce_moves_line_off_frame() {
        let mut r = renderer();
        r.effects_mut()
            .add(EffectType::Bounce, param_map! { "amplitude" => 1.0e12 });
        let p = project(vec![SubtitleLine::new(0.0, 2.0, "up")]);
        let frame = r.render(0.1, &p);
        assert_eq!(r.drop_count(), 0);
        assert!(r.last_rendered()[0].y < 0);
        assert_eq!(hash_frame(&frame), hash_frame(&r.render(5.0, &p)));
    }

    #[test]
    fn test_extreme_effect_params_still_render() {
        let mut r = renderer();
        let stack = r.effects_mut();
        stack.add(EffectType::Wave, param_map! { "amplitude" => -1.0e12 });
        stack.add(
            EffectType::Shadow,
            param_map! { "offset_x" => 1.0e12, "offset_y" => -1.0e12, "blur_radius" => 1.0e12 },
        );
        stack.add(EffectType::Outline, param_map! { "width" => 1.0e12 });
        stack.add(EffectType::Glow, param_map! { "radius" => 1.0e12 });
        stack.add(EffectType::Fire, param_map! { "flame_height" => -1.0e12, "turbulence" => 1.0e12 });
        stack.add(EffectType::Glass, param_map! { "thickness" => 1.0e12 });
        let p = project(vec![SubtitleLine::new(0.0, 2.0, "ok")]);
        let frame = r.render(0.5, &p);
        assert_eq!((frame.width, frame.height), (320, 180));
        assert_eq!(r.drop_count(), 0);
    }

    #[test]
    fn test_shader_follows_stack() {
        let mut r = renderer();
        r.effects_mut().add(EffectType::Glow, param_map! {});
        let shader = r.shader();
        assert!(shader.fragment.contains("enableGlow"));
        assert_eq!(shader, r.shader());
    }
}
