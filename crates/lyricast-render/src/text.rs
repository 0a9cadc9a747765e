//! Text rasterization into coverage masks.
//!
//! Fonts are rasterized on the CPU with fontdue. Faces are looked up by the
//! style's font name in the configured font directories, falling back to the
//! configured default font and finally to a box-glyph rasterizer so text
//! always renders, even on machines without the requested fonts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fontdue::{Font, FontSettings};
use lyricast_core::{LyricastError, LyricastResult, RenderConfig};

use crate::mask::AlphaMask;

/// One rasterized glyph, in fontdue's metric convention.
#[derive(Debug, Clone, Default)]
pub struct Glyph {
    pub width: usize,
    pub height: usize,
    pub xmin: i32,
    /// Bottom edge relative to the baseline (negative below).
    pub ymin: i32,
    pub advance: f32,
    pub coverage: Vec<u8>,
}

pub trait TextRasterizer: Send + Sync {
    fn glyph(&self, ch: char, size: f32) -> LyricastResult<Glyph>;

    /// (ascent, descent) in pixels, both positive.
    fn line_metrics(&self, size: f32) -> (f32, f32);
}

pub struct FontdueRasterizer {
    font: Font,
}

impl FontdueRasterizer {
    pub fn from_bytes(data: Vec<u8>) -> LyricastResult<Self> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| LyricastError::render(format!("failed to parse font: {}", e)))?;
        Ok(Self { font })
    }

    pub fn load(path: &Path) -> LyricastResult<Self> {
        let data = std::fs::read(path).map_err(|e| {
            LyricastError::asset(
                format!("failed to read font file {}: {}", path.display(), e),
                path,
            )
        })?;
        Self::from_bytes(data)
    }
}

impl TextRasterizer for FontdueRasterizer {
    fn glyph(&self, ch: char, size: f32) -> LyricastResult<Glyph> {
        let (metrics, coverage) = self.font.rasterize(ch, size);
        Ok(Glyph {
            width: metrics.width,
            height: metrics.height,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            advance: metrics.advance_width,
            coverage,
        })
    }

    fn line_metrics(&self, size: f32) -> (f32, f32) {
        match self.font.horizontal_line_metrics(size) {
            Some(m) => (m.ascent, -m.descent),
            None => (size * 0.8, size * 0.2),
        }
    }
}

/// Solid box per visible character. Deterministic, needs no font files.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxRasterizer;

impl TextRasterizer for BoxRasterizer {
    fn glyph(&self, ch: char, size: f32) -> LyricastResult<Glyph> {
        let advance = (size * 0.6).round().max(1.0);
        if ch.is_whitespace() {
            return Ok(Glyph {
                advance,
                ..Glyph::default()
            });
        }
        let width = (size * 0.5).round().max(1.0) as usize;
        let height = (size * 0.7).round().max(1.0) as usize;
        Ok(Glyph {
            width,
            height,
            xmin: ((advance as usize - width) / 2) as i32,
            ymin: 0,
            advance,
            coverage: vec![255; width * height],
        })
    }

    fn line_metrics(&self, size: f32) -> (f32, f32) {
        (size * 0.8, size * 0.2)
    }
}

const FALLBACK_FAMILIES: &[&str] = &["DejaVuSans", "LiberationSans-Regular", "Arial", "Helvetica"];

/// Font faces by family name.
pub struct FontLibrary {
    faces: HashMap<String, Arc<dyn TextRasterizer>>,
    font_dirs: Vec<PathBuf>,
    fallback: Arc<dyn TextRasterizer>,
}

impl FontLibrary {
    /// Library whose every lookup resolves to `fallback`.
    pub fn with_fallback(fallback: Arc<dyn TextRasterizer>) -> Self {
        Self {
            faces: HashMap::new(),
            font_dirs: Vec::new(),
            fallback,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        let default_path = config.font_path.clone().or_else(|| {
            FALLBACK_FAMILIES
                .iter()
                .find_map(|family| find_font_file(&config.font_dirs, family))
        });
        let fallback: Arc<dyn TextRasterizer> = match default_path {
            Some(path) => match FontdueRasterizer::load(&path) {
                Ok(face) => Arc::new(face),
                Err(e) => {
                    tracing::warn!("default font unavailable, using box glyphs: {}", e);
                    Arc::new(BoxRasterizer)
                }
            },
            None => {
                tracing::warn!("no usable font found, using box glyphs");
                Arc::new(BoxRasterizer)
            }
        };
        Self {
            faces: HashMap::new(),
            font_dirs: config.font_dirs.clone(),
            fallback,
        }
    }

    pub fn insert(&mut self, family: &str, face: Arc<dyn TextRasterizer>) {
        self.faces.insert(family.to_lowercase(), face);
    }

    /// Resolve a family, scanning the font directories on first use.
    pub fn face(&mut self, family: &str) -> Arc<dyn TextRasterizer> {
        let key = family.to_lowercase();
        if let Some(face) = self.faces.get(&key) {
            return face.clone();
        }
        let face = match find_font_file(&self.font_dirs, family) {
            Some(path) => match FontdueRasterizer::load(&path) {
                Ok(face) => {
                    tracing::debug!(family, path = %path.display(), "loaded font");
                    Arc::new(face) as Arc<dyn TextRasterizer>
                }
                Err(e) => {
                    tracing::warn!(family, "font failed to load: {}", e);
                    self.fallback.clone()
                }
            },
            None => self.fallback.clone(),
        };
        self.faces.insert(key, face.clone());
        face
    }
}

fn find_font_file(dirs: &[PathBuf], family: &str) -> Option<PathBuf> {
    let wanted = normalize_family(family);
    dirs.iter().find_map(|dir| search_dir(dir, &wanted, 4))
}

fn normalize_family(name: &str) -> String {
    name.to_lowercase().replace([' ', '-', '_'], "")
}

fn search_dir(dir: &Path, wanted: &str, depth: u32) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
        let stem_matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| normalize_family(s) == wanted);
        if is_font && stem_matches {
            return Some(path);
        }
    }
    if depth == 0 {
        return None;
    }
    subdirs
        .iter()
        .find_map(|sub| search_dir(sub, wanted, depth - 1))
}

/// A line of text rasterized into a padded mask.
#[derive(Debug, Clone)]
pub struct RasterizedText {
    pub mask: AlphaMask,
    pub padding: u32,
    /// Horizontal extent of each character in mask columns, `[x0, x1)`.
    pub char_spans: Vec<(i32, i32)>,
    pub font_size: f32,
}

impl RasterizedText {
    pub fn char_count(&self) -> usize {
        self.char_spans.len()
    }

    /// Index of the character covering column `x`, or the nearest one to its left.
    pub fn char_at_column(&self, x: i32) -> Option<usize> {
        let idx = self.char_spans.partition_point(|(x0, _)| *x0 <= x);
        idx.checked_sub(1)
    }
}

/// Room around the glyphs for outlines, shadows and glows.
pub fn effect_padding(font_size: f32) -> u32 {
    20u32.max((font_size / 4.0) as u32)
}

const MAX_MASK_SIDE: u32 = 16_384;

/// Rasterize a single line of text.
pub fn rasterize_line(
    face: &dyn TextRasterizer,
    text: &str,
    font_size: f32,
) -> LyricastResult<RasterizedText> {
    if !font_size.is_finite() || font_size <= 0.0 {
        return Err(LyricastError::render(format!(
            "invalid font size {}",
            font_size
        )));
    }

    let mut glyphs = Vec::with_capacity(text.len());
    let mut pen = 0.0f32;
    for ch in text.chars() {
        let glyph = face.glyph(ch, font_size)?;
        let start = pen;
        pen += glyph.advance;
        glyphs.push((start, glyph));
    }

    let (ascent, descent) = face.line_metrics(font_size);
    let padding = effect_padding(font_size);
    let text_width = pen.ceil().max(1.0) as u32;
    let text_height = (ascent + descent).ceil().max(1.0) as u32;
    let width = text_width + padding * 2;
    let height = text_height + padding * 2;
    if width > MAX_MASK_SIDE || height > MAX_MASK_SIDE {
        return Err(LyricastError::render(format!(
            "text mask {}x{} exceeds the {} pixel limit",
            width, height, MAX_MASK_SIDE
        )));
    }

    let mut mask = AlphaMask::new(width, height);
    let baseline = padding as i32 + ascent.round() as i32;
    let mut char_spans = Vec::with_capacity(glyphs.len());
    for (start, glyph) in &glyphs {
        let origin = padding as i32 + start.round() as i32;
        char_spans.push((origin, padding as i32 + (start + glyph.advance).round() as i32));

        let gx = origin + glyph.xmin;
        let gy = baseline - (glyph.height as i32 + glyph.ymin);
        for row in 0..glyph.height {
            for col in 0..glyph.width {
                let coverage = glyph.coverage[row * glyph.width + col];
                if coverage > 0 {
                    mask.max_at(gx + col as i32, gy + row as i32, coverage);
                }
            }
        }
    }

    Ok(RasterizedText {
        mask,
        padding,
        char_spans,
        font_size,
    })
}
