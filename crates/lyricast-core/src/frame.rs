use serde::{Deserialize, Serialize};

use crate::error::{LyricastError, LyricastResult};

/// Pixel format of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (4 bytes per pixel).
    Rgba8,
    /// 8-bit RGB (3 bytes per pixel, no alpha).
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A single video frame as a raw pixel buffer.
///
/// Rgba8 buffers are exactly the headerless layout FFmpeg expects on stdin
/// for `-f rawvideo -pix_fmt rgba`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
}

impl FrameBuffer {
    /// Create a new frame buffer filled with zeros (transparent black).
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            data: vec![0u8; size],
            width,
            height,
            format,
        }
    }

    /// Create a frame buffer filled with a solid color.
    pub fn solid(width: u32, height: u32, color: &crate::Color) -> Self {
        let pixel = color.to_rgba8();
        let pixel_count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&pixel);
        }
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        }
    }

    /// Wrap raw RGBA bytes, checking the length matches the dimensions.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> LyricastResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(LyricastError::invalid(format!(
                "RGBA buffer for {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        })
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Total byte size of the pixel data.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Consume the buffer and return its raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * bpp;
        let px = &self.data[offset..offset + bpp];
        match self.format {
            PixelFormat::Rgba8 => Some([px[0], px[1], px[2], px[3]]),
            PixelFormat::Rgb8 => Some([px[0], px[1], px[2], 255]),
        }
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * bpp;
        self.data[offset..offset + bpp].copy_from_slice(&rgba[..bpp]);
    }

    /// Convert to an RGBA8 buffer (no-op for RGBA input).
    pub fn to_rgba8(&self) -> FrameBuffer {
        match self.format {
            PixelFormat::Rgba8 => self.clone(),
            PixelFormat::Rgb8 => {
                let mut data = Vec::with_capacity(self.pixel_count() * 4);
                for px in self.data.chunks_exact(3) {
                    data.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
                FrameBuffer {
                    data,
                    width: self.width,
                    height: self.height,
                    format: PixelFormat::Rgba8,
                }
            }
        }
    }

    /// Alpha-composite `src` on top of `self` at position (dx, dy).
    /// Integer math over row slices so the inner loop auto-vectorizes.
    pub fn composite_over(&mut self, src: &FrameBuffer, dx: i32, dy: i32) {
        if self.format != PixelFormat::Rgba8 || src.format != PixelFormat::Rgba8 {
            return;
        }

        // i64 so positions far off-canvas clip instead of overflowing
        let (dx, dy) = (dx as i64, dy as i64);
        let dst_width = self.width as i64;
        let dst_height = self.height as i64;

        let start_y = (-dy).max(0);
        let end_y = (src.height as i64).min(dst_height - dy);
        let start_x = (-dx).max(0);
        let end_x = (src.width as i64).min(dst_width - dx);

        if start_x >= end_x || start_y >= end_y {
            return;
        }

        let src_stride = (src.width * 4) as usize;
        let dst_stride = (self.width * 4) as usize;

        for sy in start_y..end_y {
            let dst_y = dy + sy;
            let src_row_start = (sy as usize * src_stride) + (start_x as usize * 4);
            let dst_row_start = (dst_y as usize * dst_stride) + ((dx + start_x) as usize * 4);
            let len = (end_x - start_x) as usize * 4;

            let src_slice = &src.data[src_row_start..src_row_start + len];
            let dst_slice = &mut self.data[dst_row_start..dst_row_start + len];

            for (s, d) in src_slice.chunks_exact(4).zip(dst_slice.chunks_exact_mut(4)) {
                over_pixel(s, d);
            }
        }
    }
}

/// Porter-Duff "over" for one straight-alpha RGBA8 pixel.
#[inline]
pub fn over_pixel(s: &[u8], d: &mut [u8]) {
    let sa = s[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        d.copy_from_slice(&s[..4]);
        return;
    }

    let da = d[3] as u32;
    let inv_sa = 255 - sa;
    let out_a = sa + ((da * inv_sa) / 255);
    if out_a == 0 {
        return;
    }

    for c in 0..3 {
        let sc = s[c] as u32;
        let dc = d[c] as u32;
        d[c] = ((sc * sa * 255 + dc * da * inv_sa) / (out_a * 255)) as u8;
    }
    d[3] = out_a as u8;
}

/// Represents a frame in the export timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Zero-based frame index.
    pub index: u64,
}

impl Frame {
    pub fn new(index: u64) -> Self {
        Self { index }
    }

    /// Convert a frame index to a timestamp given a frame rate.
    pub fn to_timestamp(&self, fps: f64) -> crate::Timestamp {
        crate::Timestamp::from_seconds(self.index as f64 / fps)
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({})", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn test_frame_buffer_new() {
        let fb = FrameBuffer::new(1920, 1080, PixelFormat::Rgba8);
        assert_eq!(fb.byte_size(), 1920 * 1080 * 4);
        assert_eq!(fb.pixel_count(), 1920 * 1080);
    }

    #[test]
    fn test_frame_buffer_solid() {
        let fb = FrameBuffer::solid(2, 2, &Color::RED);
        assert_eq!(fb.get_pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(fb.get_pixel(1, 1), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_from_rgba_checks_length() {
        assert!(FrameBuffer::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(FrameBuffer::from_rgba(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn test_frame_buffer_out_of_bounds() {
        let mut fb = FrameBuffer::new(10, 10, PixelFormat::Rgba8);
        fb.set_pixel(10, 10, [1, 2, 3, 4]);
        assert_eq!(fb.get_pixel(10, 0), None);
        assert_eq!(fb.get_pixel(0, 10), None);
    }

    #[test]
    fn test_rgb_to_rgba() {
        let mut fb = FrameBuffer::new(1, 1, PixelFormat::Rgb8);
        fb.set_pixel(0, 0, [10, 20, 30, 0]);
        let rgba = fb.to_rgba8();
        assert_eq!(rgba.get_pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn test_composite_over_opaque() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::BLUE);
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.composite_over(&src, 1, 1);
        assert_eq!(dst.get_pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(0, 0), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_composite_over_clips_negative_offset() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::BLUE);
        let src = FrameBuffer::solid(3, 3, &Color::RED);
        dst.composite_over(&src, -2, -2);
        assert_eq!(dst.get_pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(1, 1), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_composite_over_extreme_offsets() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::BLUE);
        let src = FrameBuffer::solid(3, 3, &Color::RED);
        for (dx, dy) in [(i32::MIN, 0), (0, i32::MIN), (i32::MAX, i32::MAX), (i32::MIN, i32::MAX)] {
            dst.composite_over(&src, dx, dy);
        }
        assert_eq!(dst, FrameBuffer::solid(4, 4, &Color::BLUE));
    }

    #[test]
    fn test_composite_over_semi_transparent() {
        let mut dst = FrameBuffer::solid(2, 2, &Color::WHITE);
        let mut src = FrameBuffer::new(1, 1, PixelFormat::Rgba8);
        src.set_pixel(0, 0, [255, 0, 0, 128]);

        dst.composite_over(&src, 0, 0);

        let pixel = dst.get_pixel(0, 0).unwrap();
        assert!(pixel[0] > 200);
        assert!(pixel[1] > 50 && pixel[1] < 200);
        assert!(pixel[2] > 50 && pixel[2] < 200);
    }

    #[test]
    fn test_frame_to_timestamp() {
        let ts = Frame::new(30).to_timestamp(30.0);
        assert!((ts.as_seconds() - 1.0).abs() < 0.001);
    }
}
