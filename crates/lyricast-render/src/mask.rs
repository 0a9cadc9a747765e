//! Single-channel coverage masks and the float RGBA canvas effects draw into.

use lyricast_core::frame::FrameBuffer;
use lyricast_core::Color;

/// 8-bit coverage, row-major. Reads outside the mask are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl AlphaMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Largest shift that can still move coverage within the mask. Effect
    /// offsets are clamped to it.
    pub fn reach(&self) -> i32 {
        self.width.max(self.height).min(1 << 20) as i32 + 1
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        self.index(x, y).map_or(0, |i| self.data[i])
    }

    /// Coverage in 0.0..=1.0.
    #[inline]
    pub fn sample(&self, x: i32, y: i32) -> f32 {
        self.get(x, y) as f32 / 255.0
    }

    pub fn set(&mut self, x: i32, y: i32, value: u8) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = value;
        }
    }

    /// Keep the brighter of the existing and new coverage.
    pub fn max_at(&mut self, x: i32, y: i32, value: u8) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = self.data[i].max(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|v| *v == 0)
    }

    /// Zero every column in `x0..x1`.
    pub fn clear_columns(&mut self, x0: i32, x1: i32) {
        let x0 = x0.clamp(0, self.width as i32) as usize;
        let x1 = x1.clamp(0, self.width as i32) as usize;
        if x0 >= x1 {
            return;
        }
        for row in self.data.chunks_exact_mut(self.width as usize) {
            row[x0..x1].fill(0);
        }
    }

    /// Shift each column vertically by `offset(x)` pixels.
    pub fn displace_columns(&self, offset: impl Fn(i32) -> i32) -> AlphaMask {
        let mut out = AlphaMask::new(self.width, self.height);
        let reach = self.reach();
        for x in 0..self.width as i32 {
            let dy = offset(x).clamp(-reach, reach);
            for y in 0..self.height as i32 {
                out.set(x, y, self.get(x, y - dy));
            }
        }
        out
    }

    /// Neighborhood max over `quality` directions out to `width` pixels.
    pub fn dilate(&self, width: f32, quality: u32) -> AlphaMask {
        let steps = (width.max(0.0).floor() as i32).min(self.reach());
        let directions = quality.clamp(1, 32);
        if steps == 0 {
            return self.clone();
        }
        let offsets: Vec<(i32, i32)> = (0..directions)
            .flat_map(|i| {
                let angle = std::f32::consts::TAU * i as f32 / directions as f32;
                (1..=steps).map(move |r| {
                    (
                        (angle.cos() * r as f32).round() as i32,
                        (angle.sin() * r as f32).round() as i32,
                    )
                })
            })
            .collect();

        let mut out = self.clone();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let mut m = self.get(x, y);
                for (dx, dy) in &offsets {
                    m = m.max(self.get(x + dx, y + dy));
                    if m == 255 {
                        break;
                    }
                }
                out.set(x, y, m);
            }
        }
        out
    }
}

/// Straight-alpha float RGBA pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    /// Text fill: each column takes `color_at(x)` at the mask's coverage.
    pub fn fill_mask(mask: &AlphaMask, color_at: impl Fn(i32) -> Color) -> Self {
        let mut canvas = Canvas::new(mask.width, mask.height);
        let w = mask.width as usize;
        for (i, px) in canvas.pixels.iter_mut().enumerate() {
            let c = color_at((i % w) as i32);
            let coverage = mask.data[i] as f32 / 255.0;
            *px = [c.r, c.g, c.b, c.a * coverage];
        }
        canvas
    }

    pub fn to_frame(&self) -> FrameBuffer {
        let mut data = Vec::with_capacity(self.pixels.len() * 4);
        for px in &self.pixels {
            for c in px {
                data.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }
        FrameBuffer {
            data,
            width: self.width,
            height: self.height,
            format: lyricast_core::PixelFormat::Rgba8,
        }
    }

    /// Composite over `dst` at (dx, dy).
    pub fn draw_onto(&self, dst: &mut FrameBuffer, dx: i32, dy: i32) {
        let frame = self.to_frame();
        dst.composite_over(&frame, dx, dy);
    }

    pub fn pixel_rgba8(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let px = self.pixels[y as usize * self.width as usize + x as usize];
        let mut out = [0u8; 4];
        for (o, c) in out.iter_mut().zip(px) {
            *o = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extreme_shifts_clip() {
        let mut mask = AlphaMask::new(4, 4);
        mask.set(1, 1, 255);
        assert_eq!(mask.displace_columns(|_| i32::MIN), AlphaMask::new(4, 4));
        assert_eq!(mask.displace_columns(|_| i32::MAX), AlphaMask::new(4, 4));
        let grown = mask.dilate(1.0e12, 8);
        assert_eq!(grown.get(3, 3), 255);
    }

    #[test]
    fn test_out_of_bounds_reads_zero() {
        let mut mask = AlphaMask::new(4, 4);
        mask.set(1, 1, 200);
        assert_eq!(mask.get(1, 1), 200);
        assert_eq!(mask.get(-1, 0), 0);
        assert_eq!(mask.get(4, 0), 0);
    }

    #[test]
    fn test_dilate_grows_coverage() {
        let mut mask = AlphaMask::new(9, 9);
        mask.set(4, 4, 255);
        let grown = mask.dilate(2.0, 8);
        assert_eq!(grown.get(6, 4), 255);
        assert_eq!(grown.get(4, 2), 255);
        assert_eq!(grown.get(0, 0), 0);
        assert_eq!(mask.dilate(0.0, 8), mask);
    }

    #[test]
    fn test_clear_columns() {
        let mut mask = AlphaMask::new(4, 2);
        mask.data.fill(255);
        mask.clear_columns(2, 10);
        assert_eq!(mask.get(1, 1), 255);
        assert_eq!(mask.get(2, 1), 0);
        assert_eq!(mask.get(3, 0), 0);
    }

    #[test]
    fn test_displace_columns() {
        let mut mask = AlphaMask::new(2, 4);
        mask.set(0, 1, 255);
        mask.set(1, 1, 255);
        let moved = mask.displace_columns(|x| if x == 0 { 2 } else { 0 });
        assert_eq!(moved.get(0, 3), 255);
        assert_eq!(moved.get(0, 1), 0);
        assert_eq!(moved.get(1, 1), 255);
    }

    #[test]
    fn test_fill_mask_scales_alpha() {
        let mut mask = AlphaMask::new(2, 1);
        mask.data = vec![255, 0];
        let canvas = Canvas::fill_mask(&mask, |_| Color::RED);
        assert_eq!(canvas.pixel_rgba8(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel_rgba8(1, 0), Some([255, 0, 0, 0]));
    }
}
