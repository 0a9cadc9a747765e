//! Still-image backgrounds.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use lyricast_core::{FrameBuffer, LyricastError, LyricastResult};

/// Decode an image file into an RGBA frame.
pub fn load_image(path: &Path) -> LyricastResult<FrameBuffer> {
    let img = image::open(path).map_err(|e| {
        LyricastError::asset(
            format!("failed to load image '{}': {}", path.display(), e),
            path,
        )
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    FrameBuffer::from_rgba(width, height, rgba.into_raw())
}

/// Scale to exactly `width`x`height`, preserving aspect ratio by cropping
/// the overflowing axis around the center.
pub fn cover(fb: &FrameBuffer, width: u32, height: u32) -> LyricastResult<FrameBuffer> {
    if fb.width == 0 || fb.height == 0 || width == 0 || height == 0 {
        return Err(LyricastError::invalid("cannot scale an empty image"));
    }
    let src = RgbaImage::from_raw(fb.width, fb.height, fb.to_rgba8().into_bytes())
        .ok_or_else(|| LyricastError::render("image buffer does not match its dimensions"))?;

    let target_aspect = width as f64 / height as f64;
    let src_aspect = fb.width as f64 / fb.height as f64;
    let (crop_w, crop_h) = if src_aspect > target_aspect {
        (((fb.height as f64 * target_aspect).round() as u32).clamp(1, fb.width), fb.height)
    } else {
        (fb.width, ((fb.width as f64 / target_aspect).round() as u32).clamp(1, fb.height))
    };
    let x = (fb.width - crop_w) / 2;
    let y = (fb.height - crop_h) / 2;

    let cropped = imageops::crop_imm(&src, x, y, crop_w, crop_h).to_image();
    let scaled = if crop_w == width && crop_h == height {
        cropped
    } else {
        imageops::resize(&cropped, width, height, FilterType::Triangle)
    };
    FrameBuffer::from_rgba(width, height, scaled.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricast_core::Color;

    #[test]
    fn test_load_image_missing_file() {
        assert!(load_image(Path::new("/nonexistent/image.png")).is_err());
    }

    #[test]
    fn test_cover_exact_size() {
        let fb = FrameBuffer::solid(200, 100, &Color::RED);
        let out = cover(&fb, 64, 64).unwrap();
        assert_eq!((out.width, out.height), (64, 64));
        assert_eq!(out.get_pixel(10, 10), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_cover_crops_sides_of_wide_image() {
        // left third blue, rest red; a square crop of the center is all red
        let mut fb = FrameBuffer::solid(300, 100, &Color::RED);
        for y in 0..100 {
            for x in 0..100 {
                fb.set_pixel(x, y, [0, 0, 255, 255]);
            }
        }
        let out = cover(&fb, 100, 100).unwrap();
        assert_eq!(out.get_pixel(0, 50), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_cover_rejects_empty() {
        let fb = FrameBuffer::solid(10, 10, &Color::RED);
        assert!(cover(&fb, 0, 10).is_err());
    }

    #[test]
    fn test_load_png_roundtrip_through_disk() {
        let dir = std::env::temp_dir().join("lyricast-image-loader-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bg.png");
        let img = RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();
        let fb = load_image(&path).unwrap();
        assert_eq!((fb.width, fb.height), (4, 2));
        assert_eq!(fb.get_pixel(3, 1), Some([10, 20, 30, 255]));
    }
}
