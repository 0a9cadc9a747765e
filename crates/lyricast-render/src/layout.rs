//! Subtitle placement from ASS alignment and margins.

use lyricast_core::SubtitleStyle;

/// Style font size scaled to the output height.
pub fn scaled_font_size(style: &SubtitleStyle, output_height: u32, reference_height: u32) -> f32 {
    let reference = reference_height.max(1) as f32;
    (style.font_size * output_height as f32 / reference).floor().max(1.0)
}

/// Top-left position of a `width`x`height` block inside the viewport.
///
/// Alignment follows the numpad: 1-3 bottom, 4-6 middle, 7-9 top, and
/// left/center/right within each row. Anything outside 1-9 is treated as 2.
pub fn position(
    style: &SubtitleStyle,
    viewport: (u32, u32),
    size: (u32, u32),
) -> (i32, i32) {
    let (vw, vh) = (viewport.0 as i32, viewport.1 as i32);
    let (w, h) = (size.0 as i32, size.1 as i32);
    let alignment = if (1..=9).contains(&style.alignment) {
        style.alignment
    } else {
        2
    };

    let x = match (alignment - 1) % 3 {
        0 => style.margin_l as i32,
        1 => (vw - w) / 2,
        _ => vw - style.margin_r as i32 - w,
    };
    let y = match (alignment - 1) / 3 {
        0 => vh - style.margin_v as i32 - h,
        1 => (vh - h) / 2,
        _ => style.margin_v as i32,
    };
    (x, y)
}
