use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA color representation with f32 components in [0.0, 1.0] range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Create a new RGBA color.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color (alpha = 1.0).
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Build a color from an effect parameter triple or quad.
    /// Triples are opaque; anything shorter than three components is black.
    pub fn from_slice(components: &[f32]) -> Self {
        match components {
            [r, g, b, a, ..] => Self::rgba(*r, *g, *b, *a),
            [r, g, b] => Self::rgb(*r, *g, *b),
            _ => Self::BLACK,
        }
    }

    /// Create a color from a hex string (e.g., "#FF0000" or "#FF0000FF").
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let hex = hex.trim_start_matches('#');
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .map(|v| v as f32 / 255.0)
                .ok_or(ColorError::InvalidHex)
        };
        match hex.len() {
            6 => Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Self::rgba(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(ColorError::InvalidHex),
        }
    }

    /// Parse an ASS/SSA color literal such as `&H00FFFFFF` or `&H80000000&`.
    ///
    /// ASS stores channels as `AABBGGRR` and alpha is inverted
    /// (`00` is opaque, `FF` is fully transparent). Six-digit literals are opaque.
    pub fn from_ass(literal: &str) -> Result<Self, ColorError> {
        let body = literal.trim().trim_end_matches('&');
        let body = body
            .strip_prefix("&H")
            .or_else(|| body.strip_prefix("&h"))
            .ok_or(ColorError::InvalidAss)?;
        if body.is_empty() || body.len() > 8 {
            return Err(ColorError::InvalidAss);
        }
        let value = u32::from_str_radix(body, 16).map_err(|_| ColorError::InvalidAss)?;
        let inv_alpha = (value >> 24) & 0xFF;
        let b = (value >> 16) & 0xFF;
        let g = (value >> 8) & 0xFF;
        let r = value & 0xFF;
        Ok(Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            (255 - inv_alpha) as f32 / 255.0,
        ))
    }

    /// Format as an ASS color literal (`&HAABBGGRR`).
    pub fn to_ass(&self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        format!("&H{:02X}{:02X}{:02X}{:02X}", 255 - a, b, g, r)
    }

    /// Convert to RGBA u8 tuple.
    pub fn to_rgba8(&self) -> [u8; 4] {
        [
            (self.r * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.g * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.b * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.a * 255.0).round().clamp(0.0, 255.0) as u8,
        ]
    }

    /// Components as `[r, g, b, a]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Copy of this color with a different alpha.
    pub fn with_alpha(&self, a: f32) -> Color {
        Color { a, ..*self }
    }

    /// Linearly interpolate between two colors.
    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    // --- Named constants ---

    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
    pub const CYAN: Color = Color::rgb(0.0, 1.0, 1.0);
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", r, g, b, a)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ColorError {
    #[error("invalid hex color string")]
    InvalidHex,
    #[error("invalid ASS color literal")]
    InvalidAss,
}
