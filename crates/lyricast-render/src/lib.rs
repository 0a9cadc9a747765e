//! # lyricast-render
//!
//! CPU frame renderer for Lyricast.
//!
//! For a timestamp, [`pipeline::FrameRenderer`] picks the visible subtitle
//! lines, rasterizes them into coverage masks, runs the effect stack over
//! them and composites the result onto the project background (flat color,
//! still image or decoded video frame).

pub mod background;
pub mod blur;
pub mod cache;
pub mod decode_cache;
pub mod effects;
pub mod image_loader;
pub mod karaoke;
pub mod layout;
pub mod mask;
pub mod pipeline;
pub mod text;
pub mod video_decoder;

pub use background::{Background, VideoMode};
pub use pipeline::{visible_subtitles, FrameRenderer, RenderedSubtitle};
pub use text::{BoxRasterizer, FontLibrary, FontdueRasterizer, Glyph, TextRasterizer};
