//! # lyricast-core
//!
//! Core types and primitives for the Lyricast karaoke video engine.
//! This crate contains the foundational types shared across all Lyricast crates:
//! frames, colors, durations, easing, configuration, error types and the
//! project/subtitle data model consumed by the renderer and exporter.

pub mod color;
pub mod config;
pub mod easing;
pub mod error;
pub mod frame;
pub mod hash;
pub mod project;
pub mod subtitle;
pub mod time;

pub use config::*;

pub use color::Color;
pub use easing::{BlendMode, Easing};
pub use error::{LyricastError, LyricastResult};
pub use frame::{Frame, FrameBuffer, PixelFormat};
pub use project::{AudioSource, ImageSource, Project, VideoSource};
pub use subtitle::{SubtitleLine, SubtitleStyle, SubtitleTrack, WordState, WordTiming};
pub use time::{Duration, Timestamp};
