//! # lyricast-fx
//!
//! Text effect layers and the GLSL generated from them.
//!
//! [`EffectStack`] owns an ordered set of effect layers. [`codegen::generate`]
//! turns the enabled layers into vertex/fragment shader source for a GPU
//! preview, and [`uniforms::uniforms`] computes the matching uniform values
//! for a point in time. The CPU compositor in `lyricast-render` reads the same
//! layers and mirrors the shader math.

pub mod animation;
pub mod codegen;
pub mod effect;
pub mod params;
pub mod presets;
pub mod stack;
pub mod uniforms;

pub use codegen::{generate, ShaderSource};
pub use effect::{EffectParams, EffectType};
pub use params::{ParamMap, ParamValue};
pub use stack::{EffectId, EffectLayer, EffectStack};
