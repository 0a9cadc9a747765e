//! # lyricast-encode
//!
//! Video export for Lyricast. Probes FFmpeg, validates export settings,
//! builds the FFmpeg command line and pumps raw RGBA frames into the encoder
//! while tracking progress from its stderr. Several exports can be queued
//! and run in order as a batch.

pub mod batch;
pub mod capabilities;
pub mod command;
pub mod error;
pub mod process;
pub mod producer;
pub mod progress;
pub mod pump;
pub mod settings;

pub use batch::{BatchEvent, BatchExport, BatchHandle, BatchStatus, JobReport, JobStatus};
pub use capabilities::{CapabilityProbe, Capabilities};
pub use command::build_command;
pub use error::{classify_stderr, ErrorCategory, ExportError, FailureCategory, SettingsError};
pub use process::{EncoderLauncher, EncoderProcess, FfmpegLauncher, MemoryLauncher};
pub use producer::FrameProducer;
pub use progress::{EncoderStats, ProgressSnapshot};
pub use pump::{ExportEvent, ExportHandle, ExportPump, ExportState};
pub use settings::{format_options, quality_presets, validate, ExportSettings};
