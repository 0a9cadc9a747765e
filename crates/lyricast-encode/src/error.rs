//! Export error taxonomy.
//!
//! Configuration problems are caught before FFmpeg starts. Process failures
//! are classified from FFmpeg's stderr into a [`FailureCategory`] so the user
//! sees a short message and a remediation hint instead of raw output.

use std::fmt;

/// Broad class of an export error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad settings or missing FFmpeg support. Nothing was started.
    Configuration,
    /// FFmpeg failed to start, died or misbehaved while encoding.
    Process,
    /// Timeouts and resource cleanup failures.
    Resource,
    /// User cancellation.
    Cancelled,
}

/// Classification of FFmpeg's stderr text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    MissingFile,
    PermissionDenied,
    InvalidData,
    MissingCodec,
    MissingEncoder,
    DiskFull,
    Unknown,
}

impl FailureCategory {
    pub fn describe(&self) -> &'static str {
        match self {
            FailureCategory::MissingFile => "input file not found",
            FailureCategory::PermissionDenied => "permission denied",
            FailureCategory::InvalidData => "invalid input data format",
            FailureCategory::MissingCodec => "codec not supported by FFmpeg",
            FailureCategory::MissingEncoder => "video encoder not available",
            FailureCategory::DiskFull => "insufficient disk space",
            FailureCategory::Unknown => "FFmpeg error",
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            FailureCategory::MissingFile => {
                "Check that the audio file exists and the output directory is reachable."
            }
            FailureCategory::PermissionDenied => {
                "Check file access: the output location must be writable and inputs readable."
            }
            FailureCategory::InvalidData => {
                "The input media may be corrupted or in an unsupported format; try re-encoding it."
            }
            FailureCategory::MissingCodec | FailureCategory::MissingEncoder => {
                "Install an FFmpeg build with support for the selected codec, or pick another codec."
            }
            FailureCategory::DiskFull => "Free disk space or choose another output location.",
            FailureCategory::Unknown => "Inspect the FFmpeg output above for details.",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Classify FFmpeg stderr by substring. Returns the category and a detail
/// string; unknown failures keep the last three lines of output.
pub fn classify_stderr(stderr: &str) -> (FailureCategory, String) {
    let lower = stderr.to_lowercase();
    let category = if stderr.contains("No such file or directory") {
        FailureCategory::MissingFile
    } else if stderr.contains("Permission denied") {
        FailureCategory::PermissionDenied
    } else if stderr.contains("Invalid data found") {
        FailureCategory::InvalidData
    } else if stderr.contains("Codec not supported") {
        FailureCategory::MissingCodec
    } else if stderr.contains("Unknown encoder") || stderr.contains("Encoder not found") {
        FailureCategory::MissingEncoder
    } else if lower.contains("disk full") || lower.contains("no space left on device") {
        FailureCategory::DiskFull
    } else {
        FailureCategory::Unknown
    };

    let detail = match category {
        FailureCategory::Unknown => {
            let lines: Vec<&str> = stderr
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            let tail = &lines[lines.len().saturating_sub(3)..];
            if tail.is_empty() {
                "unknown FFmpeg error".to_string()
            } else {
                tail.join(" ")
            }
        }
        known => known.describe().to_string(),
    };
    (category, detail)
}

/// A single rejected export setting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("codec '{0}' not supported by FFmpeg")]
    MissingCodec(String),

    #[error("format '{0}' not supported by FFmpeg")]
    MissingFormat(String),

    #[error("invalid resolution {width}x{height}: width and height must be positive")]
    NonPositiveResolution { width: u32, height: u32 },

    #[error("resolution {width}x{height} must have even width and height for H.264 encoding")]
    OddResolution { width: u32, height: u32 },

    #[error("frame rate {0} must be within (0, 120] fps")]
    FrameRate(f64),

    #[error("bitrate must be positive")]
    Bitrate,

    #[error("CRF {0} must be between 0 and 51")]
    Crf(i32),
}

impl SettingsError {
    pub fn remediation(&self) -> &'static str {
        match self {
            SettingsError::MissingCodec(_) => {
                "Install FFmpeg with support for this codec, or choose libx264."
            }
            SettingsError::MissingFormat(_) => "Choose a supported container such as mp4.",
            SettingsError::NonPositiveResolution { .. } | SettingsError::OddResolution { .. } => {
                "Use an even output resolution such as 1920x1080."
            }
            SettingsError::FrameRate(_) => "Use a frame rate between 1 and 120 fps.",
            SettingsError::Bitrate => "Set a positive video bitrate in kbps.",
            SettingsError::Crf(_) => "Use a CRF between 0 (lossless) and 51.",
        }
    }
}

fn join_settings(errors: &[SettingsError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn exit_text(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code".to_string(),
    }
}

/// Categorized export failure surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("FFmpeg not available: {0}")]
    FfmpegUnavailable(String),

    #[error("export settings validation failed: {}", join_settings(.0))]
    InvalidSettings(Vec<SettingsError>),

    #[error("failed to start FFmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("FFmpeg failed ({}): {detail}", exit_text(.exit_code))]
    Process {
        category: FailureCategory,
        detail: String,
        exit_code: Option<i32>,
    },

    #[error("FFmpeg closed its input unexpectedly: {0}")]
    BrokenPipe(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("export is {actual}, cannot {action}")]
    InvalidState {
        action: &'static str,
        actual: &'static str,
    },

    #[error("export cancelled")]
    Cancelled,

    #[error("batch already has a job named '{0}'")]
    DuplicateJob(String),
}

impl ExportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExportError::FfmpegUnavailable(_)
            | ExportError::InvalidSettings(_)
            | ExportError::InvalidState { .. }
            | ExportError::DuplicateJob(_) => ErrorCategory::Configuration,
            ExportError::Spawn(_) | ExportError::Process { .. } | ExportError::BrokenPipe(_) => {
                ErrorCategory::Process
            }
            ExportError::Timeout(_) | ExportError::Resource(_) => ErrorCategory::Resource,
            ExportError::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// The stderr classification, for process failures.
    pub fn failure(&self) -> Option<FailureCategory> {
        match self {
            ExportError::Process { category, .. } => Some(*category),
            _ => None,
        }
    }

    /// Actionable text for the user.
    pub fn remediation(&self) -> String {
        match self {
            ExportError::FfmpegUnavailable(_) => {
                "Install FFmpeg (https://ffmpeg.org/download.html) and make sure it is on PATH \
                 or set export.ffmpeg_path."
                    .to_string()
            }
            ExportError::InvalidSettings(errors) => errors
                .iter()
                .map(SettingsError::remediation)
                .collect::<Vec<_>>()
                .join(" "),
            ExportError::Spawn(_) => {
                "Check that export.ffmpeg_path points to an executable FFmpeg.".to_string()
            }
            ExportError::Process { category, .. } => category.remediation().to_string(),
            ExportError::BrokenPipe(_) => {
                "FFmpeg stopped reading frames; check its output for the underlying error."
                    .to_string()
            }
            ExportError::Timeout(_) => {
                "FFmpeg did not respond in time; the system may be overloaded.".to_string()
            }
            ExportError::Resource(_) => "Retry the export.".to_string(),
            ExportError::InvalidState { .. } => {
                "Wait for the current export to finish or cancel it first.".to_string()
            }
            ExportError::Cancelled => "Start the export again to produce the file.".to_string(),
            ExportError::DuplicateJob(_) => "Give each batch job a unique id.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_patterns() {
        let cases = [
            ("song.mp3: No such file or directory", FailureCategory::MissingFile),
            ("out.mp4: Permission denied", FailureCategory::PermissionDenied),
            ("Invalid data found when processing input", FailureCategory::InvalidData),
            ("Unknown encoder 'libx265'", FailureCategory::MissingEncoder),
            ("av_interleaved_write_frame(): No space left on device", FailureCategory::DiskFull),
            ("Error: DISK FULL", FailureCategory::DiskFull),
        ];
        for (text, expected) in cases {
            assert_eq!(classify_stderr(text).0, expected, "{}", text);
        }
    }

    #[test]
    fn test_unknown_keeps_last_three_lines() {
        let (category, detail) = classify_stderr("one\ntwo\n\nthree\nfour\n");
        assert_eq!(category, FailureCategory::Unknown);
        assert_eq!(detail, "two three four");
        assert_eq!(classify_stderr("").1, "unknown FFmpeg error");
    }

    #[test]
    fn test_settings_errors_name_capability() {
        let err = ExportError::InvalidSettings(vec![
            SettingsError::MissingCodec("libx265".into()),
            SettingsError::Crf(60),
        ]);
        let text = err.to_string();
        assert!(text.contains("libx265"));
        assert!(text.contains("CRF 60"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.remediation().contains("Install FFmpeg"));
    }

    #[test]
    fn test_process_error_remediation() {
        let err = ExportError::Process {
            category: FailureCategory::PermissionDenied,
            detail: "permission denied".into(),
            exit_code: Some(1),
        };
        assert_eq!(err.category(), ErrorCategory::Process);
        assert_eq!(err.failure(), Some(FailureCategory::PermissionDenied));
        assert!(err.remediation().contains("file access"));
        assert!(err.to_string().contains("exit code 1"));
    }
}
