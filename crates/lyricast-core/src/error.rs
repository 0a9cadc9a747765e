/// Core error types for the Lyricast engine.
use std::path::PathBuf;

/// A specialized Result type for Lyricast operations.
pub type LyricastResult<T> = Result<T, LyricastError>;

/// Top-level error type shared by the Lyricast crates.
#[derive(Debug, thiserror::Error)]
pub enum LyricastError {
    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("asset error: {message} ({path:?})")]
    Asset { message: String, path: PathBuf },

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported feature: {0}")]
    Unsupported(String),
}

impl LyricastError {
    /// Create an asset error.
    pub fn asset(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        LyricastError::Asset {
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        LyricastError::Render(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        LyricastError::InvalidArgument(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_error_display() {
        let err = LyricastError::asset("file not found", "/media/cover.jpg");
        assert!(err.to_string().contains("file not found"));
        assert!(err.to_string().contains("cover.jpg"));
    }

    #[test]
    fn test_render_error_display() {
        let err = LyricastError::render("mask is empty");
        assert_eq!(err.to_string(), "render error: mask is empty");
    }

    #[test]
    fn test_io_error_converts() {
        fn open() -> LyricastResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(LyricastError::Io(_))));
    }
}
