//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

use super::format::OutputFormat;

/// Errors raised by a frame-processing engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Nothing is stored under the logical name.
    #[error("No entry named {name} in engine storage")]
    NotFound { name: String },

    /// The logical name is not a flat file name.
    #[error("Invalid logical name: {name}")]
    InvalidName { name: String },

    /// The engine process could not be started.
    #[error("Failed to spawn engine: {reason}")]
    Spawn { reason: String },

    /// I/O error while talking to the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during a conversion session.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The engine could not be acquired; no conversion was attempted.
    #[error("Failed to acquire processing engine: {reason}")]
    Acquisition { reason: String },

    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Every stream hypothesis failed.
    #[error("Conversion to {format} failed after {attempts} attempts")]
    Exhausted {
        format: OutputFormat,
        attempts: usize,
    },

    /// The input could not be written into engine storage.
    #[error("Failed to stage {name}: {source}")]
    Staging {
        name: String,
        #[source]
        source: EngineError,
    },

    /// The engine reported success but the output could not be read back.
    #[error("Failed to read {name}: {source}")]
    Retrieval {
        name: String,
        #[source]
        source: EngineError,
    },

    /// The engine could not be driven at all.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Input rejected before staging.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Output format name not in the catalog.
    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    /// The session already ran its one conversion.
    #[error("Conversion session already used")]
    SessionSpent,
}

impl ConverterError {
    /// Creates a new acquisition error.
    pub fn acquisition(reason: impl Into<String>) -> Self {
        Self::Acquisition {
            reason: reason.into(),
        }
    }

    /// Creates a new invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Whether the engine could not be obtained for the session.
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(self, Self::Acquisition { .. } | Self::FfmpegNotFound { .. })
    }

    /// Whether a new session might succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Acquisition { .. } | Self::Engine(EngineError::Io(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message() {
        let err = ConverterError::Exhausted {
            format: OutputFormat::Webp,
            attempts: 3,
        };
        assert_eq!(err.to_string(), "Conversion to webp failed after 3 attempts");
        assert!(!err.is_retryable());
        assert!(!err.is_acquisition_failure());
    }

    #[test]
    fn test_acquisition_classification() {
        assert!(ConverterError::acquisition("boom").is_acquisition_failure());
        assert!(ConverterError::acquisition("boom").is_retryable());
        assert!(ConverterError::FfmpegNotFound {
            path: PathBuf::from("/nope/ffmpeg"),
        }
        .is_acquisition_failure());
    }

    #[test]
    fn test_staging_keeps_source() {
        let err = ConverterError::Staging {
            name: "input.heics".to_string(),
            source: EngineError::InvalidName {
                name: "../x".to_string(),
            },
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("input.heics"));
    }
}
