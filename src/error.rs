//! Error types for email unpacking

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while unpacking, extracting or classifying
#[derive(Error, Debug)]
pub enum UnpackError {
    /// Filesystem failure with the path it happened on
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Attachment text extraction failed
    #[error("Could not extract text from '{path}': {reason}")]
    Extractor { path: PathBuf, reason: String },

    /// The classifier could not label a text
    #[error("Classification failed: {0}")]
    Classifier(String),

    /// JSON (de)serialization of results or configuration failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UnpackError {
    /// Build an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for unpacking operations
pub type Result<T> = std::result::Result<T, UnpackError>;
