//! Error types for the writer layer.

use std::path::PathBuf;

/// Errors that can occur while creating or using a writer.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// A file operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// BSON serialization failed.
    #[error("BSON serialization error: {0}")]
    Bson(#[from] bson::ser::Error),

    /// The configured log target cannot be used.
    #[error("invalid writer target: {reason}")]
    InvalidTarget {
        /// Explanation of what is wrong with the target.
        reason: String,
    },
}

impl WriterError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
