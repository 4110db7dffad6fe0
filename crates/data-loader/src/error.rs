//! Error types for the data-loader crate.
//!
//! Every loader in this crate reports failures through [`DataLoadError`].
//! Callers at startup record these per artifact instead of aborting, so a
//! single bad file only disables the capability it backs.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading artifacts and raw data files
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// I/O error occurred while reading a file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A JSON document or NDJSON line couldn't be decoded
    #[error("JSON error in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// An artifact was readable but structurally inconsistent
    #[error("Invalid artifact {artifact}: {reason}")]
    InvalidArtifact { artifact: String, reason: String },
}

impl DataLoadError {
    pub fn invalid_artifact(artifact: &str, reason: impl Into<String>) -> Self {
        DataLoadError::InvalidArtifact {
            artifact: artifact.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
