//! Per-artifact load outcomes.
//!
//! Nothing at startup is allowed to abort the process because one file is
//! absent or corrupt. Each loader returns its value wrapped in a status
//! that the readiness report later exposes.

use crate::error::{DataLoadError, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ArtifactStatus {
    Loaded,
    Missing,
    Failed(String),
}

impl ArtifactStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ArtifactStatus::Loaded)
    }
}

/// Name + status of every artifact the process tried to load, in load order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactReport {
    entries: Vec<(String, ArtifactStatus)>,
}

impl ArtifactReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of loading `name`, keeping the value on success
    pub fn record<T>(&mut self, name: &str, outcome: Result<T>) -> Option<T> {
        let (status, value) = match outcome {
            Ok(value) => {
                info!(artifact = name, "Loaded artifact");
                (ArtifactStatus::Loaded, Some(value))
            }
            Err(DataLoadError::FileNotFound { path }) => {
                warn!(artifact = name, path = %path.display(), "Artifact missing");
                (ArtifactStatus::Missing, None)
            }
            Err(e) => {
                warn!(artifact = name, error = %e, "Artifact failed to load");
                (ArtifactStatus::Failed(e.to_string()), None)
            }
        };
        self.set(name, status);
        value
    }

    /// Overwrite or append the status for `name`
    pub fn set(&mut self, name: &str, status: ArtifactStatus) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = status,
            None => self.entries.push((name.to_string(), status)),
        }
    }

    pub fn status(&self, name: &str) -> Option<&ArtifactStatus> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.status(name).is_some_and(ArtifactStatus::is_loaded)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArtifactStatus)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn all_loaded(&self) -> bool {
        self.entries.iter().all(|(_, s)| s.is_loaded())
    }

    /// Merge another report's entries into this one
    pub fn extend(&mut self, other: ArtifactReport) {
        for (name, status) in other.entries {
            self.set(&name, status);
        }
    }
}

/// Read a whole artifact file, mapping absence to [`DataLoadError::FileNotFound`]
pub fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(DataLoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read(path)?)
}

/// Read and decode a JSON artifact
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_artifact(path)?;
    serde_json::from_slice(&bytes).map_err(|source| DataLoadError::Json {
        file: path.display().to_string(),
        source,
    })
}
