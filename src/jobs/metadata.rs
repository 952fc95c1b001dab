//! Job metadata loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata describing a job module, loaded once at startup from
/// `<job path>/metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    pub name: String,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    /// Missing metadata is a startup abort, never worked around.
    #[error("Missing metadata file at: {0}")]
    Missing(PathBuf),

    #[error("Failed to read metadata at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid metadata at {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Load and validate a job's metadata file.
pub fn load_metadata(job_path: &Path) -> Result<JobMetadata, MetadataError> {
    let metadata_path = job_path.join("metadata.json");
    if !metadata_path.exists() {
        return Err(MetadataError::Missing(metadata_path));
    }

    let content = std::fs::read_to_string(&metadata_path).map_err(|source| MetadataError::Io {
        path: metadata_path.clone(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| MetadataError::Invalid {
        path: metadata_path,
        source,
    })
}
