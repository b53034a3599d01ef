//! Downstream boundary: the archive results handed to later stages.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::Availability;
use crate::storage::temp_path;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write results to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One archived artifact or unavailable document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveResult {
    pub doc_id: String,
    pub file_path: String,
    pub availability: Availability,
    pub download_url: String,
    pub date: String,
    pub description: String,
}

/// Receives the result list of a run.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn publish(&self, results: &[ArchiveResult]) -> Result<(), SinkError>;
}

/// Writes results as a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ArchiveSink for JsonFileSink {
    async fn publish(&self, results: &[ArchiveResult]) -> Result<(), SinkError> {
        let json = serde_json::to_vec_pretty(results)?;
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        info!("Wrote {} results to {}", results.len(), self.path.display());
        Ok(())
    }
}
