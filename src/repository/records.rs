//! Upstream document record source.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::models::DocumentRecord;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read records from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse records in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Read the JSON array of document records produced by the table scraper.
pub fn load_records(path: &Path) -> Result<Vec<DocumentRecord>, SourceError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<DocumentRecord> =
        serde_json::from_str(&contents).map_err(|source| SourceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
