//! Persistence of the cross-run batch checkpoint.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::models::BatchCheckpoint;
use crate::storage::{temp_path, CHECKPOINT_FILE};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reads and overwrites `progress_state.json` in a year directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(year_dir: &Path) -> Self {
        Self {
            path: year_dir.join(CHECKPOINT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored checkpoint.
    ///
    /// A missing file means no checkpoint. An unreadable or corrupt one is
    /// discarded with a warning, which restarts the cycle.
    pub fn load(&self) -> Option<BatchCheckpoint> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Ignoring unreadable checkpoint {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!("Ignoring corrupt checkpoint {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Overwrite the checkpoint via temp file and rename.
    pub fn save(&self, checkpoint: &BatchCheckpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(checkpoint)?;
        let write_err = |source| CheckpointError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = temp_path(&self.path);
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}
