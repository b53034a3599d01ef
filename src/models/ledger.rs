//! Rows of the per-year progress ledgers.
//!
//! Field order and names are the CSV column layout of `archived_logs.csv`
//! and `failed_logs.csv`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{DownloadTask, Language, TaskKey};

/// Outcome recorded for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FetchStatus {
    Success,
    Failed,
    /// Document had nothing to fetch; only the unavailable marker exists.
    Empty,
}

/// A row of `archived_logs.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "gazette_id")]
    pub doc_id: String,
    pub date: String,
    pub language: Language,
    pub description: String,
    pub file_path: String,
    #[serde(rename = "file_size_bytes")]
    pub size_bytes: u64,
    pub status: FetchStatus,
}

impl LedgerEntry {
    /// Entry for a committed artifact.
    pub fn success(task: &DownloadTask, size_bytes: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            doc_id: task.doc_id.clone(),
            date: task.date.clone(),
            language: task.language,
            description: task.description.clone(),
            file_path: task.file_path.display().to_string(),
            size_bytes,
            status: FetchStatus::Success,
        }
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.doc_id.clone(), self.language)
    }
}

/// A row of `failed_logs.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "gazette_id")]
    pub doc_id: String,
    pub date: String,
    pub language: Language,
    pub description: String,
    pub url: String,
    pub error_reason: String,
    /// Number of failed attempts for this key including this one.
    pub retry_count: u32,
}

impl FailedEntry {
    pub fn new(task: &DownloadTask, reason: &str, retry_count: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            doc_id: task.doc_id.clone(),
            date: task.date.clone(),
            language: task.language,
            description: task.description.clone(),
            url: task.url.clone(),
            error_reason: reason.to_string(),
            retry_count,
        }
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.doc_id.clone(), self.language)
    }
}
