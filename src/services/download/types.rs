//! Download service types and events.

use std::time::Duration;

use crate::models::TaskKey;

/// Events emitted while a batch is being fetched.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// A batch window of this many candidates is about to be walked.
    BatchStarted { candidates: usize },
    /// Fetch dispatched for a candidate.
    Started { key: TaskKey, url: String },
    /// Artifact committed to its final path.
    Completed { key: TaskKey, bytes: u64 },
    /// Candidate not dispatched.
    Skipped { key: TaskKey, reason: SkipReason },
    /// Fetch or validation failed; `attempts` includes this one.
    Failed {
        key: TaskKey,
        url: String,
        error: String,
        attempts: u32,
    },
}

/// Why a candidate was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Archived,
    Adopted,
    RetriesExhausted,
}

/// Tagged outcome of one dispatched fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Downloaded { bytes: u64 },
    Failed { reason: String, attempts: u32 },
}

/// Result of fetching one batch window.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub downloaded: usize,
    /// Already archived according to the ledger.
    pub skipped: usize,
    /// Valid files found on disk and recorded without fetching.
    pub adopted: usize,
    /// Over the retry cap and not dispatched.
    pub exhausted: usize,
    pub failed: usize,
    /// Candidates examined, counted from the start of the window.
    pub consumed: usize,
    /// Shutdown stopped admission before the window was exhausted.
    pub interrupted: bool,
}

impl DownloadResult {
    pub fn dispatched(&self) -> usize {
        self.downloaded + self.failed
    }
}

/// Configuration for the fetch scheduler.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub request_delay: Duration,
    pub min_file_size: u64,
    pub user_agent: String,
}
