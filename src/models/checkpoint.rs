//! Cross-run batch checkpoint.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// The filter a checkpoint was recorded under.
///
/// A stored checkpoint is only reused when the signature of the current run
/// is identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSignature {
    pub year: String,
    pub month: Option<String>,
    pub day: Option<String>,
    pub lang: String,
}

/// Progress of one (year, filter) run, overwritten after every batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    #[serde(flatten)]
    pub filter: FilterSignature,
    /// Index of the last consumed candidate, -1 when nothing was consumed.
    pub last_processed_index: i64,
    pub batch_size: usize,
    pub total_docs_in_current_filter: usize,
    pub completed: bool,
    pub last_run: DateTime<Local>,
    pub processed_in_last_batch: usize,
}

impl BatchCheckpoint {
    /// Index the next batch starts at when this checkpoint is resumed.
    pub fn next_index(&self) -> usize {
        (self.last_processed_index + 1).max(0) as usize
    }

    /// Candidates left after this checkpoint.
    pub fn remaining(&self) -> usize {
        self.total_docs_in_current_filter
            .saturating_sub(self.next_index())
    }
}
