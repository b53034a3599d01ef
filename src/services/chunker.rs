//! Batch windowing over the candidate list.
//!
//! Each invocation processes at most `batch_size` candidates. Where the
//! window starts is resolved from, in order: an explicit start index, the
//! stored checkpoint (only when its filter signature and candidate total
//! match this run exactly and its cycle is not complete), or zero.

use std::fmt;

use chrono::Local;
use tracing::{info, warn};

use crate::models::{BatchCheckpoint, FilterSignature};

/// Why a window starts where it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStart {
    /// `--start-index` was given.
    Override,
    /// Continuing a stored checkpoint.
    Resumed,
    /// No checkpoint, or `--ignore-state`.
    Fresh,
    /// The stored cycle was complete; a new one starts.
    NewCycle,
    /// The stored checkpoint was for another filter.
    FilterChanged,
    /// The candidate total changed since the checkpoint was written.
    TotalChanged,
}

impl fmt::Display for WindowStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Override => "manual start index",
            Self::Resumed => "resumed from checkpoint",
            Self::Fresh => "fresh start",
            Self::NewCycle => "previous cycle complete, starting new cycle",
            Self::FilterChanged => "filter changed, checkpoint discarded",
            Self::TotalChanged => "candidate count changed, checkpoint discarded",
        };
        f.write_str(s)
    }
}

/// The slice `[start, end)` of the candidate list processed by this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub batch_size: usize,
    pub source: WindowStart,
}

impl BatchWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Decide which window of `total` candidates this run processes.
pub fn resolve_window(
    stored: Option<&BatchCheckpoint>,
    signature: &FilterSignature,
    total: usize,
    batch_size: usize,
    start_override: Option<usize>,
    ignore_state: bool,
) -> BatchWindow {
    let (start, source) = if let Some(index) = start_override {
        (index, WindowStart::Override)
    } else if ignore_state {
        (0, WindowStart::Fresh)
    } else {
        match stored {
            None => (0, WindowStart::Fresh),
            Some(cp) if cp.filter != *signature => {
                warn!(
                    "Checkpoint was recorded for {:?}, current filter is {:?}; restarting",
                    cp.filter, signature
                );
                (0, WindowStart::FilterChanged)
            }
            Some(cp) if cp.total_docs_in_current_filter != total => {
                warn!(
                    "Checkpoint total {} does not match {} candidates; restarting",
                    cp.total_docs_in_current_filter, total
                );
                (0, WindowStart::TotalChanged)
            }
            Some(cp) if cp.completed => (0, WindowStart::NewCycle),
            Some(cp) => (cp.next_index(), WindowStart::Resumed),
        }
    };

    let start = start.min(total);
    let end = start.saturating_add(batch_size).min(total);
    let window = BatchWindow {
        start,
        end,
        total,
        batch_size,
        source,
    };
    info!(
        "Batch window [{}, {}) of {} ({})",
        window.start, window.end, window.total, window.source
    );
    window
}

/// Checkpoint recording that `consumed` candidates from the start of the
/// window were examined.
///
/// A full window passes `window.len()`; an interrupted run passes only the
/// prefix it got through.
pub fn finish_window(
    window: &BatchWindow,
    consumed: usize,
    signature: FilterSignature,
) -> BatchCheckpoint {
    let consumed = consumed.min(window.len());
    let next = window.start + consumed;

    BatchCheckpoint {
        filter: signature,
        last_processed_index: next as i64 - 1,
        batch_size: window.batch_size,
        total_docs_in_current_filter: window.total,
        completed: next >= window.total,
        last_run: Local::now(),
        processed_in_last_batch: consumed,
    }
}
