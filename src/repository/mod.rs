//! Persistence layer: the upstream record source, the per-year progress
//! ledgers and the batch checkpoint.

pub mod checkpoint;
pub mod ledger;
pub mod records;

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use ledger::{Admission, LedgerError, LedgerSummary, ProgressLedger};
pub use records::{load_records, SourceError};
