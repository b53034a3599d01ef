//! Data models for gztarchiver.

mod checkpoint;
mod document;
mod filter;
mod ledger;

pub use checkpoint::{BatchCheckpoint, FilterSignature};
pub use document::{
    normalize_doc_id, Availability, DocumentRecord, DownloadTask, Language, LanguageFilter,
    LanguageLink, TaskKey, NO_URL,
};
pub use filter::ArchiveFilter;
pub use ledger::{FailedEntry, FetchStatus, LedgerEntry};
