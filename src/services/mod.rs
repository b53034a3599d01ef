//! Service layer for the archive pipeline.
//!
//! This module contains domain logic separated from UI concerns.

pub mod archive;
pub mod chunker;
pub mod date_detection;
pub mod download;
pub mod planner;
pub mod shutdown;
pub mod sink;

pub use archive::{ArchiveContext, ArchiveError, ArchiveOptions, RunSummary};
pub use chunker::{finish_window, resolve_window, BatchWindow, WindowStart};
pub use date_detection::{parse_document_date, resolve_document_date, ResolvedDate};
pub use download::{
    DownloadConfig, DownloadEvent, DownloadResult, FetchScheduler, SkipReason, TaskOutcome,
    INVALID_DOWNLOAD,
};
pub use planner::{PathPlanner, PlanError, PlannedBatch, UnavailableDoc};
pub use shutdown::{CleanupGuard, ShutdownCoordinator, FORCED_EXIT_CODE};
pub use sink::{ArchiveResult, ArchiveSink, JsonFileSink, SinkError};
