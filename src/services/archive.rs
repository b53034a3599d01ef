//! One archive run: plan, window, admit, fetch, record, checkpoint.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use super::chunker::{finish_window, resolve_window, BatchWindow};
use super::download::{DownloadConfig, DownloadEvent, DownloadResult, FetchScheduler};
use super::planner::{PathPlanner, PlanError, PlannedBatch};
use super::shutdown::ShutdownCoordinator;
use super::sink::{ArchiveResult, ArchiveSink, JsonFileSink, SinkError};
use crate::config::Settings;
use crate::http_client::FetchError;
use crate::models::{ArchiveFilter, Availability, BatchCheckpoint, DocumentRecord};
use crate::repository::{
    load_records, CheckpointError, CheckpointStore, LedgerError, ProgressLedger, SourceError,
};
use crate::storage::{CleanupReport, RESULTS_FILE};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Per-run options layered over [`Settings`].
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub filter: ArchiveFilter,
    pub batch_size: usize,
    pub start_index: Option<usize>,
    pub ignore_state: bool,
}

impl ArchiveOptions {
    pub fn new(filter: ArchiveFilter, batch_size: usize) -> Self {
        Self {
            filter,
            batch_size,
            start_index: None,
            ignore_state: false,
        }
    }
}

/// What one run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: BatchWindow,
    pub download: DownloadResult,
    pub checkpoint: BatchCheckpoint,
    pub unavailable: usize,
    pub filtered_out: usize,
    pub date_fallbacks: usize,
    pub duplicates: usize,
    pub cleanup: CleanupReport,
    pub archived_log: PathBuf,
    pub failed_log: PathBuf,
}

impl RunSummary {
    /// Share of dispatched fetches that were committed, in percent.
    pub fn success_rate(&self) -> f64 {
        let dispatched = self.download.dispatched();
        if dispatched == 0 {
            return 100.0;
        }
        self.download.downloaded as f64 * 100.0 / dispatched as f64
    }

    /// Index the next run will start at.
    pub fn next_index(&self) -> usize {
        self.checkpoint.next_index()
    }

    pub fn remaining(&self) -> usize {
        self.checkpoint.remaining()
    }
}

/// Everything one run of one year needs, built once and passed explicitly.
pub struct ArchiveContext {
    year_dir: PathBuf,
    planner: PathPlanner,
    ledger: Arc<Mutex<ProgressLedger>>,
    checkpoints: CheckpointStore,
    scheduler: FetchScheduler,
    shutdown: ShutdownCoordinator,
    sink: Box<dyn ArchiveSink>,
    events: Option<mpsc::Sender<DownloadEvent>>,
}

impl ArchiveContext {
    /// Open the ledger and checkpoint for `year` under the configured archive.
    pub fn open(settings: &Settings, year: i32) -> Result<Self, ArchiveError> {
        let year_dir = settings.year_dir(year);
        let ledger = ProgressLedger::open(&year_dir, settings.min_file_size, settings.max_retries)?;
        let scheduler = FetchScheduler::new(DownloadConfig {
            concurrency: settings.concurrency,
            request_timeout: settings.request_timeout(),
            request_delay: settings.request_delay(),
            min_file_size: settings.min_file_size,
            user_agent: settings.user_agent.clone(),
        })?;

        Ok(Self {
            planner: PathPlanner::new(&settings.archive_dir),
            ledger: Arc::new(Mutex::new(ledger)),
            checkpoints: CheckpointStore::new(&year_dir),
            shutdown: ShutdownCoordinator::new(&year_dir, settings.min_file_size),
            sink: Box::new(JsonFileSink::new(year_dir.join(RESULTS_FILE))),
            events: None,
            scheduler,
            year_dir,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn ArchiveSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<DownloadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn year_dir(&self) -> &Path {
        &self.year_dir
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Read the record list from `input` and run one batch.
    pub async fn run_file(
        &mut self,
        input: &Path,
        options: &ArchiveOptions,
    ) -> Result<RunSummary, ArchiveError> {
        let records = load_records(input)?;
        self.run(&records, options).await
    }

    /// Run one batch over `records`.
    pub async fn run(
        &mut self,
        records: &[DocumentRecord],
        options: &ArchiveOptions,
    ) -> Result<RunSummary, ArchiveError> {
        let guard = self.shutdown.guard();
        let signature = options.filter.signature();

        let batch = self.planner.plan(records, &options.filter)?;
        self.record_unavailable(&batch).await?;

        let stored = self.checkpoints.load();
        let window = resolve_window(
            stored.as_ref(),
            &signature,
            batch.tasks.len(),
            options.batch_size,
            options.start_index,
            options.ignore_state,
        );

        let download = self
            .scheduler
            .run(
                &batch.tasks[window.range()],
                self.ledger.clone(),
                &self.shutdown,
                self.events.take(),
            )
            .await?;

        let checkpoint = finish_window(&window, download.consumed, signature);
        self.checkpoints.save(&checkpoint)?;
        if download.interrupted {
            info!(
                "Interrupted after {} of {} candidates; checkpoint at index {}",
                download.consumed,
                window.len(),
                checkpoint.last_processed_index
            );
        }

        let results = self.collect_results(&batch).await;
        self.sink.publish(&results).await?;

        let cleanup = guard.finish();
        let ledger = self.ledger.lock().await;

        Ok(RunSummary {
            window,
            download,
            checkpoint,
            unavailable: batch.unavailable.len(),
            filtered_out: batch.filtered_out,
            date_fallbacks: batch.date_fallbacks,
            duplicates: batch.duplicates,
            cleanup,
            archived_log: ledger.archived_log().to_path_buf(),
            failed_log: ledger.failed_log().to_path_buf(),
        })
    }

    async fn record_unavailable(&self, batch: &PlannedBatch) -> Result<(), LedgerError> {
        let mut ledger = self.ledger.lock().await;
        for doc in &batch.unavailable {
            ledger.record_empty(
                &doc.doc_id,
                &doc.record.date,
                &doc.record.description,
                &doc.marker_path,
            )?;
        }
        Ok(())
    }

    /// Result list for the whole planned year, from current ledger state.
    ///
    /// A document whose every artifact is over the retry cap is reported as
    /// unavailable.
    async fn collect_results(&self, batch: &PlannedBatch) -> Vec<ArchiveResult> {
        let ledger = self.ledger.lock().await;
        let mut results = Vec::new();

        let mut exhausted_by_doc: HashMap<&str, (usize, usize)> = HashMap::new();
        for task in &batch.tasks {
            let key = task.key();
            let entry = exhausted_by_doc.entry(task.doc_id.as_str()).or_default();
            entry.0 += 1;

            if ledger.is_succeeded(&key) {
                results.push(ArchiveResult {
                    doc_id: task.doc_id.clone(),
                    file_path: task.file_path.display().to_string(),
                    availability: Availability::Available,
                    download_url: task.url.clone(),
                    date: task.date.clone(),
                    description: task.description.clone(),
                });
            } else if ledger.is_exhausted(&key) {
                entry.1 += 1;
            }
        }

        for task in &batch.tasks {
            let Some((total, exhausted)) = exhausted_by_doc.remove(task.doc_id.as_str()) else {
                continue;
            };
            if total == exhausted {
                let doc_dir = task
                    .file_path
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                results.push(ArchiveResult {
                    doc_id: task.doc_id.clone(),
                    file_path: doc_dir,
                    availability: Availability::Unavailable,
                    download_url: task.url.clone(),
                    date: task.date.clone(),
                    description: task.description.clone(),
                });
            }
        }

        for doc in &batch.unavailable {
            results.push(ArchiveResult {
                doc_id: doc.doc_id.clone(),
                file_path: doc.marker_path.display().to_string(),
                availability: Availability::Unavailable,
                download_url: doc.record.download_url.clone(),
                date: doc.record.date.clone(),
                description: doc.record.description.clone(),
            });
        }

        results
    }
}
