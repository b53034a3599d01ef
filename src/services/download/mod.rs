//! Fetch scheduler.
//!
//! Walks a batch window in list order, asks the ledger to admit each
//! candidate and dispatches admitted fetches under a semaphore. Completions
//! may interleave; each one is committed and logged independently.

mod handlers;
mod types;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::http_client::{FetchError, HttpClient};
use crate::models::DownloadTask;
use crate::repository::{Admission, LedgerError, ProgressLedger};

use super::shutdown::ShutdownCoordinator;

pub use handlers::{FailureHandler, SaveHandler, INVALID_DOWNLOAD};
pub use types::{DownloadConfig, DownloadEvent, DownloadResult, SkipReason, TaskOutcome};

/// Dispatches admitted candidates with bounded concurrency.
pub struct FetchScheduler {
    client: HttpClient,
    config: DownloadConfig,
    save: SaveHandler,
    failure: FailureHandler,
}

impl FetchScheduler {
    pub fn new(config: DownloadConfig) -> Result<Self, FetchError> {
        let client = HttpClient::new(
            &config.user_agent,
            config.request_timeout,
            config.request_delay,
        )?;
        Ok(Self {
            save: SaveHandler::new(config.min_file_size),
            failure: FailureHandler,
            client,
            config,
        })
    }

    /// Process `tasks` (one batch window) until done or shut down.
    ///
    /// Only ledger I/O errors are returned; every per-task failure is
    /// recorded and counted.
    pub async fn run(
        &self,
        tasks: &[DownloadTask],
        ledger: Arc<Mutex<ProgressLedger>>,
        shutdown: &ShutdownCoordinator,
        events: Option<mpsc::Sender<DownloadEvent>>,
    ) -> Result<DownloadResult, LedgerError> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut join_set: JoinSet<Result<TaskOutcome, LedgerError>> = JoinSet::new();
        let mut result = DownloadResult::default();
        let mut fatal: Option<LedgerError> = None;
        let (mut admitted, mut retried) = (0usize, 0usize);

        send(
            &events,
            DownloadEvent::BatchStarted {
                candidates: tasks.len(),
            },
        )
        .await;

        for task in tasks {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };

            while let Some(joined) = join_set.try_join_next() {
                tally(joined, &mut result, &mut fatal);
            }
            if fatal.is_some() {
                break;
            }
            if shutdown.is_requested() {
                result.interrupted = true;
                break;
            }

            let admission = ledger.lock().await.admit(task)?;
            result.consumed += 1;

            let skip = match admission {
                Admission::Fresh => None,
                Admission::Retry(n) => {
                    debug!("Retrying {} after {} failures", task.key(), n);
                    retried += 1;
                    None
                }
                Admission::SkipArchived => {
                    result.skipped += 1;
                    Some(SkipReason::Archived)
                }
                Admission::Adopted => {
                    result.adopted += 1;
                    Some(SkipReason::Adopted)
                }
                Admission::SkipExhausted(n) => {
                    debug!("Skipping {} after {} failures", task.key(), n);
                    result.exhausted += 1;
                    Some(SkipReason::RetriesExhausted)
                }
            };

            if let Some(reason) = skip {
                send(
                    &events,
                    DownloadEvent::Skipped {
                        key: task.key(),
                        reason,
                    },
                )
                .await;
                continue;
            }

            admitted += 1;
            let task = task.clone();
            let client = self.client.clone();
            let save = self.save.clone();
            let failure = self.failure.clone();
            let ledger = ledger.clone();
            let events = events.clone();

            join_set.spawn(async move {
                let _permit = permit;
                fetch_one(&task, &client, &save, &failure, &ledger, &events).await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            tally(joined, &mut result, &mut fatal);
        }

        info!(
            "Admitted {} ({} retries), skipped {} archived, {} adopted, {} over retry cap",
            admitted, retried, result.skipped, result.adopted, result.exhausted
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }
}

async fn fetch_one(
    task: &DownloadTask,
    client: &HttpClient,
    save: &SaveHandler,
    failure: &FailureHandler,
    ledger: &Arc<Mutex<ProgressLedger>>,
    events: &Option<mpsc::Sender<DownloadEvent>>,
) -> Result<TaskOutcome, LedgerError> {
    send(
        events,
        DownloadEvent::Started {
            key: task.key(),
            url: task.url.clone(),
        },
    )
    .await;

    let reason = match client.fetch_bytes(&task.url).await {
        Ok(content) => match save.handle(task, &content, ledger).await? {
            Ok(bytes) => {
                debug!("Saved {} ({} bytes)", task.file_path.display(), bytes);
                send(
                    events,
                    DownloadEvent::Completed {
                        key: task.key(),
                        bytes,
                    },
                )
                .await;
                return Ok(TaskOutcome::Downloaded { bytes });
            }
            Err(reason) => reason,
        },
        Err(e) => e.to_string(),
    };

    let outcome = failure.handle(task, &reason, ledger).await?;
    if let TaskOutcome::Failed { attempts, .. } = &outcome {
        send(
            events,
            DownloadEvent::Failed {
                key: task.key(),
                url: task.url.clone(),
                error: reason,
                attempts: *attempts,
            },
        )
        .await;
    }
    Ok(outcome)
}

fn tally(
    joined: Result<Result<TaskOutcome, LedgerError>, tokio::task::JoinError>,
    result: &mut DownloadResult,
    fatal: &mut Option<LedgerError>,
) {
    match joined {
        Ok(Ok(TaskOutcome::Downloaded { .. })) => result.downloaded += 1,
        Ok(Ok(TaskOutcome::Failed { .. })) => result.failed += 1,
        Ok(Err(e)) => {
            error!("Ledger write failed: {}", e);
            if fatal.is_none() {
                *fatal = Some(e);
            }
        }
        Err(e) => {
            error!("Download task panicked: {}", e);
            result.failed += 1;
        }
    }
}

async fn send(events: &Option<mpsc::Sender<DownloadEvent>>, event: DownloadEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
