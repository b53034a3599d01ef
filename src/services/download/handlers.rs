//! Save and failure handling for fetched artifacts.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::types::TaskOutcome;
use crate::models::DownloadTask;
use crate::repository::{LedgerError, ProgressLedger};
use crate::storage;

/// Reason recorded when a body fails validation.
pub const INVALID_DOWNLOAD: &str = "invalid or corrupted download";

/// Commits fetched bodies: temp write, validation, rename, SUCCESS row.
#[derive(Debug, Clone)]
pub struct SaveHandler {
    min_file_size: u64,
}

impl SaveHandler {
    pub fn new(min_file_size: u64) -> Self {
        Self { min_file_size }
    }

    /// Commit `content` for `task`.
    ///
    /// Returns `Ok(Err(reason))` when the body could not be committed; the
    /// caller hands that reason to the [`FailureHandler`]. Only ledger I/O
    /// surfaces as an error.
    pub async fn handle(
        &self,
        task: &DownloadTask,
        content: &[u8],
        ledger: &Arc<Mutex<ProgressLedger>>,
    ) -> Result<Result<u64, String>, LedgerError> {
        let tmp = match storage::write_temp(&task.file_path, content) {
            Ok(tmp) => tmp,
            Err(e) => {
                discard_quietly(&task.file_path);
                return Ok(Err(format!("write failed: {}", e)));
            }
        };

        if let Err(e) = storage::validate_content(&task.file_path, content, self.min_file_size) {
            debug!("Rejecting body for {}: {}", task.key(), e);
            storage::discard(&tmp);
            return Ok(Err(INVALID_DOWNLOAD.to_string()));
        }

        if let Err(e) = storage::commit(&tmp, &task.file_path) {
            storage::discard(&tmp);
            return Ok(Err(format!("rename failed: {}", e)));
        }

        let size = content.len() as u64;
        ledger.lock().await.record_success(task, size)?;
        Ok(Ok(size))
    }
}

fn discard_quietly(final_path: &std::path::Path) {
    storage::discard(&storage::temp_path(final_path));
}

/// Records failed fetches. One failed task never aborts the batch.
#[derive(Debug, Clone, Default)]
pub struct FailureHandler;

impl FailureHandler {
    /// Append a FAILED row and return the tagged outcome.
    pub async fn handle(
        &self,
        task: &DownloadTask,
        reason: &str,
        ledger: &Arc<Mutex<ProgressLedger>>,
    ) -> Result<TaskOutcome, LedgerError> {
        let attempts = ledger.lock().await.record_failure(task, reason)?;
        warn!(
            "Failed to fetch {} from {} (attempt {}): {}",
            task.key(),
            task.url,
            attempts,
            reason
        );
        Ok(TaskOutcome::Failed {
            reason: reason.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;
    use tempfile::tempdir;

    fn task(dir: &std::path::Path) -> DownloadTask {
        DownloadTask {
            doc_id: "d".to_string(),
            date: "2024-01-01".to_string(),
            description: String::new(),
            url: "https://x/d_E.pdf".to_string(),
            language: Language::English,
            file_path: dir.join("2024/01/01/d/d_english.pdf"),
        }
    }

    #[tokio::test]
    async fn test_save_commits_valid_body() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Mutex::new(ProgressLedger::open(dir.path(), 16, 3).unwrap()));
        let t = task(dir.path());

        let mut body = b"%PDF-1.5\n".to_vec();
        body.resize(64, b'a');
        let result = SaveHandler::new(16).handle(&t, &body, &ledger).await.unwrap();

        assert_eq!(result, Ok(64));
        assert!(t.file_path.exists());
        assert!(!storage::temp_path(&t.file_path).exists());
        assert!(ledger.lock().await.is_succeeded(&t.key()));
    }

    #[tokio::test]
    async fn test_save_rejects_corrupt_body() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Mutex::new(ProgressLedger::open(dir.path(), 16, 3).unwrap()));
        let t = task(dir.path());

        let body = vec![b'<'; 64];
        let result = SaveHandler::new(16).handle(&t, &body, &ledger).await.unwrap();

        assert_eq!(result, Err(INVALID_DOWNLOAD.to_string()));
        assert!(!t.file_path.exists());
        assert!(!storage::temp_path(&t.file_path).exists());
        assert!(!ledger.lock().await.is_succeeded(&t.key()));
    }

    #[tokio::test]
    async fn test_failure_handler_counts_attempts() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Mutex::new(ProgressLedger::open(dir.path(), 16, 3).unwrap()));
        let t = task(dir.path());

        let first = FailureHandler.handle(&t, "HTTP 404", &ledger).await.unwrap();
        let second = FailureHandler.handle(&t, "HTTP 404", &ledger).await.unwrap();
        assert_eq!(
            first,
            TaskOutcome::Failed {
                reason: "HTTP 404".to_string(),
                attempts: 1
            }
        );
        assert!(matches!(second, TaskOutcome::Failed { attempts: 2, .. }));
    }
}
