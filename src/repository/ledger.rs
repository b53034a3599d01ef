//! Per-year progress ledger.
//!
//! Two append-only CSV logs live in each year directory: `archived_logs.csv`
//! (SUCCESS and EMPTY rows) and `failed_logs.csv` (FAILED rows). At open they
//! are folded into hash-indexed state that drives admission. The logs are
//! advisory: a SUCCESS row only counts while its file is still a valid
//! artifact on disk.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{DownloadTask, FailedEntry, FetchStatus, Language, LedgerEntry, TaskKey};
use crate::storage::{self, ARCHIVED_LOG, FAILED_LOG};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ledger CSV error on {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

/// Admission decision for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Never attempted.
    Fresh,
    /// Previously failed this many times, still under the cap.
    Retry(u32),
    /// Already archived.
    SkipArchived,
    /// A valid artifact was on disk without a SUCCESS row; one was appended.
    Adopted,
    /// Failed this many times, at or over the cap.
    SkipExhausted(u32),
}

impl Admission {
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Fresh | Self::Retry(_))
    }
}

/// Row counts of a year's ledgers, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub success_rows: usize,
    pub empty_rows: usize,
    pub failed_rows: usize,
    pub archived_keys: usize,
    pub failed_keys: usize,
    pub exhausted_keys: usize,
}

/// Year-scoped ledger state plus open append handles.
pub struct ProgressLedger {
    archived_path: PathBuf,
    failed_path: PathBuf,
    min_file_size: u64,
    max_retries: u32,
    succeeded: HashSet<TaskKey>,
    failure_counts: HashMap<TaskKey, u32>,
    empty_docs: HashSet<String>,
    archived: csv::Writer<File>,
    failed: csv::Writer<File>,
}

impl ProgressLedger {
    /// Rebuild ledger state for a year directory and open the logs for append.
    pub fn open(year_dir: &Path, min_file_size: u64, max_retries: u32) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(year_dir).map_err(|source| LedgerError::Io {
            path: year_dir.to_path_buf(),
            source,
        })?;

        let archived_path = year_dir.join(ARCHIVED_LOG);
        let failed_path = year_dir.join(FAILED_LOG);

        let mut recorded: HashMap<TaskKey, PathBuf> = HashMap::new();
        let mut empty_docs = HashSet::new();
        for entry in read_rows::<LedgerEntry>(&archived_path)? {
            match entry.status {
                FetchStatus::Success => {
                    recorded.insert(entry.key(), PathBuf::from(&entry.file_path));
                }
                FetchStatus::Empty => {
                    empty_docs.insert(entry.doc_id);
                }
                FetchStatus::Failed => {}
            }
        }

        let mut succeeded = HashSet::with_capacity(recorded.len());
        let mut stale = 0usize;
        for (key, path) in recorded {
            match storage::validate_artifact(&path, min_file_size) {
                Ok(_) => {
                    succeeded.insert(key);
                }
                Err(reason) => {
                    debug!("Stale success row for {}: {}", key, reason);
                    stale += 1;
                }
            }
        }

        let mut failure_counts: HashMap<TaskKey, u32> = HashMap::new();
        for entry in read_rows::<FailedEntry>(&failed_path)? {
            *failure_counts.entry(entry.key()).or_default() += 1;
        }

        if stale > 0 {
            warn!(
                "{} archived entries no longer have a valid file and will be re-fetched",
                stale
            );
        }
        info!(
            "Ledger for {}: {} archived, {} with failures",
            year_dir.display(),
            succeeded.len(),
            failure_counts.len()
        );

        let archived = open_writer(&archived_path)?;
        let failed = open_writer(&failed_path)?;

        Ok(Self {
            archived_path,
            failed_path,
            min_file_size,
            max_retries,
            succeeded,
            failure_counts,
            empty_docs,
            archived,
            failed,
        })
    }

    pub fn archived_log(&self) -> &Path {
        &self.archived_path
    }

    pub fn failed_log(&self) -> &Path {
        &self.failed_path
    }

    pub fn is_succeeded(&self, key: &TaskKey) -> bool {
        self.succeeded.contains(key)
    }

    pub fn failure_count(&self, key: &TaskKey) -> u32 {
        self.failure_counts.get(key).copied().unwrap_or(0)
    }

    pub fn is_exhausted(&self, key: &TaskKey) -> bool {
        self.failure_count(key) >= self.max_retries
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    /// Decide whether a candidate should be fetched.
    ///
    /// A valid final-named artifact with no SUCCESS row is adopted rather
    /// than fetched again.
    pub fn admit(&mut self, task: &DownloadTask) -> Result<Admission, LedgerError> {
        let key = task.key();
        if self.succeeded.contains(&key) {
            return Ok(Admission::SkipArchived);
        }

        if let Ok(size) = storage::validate_artifact(&task.file_path, self.min_file_size) {
            info!("Adopting existing file for {}", key);
            self.record_success(task, size)?;
            return Ok(Admission::Adopted);
        }

        let failures = self.failure_count(&key);
        if failures >= self.max_retries {
            return Ok(Admission::SkipExhausted(failures));
        }
        if failures > 0 {
            Ok(Admission::Retry(failures))
        } else {
            Ok(Admission::Fresh)
        }
    }

    /// Append a SUCCESS row for a committed artifact.
    pub fn record_success(&mut self, task: &DownloadTask, size_bytes: u64) -> Result<(), LedgerError> {
        let entry = LedgerEntry::success(task, size_bytes);
        append(&mut self.archived, &self.archived_path, &entry)?;
        self.succeeded.insert(task.key());
        Ok(())
    }

    /// Append a FAILED row; returns the failure count for the key.
    pub fn record_failure(&mut self, task: &DownloadTask, reason: &str) -> Result<u32, LedgerError> {
        let key = task.key();
        let count = self.failure_count(&key) + 1;
        let entry = FailedEntry::new(task, reason, count);
        append(&mut self.failed, &self.failed_path, &entry)?;
        self.failure_counts.insert(key, count);
        Ok(count)
    }

    /// Append an EMPTY row for a document with nothing to fetch.
    ///
    /// Written once per doc id; returns false when already recorded.
    pub fn record_empty(
        &mut self,
        doc_id: &str,
        date: &str,
        description: &str,
        marker_path: &Path,
    ) -> Result<bool, LedgerError> {
        if self.empty_docs.contains(doc_id) {
            return Ok(false);
        }
        let entry = LedgerEntry {
            timestamp: chrono::Utc::now(),
            doc_id: doc_id.to_string(),
            date: date.to_string(),
            language: Language::Unknown,
            description: description.to_string(),
            file_path: marker_path.display().to_string(),
            size_bytes: 0,
            status: FetchStatus::Empty,
        };
        append(&mut self.archived, &self.archived_path, &entry)?;
        self.empty_docs.insert(doc_id.to_string());
        Ok(true)
    }

    /// Count ledger rows without opening the logs for writing.
    pub fn summarize(year_dir: &Path, max_retries: u32) -> Result<LedgerSummary, LedgerError> {
        let mut summary = LedgerSummary::default();

        let mut archived_keys = HashSet::new();
        for entry in read_rows::<LedgerEntry>(&year_dir.join(ARCHIVED_LOG))? {
            match entry.status {
                FetchStatus::Success => {
                    summary.success_rows += 1;
                    archived_keys.insert(entry.key());
                }
                FetchStatus::Empty => summary.empty_rows += 1,
                FetchStatus::Failed => {}
            }
        }

        let mut failures: HashMap<TaskKey, u32> = HashMap::new();
        for entry in read_rows::<FailedEntry>(&year_dir.join(FAILED_LOG))? {
            summary.failed_rows += 1;
            *failures.entry(entry.key()).or_default() += 1;
        }

        summary.archived_keys = archived_keys.len();
        summary.failed_keys = failures
            .keys()
            .filter(|k| !archived_keys.contains(*k))
            .count();
        summary.exhausted_keys = failures
            .iter()
            .filter(|(k, n)| **n >= max_retries && !archived_keys.contains(*k))
            .count();
        Ok(summary)
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, LedgerError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| LedgerError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut rows = Vec::new();
    for (line, row) in reader.deserialize::<T>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            // Torn last line after a crash, or a hand-edited row.
            Err(e) => warn!(
                "Skipping malformed row {} in {}: {}",
                line + 2,
                path.display(),
                e
            ),
        }
    }
    Ok(rows)
}

fn open_writer(path: &Path) -> Result<csv::Writer<File>, LedgerError> {
    let io_err = |source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    let len = file.metadata().map_err(io_err)?.len();
    let is_new = len == 0;

    // A torn last row must not swallow the next append.
    if !is_new {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1)).map_err(io_err)?;
        file.read_exact(&mut last).map_err(io_err)?;
        if last[0] != b'\n' {
            warn!("Terminating torn last row in {}", path.display());
            file.write_all(b"\n").map_err(io_err)?;
        }
    }

    Ok(csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file))
}

fn append<T: Serialize>(
    writer: &mut csv::Writer<File>,
    path: &Path,
    row: &T,
) -> Result<(), LedgerError> {
    writer.serialize(row).map_err(|source| LedgerError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut content = b"%PDF-1.4\n".to_vec();
        content.resize(len, b'0');
        content
    }

    fn task(dir: &Path, doc_id: &str, language: Language) -> DownloadTask {
        DownloadTask {
            doc_id: doc_id.to_string(),
            date: "2024-12-31".to_string(),
            description: "Notice, with \"quotes\"".to_string(),
            url: format!("https://x/{}_E.pdf", doc_id),
            language,
            file_path: dir
                .join("12/31")
                .join(doc_id)
                .join(format!("{}_{}.pdf", doc_id, language)),
        }
    }

    fn commit_file(task: &DownloadTask, len: usize) {
        std::fs::create_dir_all(task.file_path.parent().unwrap()).unwrap();
        std::fs::write(&task.file_path, pdf_bytes(len)).unwrap();
    }

    #[test]
    fn test_success_survives_reopen() {
        let dir = tempdir().unwrap();
        let t = task(dir.path(), "d1", Language::English);
        commit_file(&t, 2048);

        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            assert_eq!(ledger.admit(&t).unwrap(), Admission::Adopted);
        }

        let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
        assert!(ledger.is_succeeded(&t.key()));
        assert_eq!(ledger.admit(&t).unwrap(), Admission::SkipArchived);

        let contents = std::fs::read_to_string(dir.path().join(ARCHIVED_LOG)).unwrap();
        assert_eq!(contents.matches("SUCCESS").count(), 1);
        assert!(contents.starts_with(
            "timestamp,gazette_id,date,language,description,file_path,file_size_bytes,status"
        ));
    }

    #[test]
    fn test_missing_file_makes_success_stale() {
        let dir = tempdir().unwrap();
        let t = task(dir.path(), "d1", Language::English);
        commit_file(&t, 2048);
        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            ledger.record_success(&t, 2048).unwrap();
        }

        std::fs::remove_file(&t.file_path).unwrap();
        let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
        assert!(!ledger.is_succeeded(&t.key()));
        assert_eq!(ledger.admit(&t).unwrap(), Admission::Fresh);
    }

    #[test]
    fn test_undersized_file_makes_success_stale() {
        let dir = tempdir().unwrap();
        let t = task(dir.path(), "d1", Language::Tamil);
        commit_file(&t, 2048);
        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            ledger.record_success(&t, 2048).unwrap();
        }

        std::fs::write(&t.file_path, b"%PDF-").unwrap();
        let ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
        assert!(!ledger.is_succeeded(&t.key()));
    }

    #[test]
    fn test_failures_count_toward_cap() {
        let dir = tempdir().unwrap();
        let t = task(dir.path(), "d2", Language::Sinhala);

        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            assert_eq!(ledger.admit(&t).unwrap(), Admission::Fresh);
            assert_eq!(ledger.record_failure(&t, "HTTP 404").unwrap(), 1);
            assert_eq!(ledger.admit(&t).unwrap(), Admission::Retry(1));
            assert_eq!(ledger.record_failure(&t, "HTTP 404").unwrap(), 2);
        }

        let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
        assert_eq!(ledger.failure_count(&t.key()), 2);
        assert_eq!(ledger.record_failure(&t, "timeout").unwrap(), 3);
        assert_eq!(ledger.admit(&t).unwrap(), Admission::SkipExhausted(3));
        assert!(!ledger.admit(&t).unwrap().is_dispatch());

        let summary = ProgressLedger::summarize(dir.path(), 3).unwrap();
        assert_eq!(summary.failed_rows, 3);
        assert_eq!(summary.failed_keys, 1);
        assert_eq!(summary.exhausted_keys, 1);
    }

    #[test]
    fn test_empty_rows_written_once_per_doc() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("x/unavailable.json");

        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            assert!(ledger.record_empty("x", "2024-01-01", "", &marker).unwrap());
            assert!(!ledger.record_empty("x", "2024-01-01", "", &marker).unwrap());
        }
        let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
        assert!(!ledger.record_empty("x", "2024-01-01", "", &marker).unwrap());

        let summary = ProgressLedger::summarize(dir.path(), 3).unwrap();
        assert_eq!(summary.empty_rows, 1);
        assert_eq!(summary.success_rows, 0);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempdir().unwrap();
        let t = task(dir.path(), "d3", Language::English);
        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            ledger.record_failure(&t, "HTTP 500").unwrap();
        }
        let path = dir.path().join(FAILED_LOG);
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("2024-01-01T00:00:00Z,d3,broken\n");
        std::fs::write(&path, contents).unwrap();

        let ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
        assert_eq!(ledger.failure_count(&t.key()), 1);
    }

    #[test]
    fn test_append_after_torn_row_is_kept() {
        let dir = tempdir().unwrap();
        let t = task(dir.path(), "d4", Language::English);
        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            ledger.record_failure(&t, "HTTP 500").unwrap();
        }

        // Partial row with no line terminator, as left by a crash mid-write.
        let path = dir.path().join(FAILED_LOG);
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("2024-01-01T00:00:00Z,d4,2024-01-01,engl");
        std::fs::write(&path, contents).unwrap();

        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            assert_eq!(ledger.failure_count(&t.key()), 1);
            assert_eq!(ledger.record_failure(&t, "HTTP 500").unwrap(), 2);
        }

        let ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
        assert_eq!(ledger.failure_count(&t.key()), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("engl\n"));
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_terminated_log_is_left_alone() {
        let dir = tempdir().unwrap();
        let t = task(dir.path(), "d5", Language::Tamil);
        {
            let mut ledger = ProgressLedger::open(dir.path(), 1024, 3).unwrap();
            ledger.record_failure(&t, "HTTP 500").unwrap();
        }
        let path = dir.path().join(FAILED_LOG);
        let before = std::fs::read_to_string(&path).unwrap();

        drop(ProgressLedger::open(dir.path(), 1024, 3).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
