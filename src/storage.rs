//! On-disk layout and artifact commit helpers.
//!
//! Layout: `{archive_dir}/{year}/{month:02}/{day:02}/{doc_id}/{doc_id}_{language}.pdf`.
//! Artifacts are written to a `.tmp` sibling first and renamed into place
//! only after validation, so a final-named file is always complete.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::models::Language;

/// Suffix of uncommitted artifacts.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Marker written for documents with nothing to fetch.
pub const UNAVAILABLE_MARKER: &str = "unavailable.json";

pub const ARCHIVED_LOG: &str = "archived_logs.csv";
pub const FAILED_LOG: &str = "failed_logs.csv";
pub const CHECKPOINT_FILE: &str = "progress_state.json";
pub const RESULTS_FILE: &str = "archive_results.json";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Why an artifact is not acceptable as committed work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("file is missing")]
    Missing,
    #[error("file is {size} bytes, below the {min} byte minimum")]
    TooSmall { size: u64, min: u64 },
    #[error("file does not start with a PDF header")]
    BadHeader,
    #[error("could not inspect file: {0}")]
    Unreadable(String),
}

/// Directory of one document: `{archive_dir}/{year}/{month}/{day}/{doc_id}`.
pub fn document_dir(archive_dir: &Path, date: NaiveDate, doc_id: &str) -> PathBuf {
    archive_dir
        .join(date.year().to_string())
        .join(format!("{:02}", date.month()))
        .join(format!("{:02}", date.day()))
        .join(doc_id)
}

/// Final path of one artifact. Pure function of its inputs.
pub fn artifact_path(
    archive_dir: &Path,
    date: NaiveDate,
    doc_id: &str,
    language: Language,
) -> PathBuf {
    document_dir(archive_dir, date, doc_id).join(format!("{}_{}.pdf", doc_id, language.as_str()))
}

/// Temp sibling of a final artifact path (`x.pdf` becomes `x.pdf.tmp`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Check that `content` could be committed to `final_path`.
pub fn validate_content(final_path: &Path, content: &[u8], min_size: u64) -> Result<(), ArtifactError> {
    let size = content.len() as u64;
    if size < min_size {
        return Err(ArtifactError::TooSmall {
            size,
            min: min_size,
        });
    }
    if is_pdf_path(final_path) && !looks_like_pdf(content) {
        return Err(ArtifactError::BadHeader);
    }
    Ok(())
}

fn looks_like_pdf(content: &[u8]) -> bool {
    match infer::get(content) {
        Some(kind) => kind.mime_type() == "application/pdf",
        None => content.starts_with(PDF_MAGIC),
    }
}

/// Validate an artifact already on disk; returns its size.
pub fn validate_artifact(path: &Path, min_size: u64) -> Result<u64, ArtifactError> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ArtifactError::Missing),
        Err(e) => return Err(ArtifactError::Unreadable(e.to_string())),
    };
    if !meta.is_file() {
        return Err(ArtifactError::Missing);
    }
    let size = meta.len();
    if size < min_size {
        return Err(ArtifactError::TooSmall {
            size,
            min: min_size,
        });
    }
    if is_pdf_path(path) {
        let mut header = [0u8; 8];
        let read = fs::File::open(path)
            .and_then(|mut f| io::Read::read(&mut f, &mut header))
            .map_err(|e| ArtifactError::Unreadable(e.to_string()))?;
        if !looks_like_pdf(&header[..read]) {
            return Err(ArtifactError::BadHeader);
        }
    }
    Ok(size)
}

/// Write `content` to the temp sibling of `final_path` and sync it.
pub fn write_temp(final_path: &Path, content: &[u8]) -> io::Result<PathBuf> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(final_path);
    let mut file = fs::File::create(&tmp)?;
    file.write_all(content)?;
    file.sync_all()?;
    Ok(tmp)
}

/// Atomically move a validated temp file to its final name.
pub fn commit(tmp: &Path, final_path: &Path) -> io::Result<()> {
    fs::rename(tmp, final_path)
}

/// Remove a temp file, ignoring a file that is already gone.
pub fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("failed to remove {}: {}", tmp.display(), e);
        }
    }
}

/// Files removed by [`cleanup_partial_files`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub temp_files: Vec<PathBuf>,
    pub undersized_files: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.temp_files.len() + self.undersized_files.len()
    }
}

/// Remove stray `.tmp` files and undersized PDFs under `root`.
///
/// Neither can be a committed artifact: commits are renames of validated
/// temp files.
pub fn cleanup_partial_files(root: &Path, min_size: u64) -> CleanupReport {
    let mut report = CleanupReport::default();
    if !root.exists() {
        return report;
    }

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();

        if name.ends_with(TEMP_SUFFIX) {
            if fs::remove_file(path).is_ok() {
                debug!("removed temp file {}", path.display());
                report.temp_files.push(path.to_path_buf());
            }
            continue;
        }

        if is_pdf_path(path) {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size < min_size && fs::remove_file(path).is_ok() {
                debug!("removed undersized file {} ({} bytes)", path.display(), size);
                report.undersized_files.push(path.to_path_buf());
            }
        }
    }

    report
}
