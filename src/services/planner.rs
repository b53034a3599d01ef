//! Folder and path planning.
//!
//! Turns filtered document records into download candidates with
//! deterministic archive paths, creating `year/month/day/doc_id` directories
//! and writing `unavailable.json` markers for records with nothing to fetch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::date_detection::resolve_document_date;
use crate::models::{ArchiveFilter, DocumentRecord, DownloadTask, TaskKey};
use crate::storage::{self, UNAVAILABLE_MARKER};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode marker for {doc_id}: {source}")]
    Marker {
        doc_id: String,
        source: serde_json::Error,
    },
}

/// A record with no fetchable artifact.
#[derive(Debug, Clone)]
pub struct UnavailableDoc {
    pub doc_id: String,
    pub record: DocumentRecord,
    pub marker_path: PathBuf,
}

/// Output of planning one run.
#[derive(Debug, Default)]
pub struct PlannedBatch {
    /// Candidates in record order, then language-button order.
    pub tasks: Vec<DownloadTask>,
    pub unavailable: Vec<UnavailableDoc>,
    /// Records dropped by the year/month/day filter.
    pub filtered_out: usize,
    /// Records filed under today's date because their date was unparseable.
    pub date_fallbacks: usize,
    /// Links dropped because an earlier link already claimed the same key.
    pub duplicates: usize,
}

/// Maps records onto the archive directory tree.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    archive_dir: PathBuf,
}

impl PathPlanner {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    /// Plan every record matching `filter`.
    ///
    /// Each (doc_id, language) key yields at most one task; later links that
    /// resolve to an already planned key are dropped.
    pub fn plan(
        &self,
        records: &[DocumentRecord],
        filter: &ArchiveFilter,
    ) -> Result<PlannedBatch, PlanError> {
        let mut batch = PlannedBatch::default();
        let mut planned = HashSet::new();

        for record in records {
            let doc_id = record.normalized_id();
            let resolved = resolve_document_date(&doc_id, &record.date);
            if !filter.matches_date(resolved.date) {
                batch.filtered_out += 1;
                continue;
            }
            if resolved.fallback {
                batch.date_fallbacks += 1;
            }

            let doc_dir = storage::document_dir(&self.archive_dir, resolved.date, &doc_id);
            std::fs::create_dir_all(&doc_dir).map_err(|source| PlanError::Io {
                path: doc_dir.clone(),
                source,
            })?;

            if !record.is_fetchable() {
                let marker_path = write_marker(&doc_dir, &doc_id, record)?;
                batch.unavailable.push(UnavailableDoc {
                    doc_id,
                    record: record.clone(),
                    marker_path,
                });
                continue;
            }

            for (language, url) in record.links() {
                if !filter.lang.matches(language) {
                    continue;
                }
                if !planned.insert(TaskKey::new(doc_id.clone(), language)) {
                    warn!(
                        "Dropping {}: {} ({}) already has a link in this plan",
                        url, doc_id, language
                    );
                    batch.duplicates += 1;
                    continue;
                }
                batch.tasks.push(DownloadTask {
                    file_path: storage::artifact_path(
                        &self.archive_dir,
                        resolved.date,
                        &doc_id,
                        language,
                    ),
                    doc_id: doc_id.clone(),
                    date: record.date.clone(),
                    description: record.description.clone(),
                    url,
                    language,
                });
            }
        }

        info!(
            "Planned {} candidates, {} unavailable, {} outside filter",
            batch.tasks.len(),
            batch.unavailable.len(),
            batch.filtered_out
        );
        Ok(batch)
    }
}

fn write_marker(doc_dir: &Path, doc_id: &str, record: &DocumentRecord) -> Result<PathBuf, PlanError> {
    let marker_path = doc_dir.join(UNAVAILABLE_MARKER);
    if marker_path.exists() {
        return Ok(marker_path);
    }

    let json = serde_json::to_string_pretty(record).map_err(|source| PlanError::Marker {
        doc_id: doc_id.to_string(),
        source,
    })?;
    std::fs::write(&marker_path, json).map_err(|source| PlanError::Io {
        path: marker_path.clone(),
        source,
    })?;
    debug!("Wrote unavailable marker {}", marker_path.display());
    Ok(marker_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, Language, LanguageFilter, LanguageLink, NO_URL};
    use tempfile::tempdir;

    fn record(doc_id: &str, date: &str, url: &str, availability: Availability) -> DocumentRecord {
        DocumentRecord {
            doc_id: doc_id.to_string(),
            date: date.to_string(),
            description: "Notice".to_string(),
            download_url: url.to_string(),
            availability,
            downloads: Vec::new(),
        }
    }

    #[test]
    fn test_plan_single_record() {
        let dir = tempdir().unwrap();
        let planner = PathPlanner::new(dir.path());
        let records = vec![record(
            "2417/14",
            "2024-12-31",
            "https://x/2417-14_E.pdf",
            Availability::Available,
        )];

        let batch = planner
            .plan(&records, &ArchiveFilter::for_year(2024))
            .unwrap();
        assert_eq!(batch.tasks.len(), 1);
        let task = &batch.tasks[0];
        assert_eq!(task.doc_id, "2417-14");
        assert_eq!(task.language, Language::English);
        assert_eq!(
            task.file_path,
            dir.path().join("2024/12/31/2417-14/2417-14_english.pdf")
        );
        assert!(dir.path().join("2024/12/31/2417-14").is_dir());
    }

    #[test]
    fn test_unavailable_records_get_marker() {
        let dir = tempdir().unwrap();
        let planner = PathPlanner::new(dir.path());
        let records = vec![
            record("a", "2024-01-02", NO_URL, Availability::Available),
            record("b", "02/01/2024", "https://x/b_E.pdf", Availability::Unavailable),
        ];

        let batch = planner
            .plan(&records, &ArchiveFilter::for_year(2024))
            .unwrap();
        assert!(batch.tasks.is_empty());
        assert_eq!(batch.unavailable.len(), 2);

        let marker = dir.path().join("2024/01/02/b").join(UNAVAILABLE_MARKER);
        let stored: DocumentRecord =
            serde_json::from_str(&std::fs::read_to_string(marker).unwrap()).unwrap();
        assert_eq!(stored.doc_id, "b");
    }

    #[test]
    fn test_filters_by_date_and_language() {
        let dir = tempdir().unwrap();
        let planner = PathPlanner::new(dir.path());
        let mut multi = record("m", "2024-03-05", NO_URL, Availability::Available);
        multi.downloads = vec![
            LanguageLink {
                language: "English".to_string(),
                url: "https://x/m_E.pdf".to_string(),
            },
            LanguageLink {
                language: "Sinhala".to_string(),
                url: "https://x/m_S.pdf".to_string(),
            },
        ];
        let records = vec![
            multi,
            record("old", "2023-03-05", "https://x/old_E.pdf", Availability::Available),
            record("apr", "2024-04-05", "https://x/apr_E.pdf", Availability::Available),
        ];

        let filter = ArchiveFilter {
            year: 2024,
            month: Some(3),
            day: None,
            lang: LanguageFilter::Only(Language::Sinhala),
        };
        let batch = planner.plan(&records, &filter).unwrap();
        assert_eq!(batch.filtered_out, 2);
        assert_eq!(batch.tasks.len(), 1);
        assert_eq!(batch.tasks[0].language, Language::Sinhala);
        assert!(!dir.path().join("2023").exists());
    }

    #[test]
    fn test_unrecognised_labels_do_not_share_a_path() {
        let dir = tempdir().unwrap();
        let planner = PathPlanner::new(dir.path());
        let mut rec = record("a", "2024-05-05", NO_URL, Availability::Available);
        rec.downloads = vec![
            LanguageLink {
                language: "Sinhalese".to_string(),
                url: "https://x/a_1.pdf".to_string(),
            },
            LanguageLink {
                language: "Tamil (TA)".to_string(),
                url: "https://x/a_2.pdf".to_string(),
            },
        ];

        let batch = planner
            .plan(&[rec], &ArchiveFilter::for_year(2024))
            .unwrap();
        assert_eq!(batch.tasks.len(), 1);
        assert_eq!(batch.duplicates, 1);
        assert_eq!(batch.tasks[0].language, Language::Unknown);
        assert_eq!(batch.tasks[0].url, "https://x/a_1.pdf");
    }

    #[test]
    fn test_repeated_record_planned_once() {
        let dir = tempdir().unwrap();
        let planner = PathPlanner::new(dir.path());
        let rec = record("r", "2024-07-07", "https://x/r_E.pdf", Availability::Available);

        let batch = planner
            .plan(&[rec.clone(), rec], &ArchiveFilter::for_year(2024))
            .unwrap();
        assert_eq!(batch.tasks.len(), 1);
        assert_eq!(batch.duplicates, 1);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let dir = tempdir().unwrap();
        let planner = PathPlanner::new(dir.path());
        let records = vec![record(
            "x",
            "2024.6.1",
            "https://x/x_T.pdf",
            Availability::Available,
        )];
        let filter = ArchiveFilter::for_year(2024);

        let first = planner.plan(&records, &filter).unwrap();
        let second = planner.plan(&records, &filter).unwrap();
        assert_eq!(first.tasks, second.tasks);
    }
}
