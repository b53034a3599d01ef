//! Document descriptors received from the upstream table scraper, and the
//! per-language download tasks derived from them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel used upstream when a document has no download link.
pub const NO_URL: &str = "N/A";

/// Upstream-declared availability of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    #[default]
    Unavailable,
}

/// Language of a published artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Sinhala,
    Tamil,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Sinhala => "sinhala",
            Self::Tamil => "tamil",
            Self::Unknown => "unknown",
        }
    }

    /// Short code used on the command line and in checkpoints.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Sinhala => "si",
            Self::Tamil => "ta",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a button label or language code (`"English"`, `"si"`, `"tamil"`).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "en" | "e" | "english" => Self::English,
            "si" | "s" | "sinhala" => Self::Sinhala,
            "ta" | "t" | "tamil" => Self::Tamil,
            _ => Self::Unknown,
        }
    }

    /// Infer the language from the artifact URL.
    ///
    /// Gazette PDFs are published as `<id>_E.pdf`, `<id>_S.pdf` and `<id>_T.pdf`.
    pub fn from_url(url: &str) -> Self {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        let file = path.rsplit('/').next().unwrap_or_default().to_uppercase();
        let stem = file.strip_suffix(".PDF").unwrap_or(file.as_str());

        match stem.rsplit_once('_').map(|(_, suffix)| suffix) {
            Some("E") => Self::English,
            Some("S") => Self::Sinhala,
            Some("T") => Self::Tamil,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language restriction requested for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LanguageFilter {
    #[default]
    All,
    Only(Language),
}

impl LanguageFilter {
    pub fn matches(&self, language: Language) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == language,
        }
    }

    /// Code stored in the checkpoint's filter signature.
    pub fn code(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(lang) => lang.code(),
        }
    }
}

impl FromStr for LanguageFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "en" | "english" => Ok(Self::Only(Language::English)),
            "si" | "sinhala" => Ok(Self::Only(Language::Sinhala)),
            "ta" | "tamil" => Ok(Self::Only(Language::Tamil)),
            other => Err(format!(
                "unsupported language '{}' (expected en, si, ta or all)",
                other
            )),
        }
    }
}

/// One language button of a document row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageLink {
    pub language: String,
    pub url: String,
}

/// A document descriptor as produced by the upstream table scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub date: String,
    #[serde(default, alias = "des")]
    pub description: String,
    #[serde(default = "default_url")]
    pub download_url: String,
    #[serde(default)]
    pub availability: Availability,
    /// Per-language buttons, when the scraper captured more than one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<LanguageLink>,
}

fn default_url() -> String {
    NO_URL.to_string()
}

impl DocumentRecord {
    /// Whether any artifact of this record can be fetched.
    pub fn is_fetchable(&self) -> bool {
        self.availability == Availability::Available && !self.links().is_empty()
    }

    /// Download links with their resolved language.
    pub fn links(&self) -> Vec<(Language, String)> {
        if !self.downloads.is_empty() {
            return self
                .downloads
                .iter()
                .filter(|link| is_real_url(&link.url))
                .map(|link| (Language::from_label(&link.language), link.url.clone()))
                .collect();
        }
        if is_real_url(&self.download_url) {
            vec![(
                Language::from_url(&self.download_url),
                self.download_url.clone(),
            )]
        } else {
            Vec::new()
        }
    }

    /// Doc id usable as a single path component (`2417/14` becomes `2417-14`).
    pub fn normalized_id(&self) -> String {
        normalize_doc_id(&self.doc_id)
    }
}

fn is_real_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && url != NO_URL
}

/// Replace path separators so an upstream id can be used as a directory name.
pub fn normalize_doc_id(doc_id: &str) -> String {
    doc_id.trim().replace(['/', '\\'], "-")
}

/// Ledger identity of a candidate: one artifact per (doc_id, language) per year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub doc_id: String,
    pub language: Language,
}

impl TaskKey {
    pub fn new(doc_id: impl Into<String>, language: Language) -> Self {
        Self {
            doc_id: doc_id.into(),
            language,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.doc_id, self.language)
    }
}

/// A single artifact to fetch: one language of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Normalised doc id.
    pub doc_id: String,
    /// Date string exactly as received.
    pub date: String,
    pub description: String,
    pub url: String,
    pub language: Language,
    /// Final archive location of the artifact.
    pub file_path: PathBuf,
}

impl DownloadTask {
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.doc_id.clone(), self.language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, availability: Availability) -> DocumentRecord {
        DocumentRecord {
            doc_id: "2417/14".to_string(),
            date: "2024-12-31".to_string(),
            description: "Land acquisition notice".to_string(),
            download_url: url.to_string(),
            availability,
            downloads: Vec::new(),
        }
    }

    #[test]
    fn test_language_from_url_suffix() {
        assert_eq!(
            Language::from_url("https://x/2417-14_E.pdf"),
            Language::English
        );
        assert_eq!(
            Language::from_url("https://x/files/2417-14_S.pdf"),
            Language::Sinhala
        );
        assert_eq!(Language::from_url("https://x/2417-14_t.PDF"), Language::Tamil);
        assert_eq!(Language::from_url("https://x/2417-14.pdf"), Language::Unknown);
    }

    #[test]
    fn test_language_filter_parse() {
        assert_eq!("all".parse::<LanguageFilter>(), Ok(LanguageFilter::All));
        assert_eq!(
            "EN".parse::<LanguageFilter>(),
            Ok(LanguageFilter::Only(Language::English))
        );
        assert!("fr".parse::<LanguageFilter>().is_err());
        assert_eq!(LanguageFilter::Only(Language::Tamil).code(), "ta");
    }

    #[test]
    fn test_record_links() {
        let rec = record("https://x/2417-14_E.pdf", Availability::Available);
        assert!(rec.is_fetchable());
        assert_eq!(
            rec.links(),
            vec![(Language::English, "https://x/2417-14_E.pdf".to_string())]
        );
        assert_eq!(rec.normalized_id(), "2417-14");

        let na = record(NO_URL, Availability::Available);
        assert!(!na.is_fetchable());

        let flagged = record("https://x/2417-14_E.pdf", Availability::Unavailable);
        assert!(!flagged.is_fetchable());
    }

    #[test]
    fn test_record_with_language_buttons() {
        let mut rec = record(NO_URL, Availability::Available);
        rec.downloads = vec![
            LanguageLink {
                language: "English".to_string(),
                url: "https://x/a_E.pdf".to_string(),
            },
            LanguageLink {
                language: "Tamil".to_string(),
                url: "https://x/a_T.pdf".to_string(),
            },
        ];
        let langs: Vec<Language> = rec.links().into_iter().map(|(l, _)| l).collect();
        assert_eq!(langs, vec![Language::English, Language::Tamil]);
    }

    #[test]
    fn test_record_deserialize_defaults() {
        let json = r#"{"doc_id": "1", "date": "2024-01-01", "des": "x"}"#;
        let rec: DocumentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.description, "x");
        assert_eq!(rec.download_url, NO_URL);
        assert_eq!(rec.availability, Availability::Unavailable);
    }
}
