//! Run filter: which year, month, day and language a run covers.

use chrono::{Datelike, NaiveDate};

use super::checkpoint::FilterSignature;
use super::document::LanguageFilter;

/// Restriction applied to the record list before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveFilter {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub lang: LanguageFilter,
}

impl ArchiveFilter {
    pub fn for_year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
            lang: LanguageFilter::All,
        }
    }

    /// Whether a resolved publication date falls inside this filter.
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        date.year() == self.year
            && self.month.map_or(true, |m| date.month() == m)
            && self.day.map_or(true, |d| date.day() == d)
    }

    /// Identity a checkpoint is recorded under. Month and day are zero-padded.
    pub fn signature(&self) -> FilterSignature {
        FilterSignature {
            year: self.year.to_string(),
            month: self.month.map(|m| format!("{:02}", m)),
            day: self.day.map(|d| format!("{:02}", d)),
            lang: self.lang.code().to_string(),
        }
    }
}
