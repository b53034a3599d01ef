//! Publication date parsing for document records.
//!
//! Upstream tables are inconsistent: the same listing may mix `2024-12-31`,
//! `31/12/2024` and `2024.12.31`. A four-digit leading group means
//! year-first, otherwise the date is read day-first.

use chrono::{Local, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Order of the numeric groups matched by a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldOrder {
    YearMonthDay,
    DayMonthYear,
}

static DATE_PATTERNS: LazyLock<Vec<(Regex, FieldOrder)>> = LazyLock::new(|| {
    vec![
        // 2024-12-31, 2024/12/31, 2024.12.31
        (
            Regex::new(r"(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})").unwrap(),
            FieldOrder::YearMonthDay,
        ),
        // 31-12-2024, 31/12/2024, 31.12.2024
        (
            Regex::new(r"(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})").unwrap(),
            FieldOrder::DayMonthYear,
        ),
    ]
});

/// Parse a date string in any of the tolerated layouts.
pub fn parse_document_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for (pattern, order) in DATE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(raw) else {
            continue;
        };
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        let c: u32 = caps[3].parse().ok()?;

        let (year, month, day) = match order {
            FieldOrder::YearMonthDay => (a as i32, b, c),
            FieldOrder::DayMonthYear => (c as i32, b, a),
        };

        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    None
}

/// A parsed date, or today's date when the input was unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    /// True when the raw string could not be parsed.
    pub fallback: bool,
}

/// Resolve a record's date, falling back to the current date with a warning.
pub fn resolve_document_date(doc_id: &str, raw: &str) -> ResolvedDate {
    match parse_document_date(raw) {
        Some(date) => ResolvedDate {
            date,
            fallback: false,
        },
        None => {
            let today = Local::now().date_naive();
            warn!(
                "Unparseable date '{}' for document {}, filing under {}",
                raw, doc_id, today
            );
            ResolvedDate {
                date: today,
                fallback: true,
            }
        }
    }
}
