//! Deadline statistics over a partition's records.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use tender_search::TenderRecord;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d %B %Y", "%B %d, %Y"];

/// Parse a free-form deadline. Returns `None` for empty or unrecognized text.
pub fn parse_deadline(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Deadline counts for a set of tenders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeadlineStats {
    pub total: usize,
    pub valid_dates: usize,
    pub invalid_dates: usize,
    /// Deadlines strictly after `now`.
    pub future_dates: usize,
}

impl DeadlineStats {
    pub fn compute(records: &[TenderRecord], now: NaiveDateTime) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };

        for record in records {
            match parse_deadline(&record.deadline) {
                Some(deadline) => {
                    stats.valid_dates += 1;
                    if deadline > now {
                        stats.future_dates += 1;
                    }
                }
                None => stats.invalid_dates += 1,
            }
        }
        stats
    }
}
