//! Calendar-day helpers shared by the metrics engine and the link registry.
//!
//! All dates are exchange-local calendar days (`NaiveDate`). String inputs
//! are validated here so that malformed dates and inverted ranges fail fast,
//! before any store is touched.

use crate::domain::errors::JournalError;
use chrono::NaiveDate;

/// Upper bound on the number of days a single range operation may expand to.
pub const MAX_RANGE_DAYS: i64 = 3660;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, JournalError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        JournalError::validation(format!("'{}' is not a YYYY-MM-DD date", value))
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Expand the inclusive range `[start, end]` day by day.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, JournalError> {
    if end < start {
        return Err(JournalError::validation(format!(
            "inverted date range: {} is after {}",
            start, end
        )));
    }

    let span = (end - start).num_days() + 1;
    if span > MAX_RANGE_DAYS {
        return Err(JournalError::validation(format!(
            "date range of {} days exceeds the {} day limit",
            span, MAX_RANGE_DAYS
        )));
    }

    Ok(start.iter_days().take(span as usize).collect())
}
