//! Calendar-date helpers for `YYYY-MM-DD` due dates.

use chrono::{Local, NaiveDate};

/// Label shown for tasks without a usable due date.
pub const NO_DUE_DATE: &str = "No due date";

const ISO_DATE: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` string. Absent, blank, or malformed input yields `None`.
pub fn parse_date_safe(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, ISO_DATE).ok()
}

/// Short human form (`Dec 12`), or [`NO_DUE_DATE`] when the input does not parse.
pub fn format_date_short(value: Option<&str>) -> String {
    match parse_date_safe(value) {
        Some(date) => date.format("%b %-d").to_string(),
        None => NO_DUE_DATE.to_string(),
    }
}

/// Canonical `YYYY-MM-DD` form of a parseable date, `None` otherwise.
pub fn normalize_date(value: Option<&str>) -> Option<String> {
    parse_date_safe(value).map(|d| d.format(ISO_DATE).to_string())
}

/// The current calendar day in local time. Only call this at entry points.
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}
