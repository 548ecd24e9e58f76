//! Lenient date parsing for dates as they appear on forms and in provider JSON.

use chrono::NaiveDate;

/// Formats tried in order. `%d`/`%m` accept one or two digits when parsing.
/// Two-digit years go first: `%Y` would read "26" as year 26.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%B %d %Y",
];

/// Parse a date string in any of the supported layouts.
///
/// `"2026-01-07"`, `"1/7/2026"`, `"01/07/26"`, `"January 7, 2026"`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim().trim_end_matches('.');
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse and sort a list of date strings, failing on the first bad entry.
pub fn parse_date_list(values: &[String]) -> Result<Vec<NaiveDate>, String> {
    let mut dates = values
        .iter()
        .map(|v| parse_date(v).ok_or_else(|| format!("unparseable date {v:?}")))
        .collect::<Result<Vec<_>, _>>()?;
    dates.sort();
    Ok(dates)
}
