//! Date normalization for field values and query bounds.
//!
//! Two entry points with different strictness:
//!
//! - [`normalize_date`] — used by the value formatter. Tries a short ordered
//!   pattern list (day-first, then slash, then ISO) and passes unrecognized
//!   input through unchanged so legitimate formats the formatter does not
//!   yet know are not blocked.
//! - [`parse_flexible_date`] — used on the query side. Accepts relative
//!   keywords ("last week"), shorthands ("-3d"), and a longer format list;
//!   unrecognized input is an error here.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, Result};

/// Canonical output format.
const ISO_DATE: &str = "%Y-%m-%d";

/// Accepted input patterns for field values, in trial order. Day-first
/// formats come before ISO: "01-07-2025" is July 1st, not a malformed ISO.
const FIELD_DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Wider format list for query-side parsing.
const FLEXIBLE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",  // 2025-07-01
    "%d/%m/%Y",  // 01/07/2025 (EU)
    "%m/%d/%Y",  // 07/01/2025 (US)
    "%d-%m-%Y",  // 01-07-2025
    "%m-%d-%Y",  // 07-01-2025
    "%d %b %Y",  // 1 Jul 2025
    "%d %B %Y",  // 1 July 2025
    "%B %d, %Y", // July 1, 2025
    "%b %d, %Y", // Jul 1, 2025
];

static SHORTHAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-(\d+)([dwmy])$").expect("valid shorthand regex"));

/// Normalize a field date value to `YYYY-MM-DD`.
///
/// The first pattern that parses wins. Input that matches no pattern is
/// returned unchanged rather than rejected.
pub fn normalize_date(value: &str) -> String {
    let trimmed = value.trim();
    for fmt in FIELD_DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return parsed.format(ISO_DATE).to_string();
        }
    }
    value.to_string()
}

/// Parse flexible human date input into `YYYY-MM-DD`.
///
/// Supports relative keywords (today, yesterday, this/last week/month/year),
/// shorthands (`-1w`, `-3d`, `-2m`, `-1y`), and common absolute formats.
pub fn parse_flexible_date(input: &str) -> Result<String> {
    let today = Utc::now().date_naive();
    parse_flexible_date_from(input, today)
}

/// Deterministic core of [`parse_flexible_date`]; `today` is injected.
pub fn parse_flexible_date_from(input: &str, today: NaiveDate) -> Result<String> {
    let input = input.trim().to_lowercase();

    if let Some(date) = resolve_relative_keyword(&input, today) {
        return Ok(date.format(ISO_DATE).to_string());
    }

    if let Some(caps) = SHORTHAND_RE.captures(&input) {
        let amount: i64 = caps[1]
            .parse()
            .map_err(|_| CoreError::validation(format!("bad shorthand amount in '{}'", input)))?;
        let days = match &caps[2] {
            "d" => amount,
            "w" => 7 * amount,
            "m" => 30 * amount,
            "y" => 365 * amount,
            _ => unreachable!("regex restricts the unit"),
        };
        let date = today - Duration::days(days);
        return Ok(date.format(ISO_DATE).to_string());
    }

    for fmt in FLEXIBLE_DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(&input, fmt) {
            return Ok(parsed.format(ISO_DATE).to_string());
        }
    }

    Err(CoreError::validation(format!(
        "unrecognized date format: '{}'",
        input
    )))
}

fn resolve_relative_keyword(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let weekday_offset = today.weekday().num_days_from_monday() as i64;
    match input {
        "today" | "now" => Some(today),
        "yesterday" => Some(today - Duration::days(1)),
        "this week" => Some(today - Duration::days(weekday_offset)),
        "last week" => Some(today - Duration::days(weekday_offset + 7)),
        "this month" => NaiveDate::from_ymd_opt(today.year(), today.month(), 1),
        "last month" => {
            let (year, month) = if today.month() == 1 {
                (today.year() - 1, 12)
            } else {
                (today.year(), today.month() - 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
        }
        "this year" => NaiveDate::from_ymd_opt(today.year(), 1, 1),
        "last year" => NaiveDate::from_ymd_opt(today.year() - 1, 1, 1),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
