//! Lenient timestamp resolution.
//!
//! Upstream systems send seconds, milliseconds, ISO strings and
//! `DD.MM.YYYY, HH:MM` strings for the same field. Resolution never fails:
//! anything unusable becomes the caller's "now".

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Numeric inputs below this are seconds since the epoch, at or above it milliseconds.
pub const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%#z"];

static DAY_FIRST_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{1,2})[./-](\d{1,2})[./-](\d{4}|\d{2})(?:[,\s]+(\d{1,2}):(\d{2})(?::(\d{2}))?)?$",
    )
    .expect("DAY_FIRST_REGEX should compile")
});

static DIGITS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").expect("DIGITS_REGEX should compile"));

/// Raw timestamp as it may arrive from the server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimestampInput<'a> {
    Missing,
    Timestamp(DateTime<Utc>),
    Number(f64),
    Text(&'a str),
    /// Booleans, arrays, objects
    Unsupported,
}

impl<'a> From<&'a Value> for TimestampInput<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => TimestampInput::Missing,
            Value::Number(n) => n
                .as_f64()
                .map(TimestampInput::Number)
                .unwrap_or(TimestampInput::Unsupported),
            Value::String(s) => TimestampInput::Text(s),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => TimestampInput::Unsupported,
        }
    }
}

impl<'a> From<Option<&'a Value>> for TimestampInput<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        value.map(TimestampInput::from).unwrap_or(TimestampInput::Missing)
    }
}

impl<'a> From<&'a str> for TimestampInput<'a> {
    fn from(value: &'a str) -> Self {
        TimestampInput::Text(value)
    }
}

impl From<f64> for TimestampInput<'_> {
    fn from(value: f64) -> Self {
        TimestampInput::Number(value)
    }
}

impl From<i64> for TimestampInput<'_> {
    fn from(value: i64) -> Self {
        TimestampInput::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for TimestampInput<'_> {
    fn from(value: DateTime<Utc>) -> Self {
        TimestampInput::Timestamp(value)
    }
}

/// Resolve a timestamp, falling back to the current time.
pub fn parse_timestamp<'a>(input: impl Into<TimestampInput<'a>>) -> DateTime<Utc> {
    parse_timestamp_at(input, Utc::now())
}

/// Resolve a timestamp, falling back to `now`.
pub fn parse_timestamp_at<'a>(
    input: impl Into<TimestampInput<'a>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match input.into() {
        TimestampInput::Missing | TimestampInput::Unsupported => now,
        TimestampInput::Timestamp(at) => at,
        // Zero and NaN count as "not sent"
        TimestampInput::Number(n) if n == 0.0 || n.is_nan() => now,
        TimestampInput::Number(n) => from_epoch(n).unwrap_or(now),
        TimestampInput::Text(text) => parse_text(text).unwrap_or(now),
    }
}

/// Seconds below [`EPOCH_MILLIS_THRESHOLD`], milliseconds otherwise.
fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value < EPOCH_MILLIS_THRESHOLD {
        value * 1000.0
    } else {
        value
    };
    DateTime::from_timestamp_millis(millis.trunc() as i64)
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_general(trimmed)
        .or_else(|| parse_day_first(trimmed))
        .or_else(|| {
            DIGITS_REGEX
                .is_match(trimmed)
                .then(|| trimmed.parse::<f64>().ok())
                .flatten()
                .and_then(from_epoch)
        })
}

/// ISO 8601 / RFC 3339, RFC 2822, and offset-less ISO-like date-times (local time).
fn parse_general(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(text) {
        return Some(at.with_timezone(&Utc));
    }
    for format in OFFSET_DATE_TIME_FORMATS {
        if let Ok(at) = DateTime::parse_from_str(text, format) {
            return Some(at.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(local_to_utc(naive));
        }
    }
    // Date-only ISO strings are UTC midnight
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `D.M.Y[, H:M[:S]]` with `.`, `/` or `-` separators, in local time.
fn parse_day_first(text: &str) -> Option<DateTime<Utc>> {
    let caps = DAY_FIRST_REGEX.captures(text)?;
    let number = |idx: usize| -> Option<u32> {
        caps.get(idx)
            .map(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(Some(0))
    };

    let day = number(1)?;
    let month = number(2)?;
    let mut year = i32::try_from(number(3)?).ok()?;
    if year < 100 {
        year += 2000;
    }
    let hours = number(4)?;
    let minutes = number(5)?;
    let seconds = number(6)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hours, minutes, seconds)?;
    Some(local_to_utc(naive))
}

fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}
