//! Month bucketing for incident timestamps.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A UTC calendar month, rendered as `YYYY-MM`.
///
/// Ordering is chronological, and for the years `parse_timestamp` admits it
/// matches the lexical ordering of the rendered keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
  year: i32,
  month: u32,
}

impl MonthKey {
  /// Build a key, returning `None` for a month outside 1..=12.
  #[cfg(test)]
  pub fn new(year: i32, month: u32) -> Option<Self> {
    (1..=12).contains(&month).then_some(Self { year, month })
  }

  pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
    Self {
      year: dt.year(),
      month: dt.month(),
    }
  }

  /// Short label for chart axes, e.g. `Jan 2025`.
  pub fn label(&self) -> String {
    const NAMES: [&str; 12] = [
      "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    format!("{} {}", NAMES[(self.month - 1) as usize], self.year)
  }
}

impl fmt::Display for MonthKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

impl Serialize for MonthKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Why a `created_at` value could not be turned into a month.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
  #[error("not an ISO-8601 timestamp")]
  Unrecognized,
  #[error("year {0} is outside 1..=9999")]
  YearOutOfRange(i32),
}

const OFFSET_FORMATS: [&str; 4] = [
  "%Y-%m-%dT%H:%M:%S%.f%:z",
  "%Y-%m-%dT%H:%M:%S%.f%z",
  "%Y-%m-%dT%H:%M%:z",
  "%Y-%m-%dT%H:%M%z",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse an ISO-8601 timestamp and normalize it to UTC.
///
/// Accepts RFC 3339, offsets with or without a colon (`Z` counts as
/// `+00:00`), times down to hour precision, a space instead of `T`, naive
/// date-times (taken as UTC) and bare dates (midnight UTC). Years must be
/// written with four digits and stay within 1..=9999 once in UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
  let raw = raw.trim();
  if !raw.starts_with(|c: char| c.is_ascii_digit()) {
    return Err(TimestampError::Unrecognized);
  }

  let parsed = parse_utc(raw).ok_or(TimestampError::Unrecognized)?;
  if !(1..=9999).contains(&parsed.year()) {
    return Err(TimestampError::YearOutOfRange(parsed.year()));
  }
  Ok(parsed)
}

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }

  if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    return Some(date.and_time(chrono::NaiveTime::MIN).and_utc());
  }

  let normalized = normalize(raw);

  for format in OFFSET_FORMATS {
    if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
      return Some(dt.with_timezone(&Utc));
    }
  }

  for format in NAIVE_FORMATS {
    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
      return Some(naive.and_utc());
    }
  }

  None
}

/// Rewrite into the shapes the format lists expect: `T` separator, numeric
/// offset instead of `Z`, and explicit minutes after a bare hour.
fn normalize(raw: &str) -> String {
  let mut out = raw.to_string();

  if out.len() > 10 && out.as_bytes()[10] == b' ' {
    out.replace_range(10..11, "T");
  }

  if out.ends_with('Z') || out.ends_with('z') {
    out.truncate(out.len() - 1);
    out.push_str("+00:00");
  }

  // YYYY-MM-DDTHH, optionally followed by an offset
  let bytes = out.as_bytes();
  let hour_only = bytes.len() >= 13
    && bytes[11].is_ascii_digit()
    && bytes[12].is_ascii_digit()
    && matches!(bytes.get(13), None | Some(b'+') | Some(b'-'));
  if hour_only {
    out.insert_str(13, ":00");
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn key(raw: &str) -> String {
    MonthKey::from_datetime(&parse_timestamp(raw).unwrap()).to_string()
  }

  #[test]
  fn test_zulu_timestamp() {
    assert_eq!(key("2025-01-15T00:00:00Z"), "2025-01");
  }

  #[test]
  fn test_fractional_seconds() {
    assert_eq!(key("2024-11-30T23:59:59.999Z"), "2024-11");
  }

  #[test]
  fn test_offset_is_normalized_to_utc() {
    // 23:30 at -02:00 is already the next month in UTC
    assert_eq!(key("2025-01-31T23:30:00-02:00"), "2025-02");
    assert_eq!(key("2025-03-01T00:30:00+01:00"), "2025-02");
  }

  #[test]
  fn test_naive_and_date_only_forms() {
    assert_eq!(key("2025-06-01T12:00:00"), "2025-06");
    assert_eq!(key("2025-06-01 12:00:00.5"), "2025-06");
    assert_eq!(key("2025-07-04"), "2025-07");
    assert_eq!(key("2025-01-15T10:30"), "2025-01");
    assert_eq!(key("2025-01-15T10"), "2025-01");
  }

  #[test]
  fn test_reduced_precision_and_compact_offsets() {
    for raw in [
      "2025-01-15T10:30Z",
      "2025-01-15T10:30+00:00",
      "2025-01-15T10:30:00+0000",
      "2025-01-15T10Z",
      "2025-01-15 10:30:00Z",
    ] {
      assert_eq!(
        parse_timestamp(raw).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 15, 10, if raw.contains(":30") { 30 } else { 0 }, 0).unwrap(),
        "{}",
        raw
      );
    }
    // Compact offsets still shift into UTC
    assert_eq!(key("2025-01-31T23:30-0200"), "2025-02");
  }

  #[test]
  fn test_years_outside_four_digits_are_rejected() {
    assert!(parse_timestamp("+10000-01-01T00:00:00").is_err());
    assert!(parse_timestamp("-0001-01-01T00:00:00").is_err());
    assert!(parse_timestamp("+2025-01-01T00:00:00").is_err());
    assert_eq!(
      parse_timestamp("0000-12-31T23:00:00"),
      Err(TimestampError::YearOutOfRange(0))
    );
    // Converting to UTC can leave the valid range too
    assert_eq!(
      parse_timestamp("0001-01-01T00:30:00+01:00"),
      Err(TimestampError::YearOutOfRange(0))
    );
    assert_eq!(key("9999-12-31T23:59:59Z"), "9999-12");
    assert_eq!(key("0001-01-01T00:00:00Z"), "0001-01");
  }

  #[test]
  fn test_garbage_is_rejected() {
    assert!(parse_timestamp("not-a-date").is_err());
    assert!(parse_timestamp("").is_err());
    assert!(parse_timestamp("2025-13-01T00:00:00Z").is_err());
  }

  #[test]
  fn test_month_is_zero_padded() {
    assert_eq!(MonthKey::new(2025, 3).unwrap().to_string(), "2025-03");
    assert_eq!(MonthKey::new(987, 12).unwrap().to_string(), "0987-12");
    assert_eq!(MonthKey::new(2025, 0), None);
    assert_eq!(MonthKey::new(2025, 13), None);
  }

  #[test]
  fn test_lexical_sort_matches_chronological_sort() {
    let mut keys = Vec::new();
    for year in [999, 1999, 2000, 2009, 2010, 2024, 2025, 9999] {
      for month in [1, 2, 9, 10, 11, 12] {
        keys.push(MonthKey::new(year, month).unwrap());
      }
    }
    // Scramble deterministically
    keys.reverse();
    keys.rotate_left(7);

    let mut chronological = keys.clone();
    chronological.sort();
    let chronological: Vec<String> = chronological.iter().map(|k| k.to_string()).collect();

    let mut lexical: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    lexical.sort();

    assert_eq!(lexical, chronological);
  }

  #[test]
  fn test_label() {
    assert_eq!(MonthKey::new(2025, 1).unwrap().label(), "Jan 2025");
    assert_eq!(MonthKey::new(2024, 12).unwrap().label(), "Dec 2024");
  }
}
