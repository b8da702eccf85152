//! Time types for CalDAV queries and events.
//!
//! This module provides [`TimeRange`] for the `time-range` filter of a
//! calendar-query, and [`EventTime`] for interpreting the raw `DTSTART` /
//! `DTEND` text that comes back from a server. Everything on the wire uses
//! the iCalendar basic UTC form `YYYYMMDDTHHMMSSZ`.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// `strftime` pattern of the iCalendar basic UTC date-time form.
pub const ICAL_BASIC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Errors produced while building a [`TimeRange`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// A timestamp could not be parsed.
    #[error("invalid timestamp '{0}', expected YYYYMMDDTHHMMSSZ")]
    InvalidTimestamp(String),

    /// The range end lies before its start.
    #[error("time range end {end} is before start {start}")]
    Inverted {
        /// Formatted start.
        start: String,
        /// Formatted end.
        end: String,
    },
}

/// Formats a UTC datetime as `YYYYMMDDTHHMMSSZ`.
pub fn format_basic(dt: DateTime<Utc>) -> String {
    dt.format(ICAL_BASIC_FORMAT).to_string()
}

/// Parses a strict `YYYYMMDDTHHMMSSZ` timestamp.
pub fn parse_basic(s: &str) -> Result<DateTime<Utc>, TimeError> {
    let trimmed = s.trim();
    let naive = trimmed
        .strip_suffix('Z')
        .and_then(|body| NaiveDateTime::parse_from_str(body, "%Y%m%dT%H%M%S").ok())
        .ok_or_else(|| TimeError::InvalidTimestamp(trimmed.to_string()))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// The time of an event as found in a `DTSTART`/`DTEND` value.
///
/// Servers hand back three shapes:
/// - **DateTime**: a UTC instant (`20250205T100000Z`, or ISO 8601 with an offset)
/// - **Floating**: a local time without zone (`20250205T100000`, often with a `TZID` parameter)
/// - **AllDay**: a plain date (`20250210`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific instant, stored in UTC.
    DateTime(DateTime<Utc>),
    /// A wall-clock time with no zone information.
    Floating(NaiveDateTime),
    /// An all-day date.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Parses a raw value in iCalendar basic or ISO 8601 form.
    ///
    /// Returns `None` for anything else; the raw text stays the source of truth.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        // Date only (YYYYMMDD or YYYY-MM-DD)
        if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
            return NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(Self::AllDay);
        }
        if s.len() == 10
            && let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        {
            return Some(Self::AllDay(date));
        }

        if let Ok(dt) = parse_basic(s) {
            return Some(Self::DateTime(dt));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S") {
            return Some(Self::Floating(naive));
        }

        // ISO 8601 / RFC 3339
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self::DateTime(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(Self::Floating)
    }

    /// Returns `true` if this is an all-day date.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the UTC instant if the value carried one.
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Converts to a UTC datetime for comparison purposes.
    ///
    /// Floating times are read as UTC; all-day dates become midnight UTC.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::Floating(naive) => Utc.from_utc_datetime(naive),
            Self::AllDay(date) => Utc.from_utc_datetime(&NaiveDateTime::from(*date)),
        }
    }

    /// Returns the date portion.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::Floating(naive) => naive.date(),
            Self::AllDay(date) => *date,
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// The interval sent in a calendar-query `time-range` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range.
    pub start: DateTime<Utc>,
    /// End of the range.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Inverted`] if `end` is before `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeError> {
        if end < start {
            return Err(TimeError::Inverted {
                start: format_basic(start),
                end: format_basic(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Creates a range from two pre-formatted `YYYYMMDDTHHMMSSZ` strings.
    pub fn parse_basic(start: &str, end: &str) -> Result<Self, TimeError> {
        Self::new(parse_basic(start)?, parse_basic(end)?)
    }

    /// Creates a range starting at `now` and extending `duration`.
    pub fn from_now(now: DateTime<Utc>, duration: Duration) -> Result<Self, TimeError> {
        Self::new(now, now + duration)
    }

    /// Creates a range covering one UTC day.
    pub fn for_date(date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&NaiveDateTime::from(date));
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Start in `YYYYMMDDTHHMMSSZ` form.
    pub fn start_basic(&self) -> String {
        format_basic(self.start)
    }

    /// End in `YYYYMMDDTHHMMSSZ` form.
    pub fn end_basic(&self) -> String {
        format_basic(self.end)
    }

    /// Returns the length of the range.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks whether an event spanning `[start, end)` overlaps this range.
    pub fn overlaps(&self, start: &EventTime, end: &EventTime) -> bool {
        start.to_utc_datetime() < self.end && end.to_utc_datetime() > self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod basic_format {
        use super::*;

        #[test]
        fn format() {
            assert_eq!(format_basic(utc(2025, 2, 5, 14, 30, 0)), "20250205T143000Z");
        }

        #[test]
        fn parse() {
            assert_eq!(parse_basic("20200101T000000Z").unwrap(), utc(2020, 1, 1, 0, 0, 0));
        }

        #[test]
        fn parse_rejects_missing_zone() {
            assert_eq!(
                parse_basic("20200101T000000"),
                Err(TimeError::InvalidTimestamp("20200101T000000".to_string()))
            );
        }

        #[test]
        fn parse_rejects_iso() {
            assert!(parse_basic("2020-01-01T00:00:00Z").is_err());
        }
    }

    mod event_time {
        use super::*;

        #[test]
        fn utc_basic() {
            let et = EventTime::parse("20250205T100000Z").unwrap();
            assert_eq!(et, EventTime::DateTime(utc(2025, 2, 5, 10, 0, 0)));
            assert!(!et.is_all_day());
        }

        #[test]
        fn floating_basic() {
            let et = EventTime::parse("20250205T100000").unwrap();
            assert!(matches!(et, EventTime::Floating(_)));
            assert_eq!(et.to_utc_datetime(), utc(2025, 2, 5, 10, 0, 0));
            assert!(et.as_datetime().is_none());
        }

        #[test]
        fn all_day() {
            let et = EventTime::parse("20250210").unwrap();
            assert_eq!(et, EventTime::AllDay(date(2025, 2, 10)));
            assert!(et.is_all_day());
            assert_eq!(et.to_utc_datetime(), utc(2025, 2, 10, 0, 0, 0));
        }

        #[test]
        fn iso_with_offset() {
            let et = EventTime::parse("2025-02-05T12:00:00+02:00").unwrap();
            assert_eq!(et, EventTime::DateTime(utc(2025, 2, 5, 10, 0, 0)));
        }

        #[test]
        fn iso_date() {
            assert_eq!(
                EventTime::parse("2025-02-10"),
                Some(EventTime::AllDay(date(2025, 2, 10)))
            );
        }

        #[test]
        fn garbage() {
            assert_eq!(EventTime::parse(""), None);
            assert_eq!(EventTime::parse("tomorrow"), None);
        }

        #[test]
        fn ordering() {
            let morning = EventTime::parse("20250205T100000Z").unwrap();
            let noon = EventTime::parse("20250205T120000Z").unwrap();
            let day = EventTime::parse("20250205").unwrap();
            assert!(day < morning);
            assert!(morning < noon);
        }

        #[test]
        fn date_extraction() {
            assert_eq!(EventTime::parse("20250205T235900Z").unwrap().date(), date(2025, 2, 5));
        }

        #[test]
        fn serde_roundtrip() {
            let et = EventTime::parse("20250205T100000Z").unwrap();
            let json = serde_json::to_string(&et).unwrap();
            let parsed: EventTime = serde_json::from_str(&json).unwrap();
            assert_eq!(et, parsed);
        }
    }

    mod time_range {
        use super::*;

        #[test]
        fn creation() {
            let range = TimeRange::new(utc(2025, 2, 1, 0, 0, 0), utc(2025, 2, 28, 23, 59, 59)).unwrap();
            assert_eq!(range.start_basic(), "20250201T000000Z");
            assert_eq!(range.end_basic(), "20250228T235959Z");
        }

        #[test]
        fn inverted() {
            let err = TimeRange::new(utc(2025, 2, 5, 17, 0, 0), utc(2025, 2, 5, 9, 0, 0)).unwrap_err();
            assert!(matches!(err, TimeError::Inverted { .. }));
        }

        #[test]
        fn empty_range_allowed() {
            let t = utc(2025, 2, 5, 9, 0, 0);
            assert!(TimeRange::new(t, t).is_ok());
        }

        #[test]
        fn parse_basic_strings() {
            let range = TimeRange::parse_basic("20200101T000000Z", "20301231T235959Z").unwrap();
            assert_eq!(range.start, utc(2020, 1, 1, 0, 0, 0));
            assert_eq!(range.end, utc(2030, 12, 31, 23, 59, 59));
        }

        #[test]
        fn parse_basic_bad_input() {
            assert!(TimeRange::parse_basic("2020-01-01", "20301231T235959Z").is_err());
        }

        #[test]
        fn for_date() {
            let range = TimeRange::for_date(date(2025, 2, 5));
            assert_eq!(range.start, utc(2025, 2, 5, 0, 0, 0));
            assert_eq!(range.end, utc(2025, 2, 6, 0, 0, 0));
            assert_eq!(range.duration(), Duration::hours(24));
        }

        #[test]
        fn from_now() {
            let now = utc(2025, 2, 5, 10, 0, 0);
            let range = TimeRange::from_now(now, Duration::hours(48)).unwrap();
            assert_eq!(range.end, utc(2025, 2, 7, 10, 0, 0));
        }

        #[test]
        fn overlaps() {
            let range = TimeRange::new(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 17, 0, 0)).unwrap();

            let start = EventTime::DateTime(utc(2025, 2, 5, 8, 0, 0));
            let end = EventTime::DateTime(utc(2025, 2, 5, 10, 0, 0));
            assert!(range.overlaps(&start, &end));

            // Ends exactly at range start
            let end = EventTime::DateTime(utc(2025, 2, 5, 9, 0, 0));
            assert!(!range.overlaps(&start, &end));
        }
    }
}
