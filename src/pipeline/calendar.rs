//! Fixed-offset local calendar (UTC-4, no daylight-saving adjustment)
//!
//! Every local field is derived from the UTC instant alone, so rows can be
//! re-derived at any time without a timezone database.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Timelike, Utc};

use super::error::{PipelineError, PipelineResult};

/// Hours the local calendar lags behind UTC
pub const LOCAL_OFFSET_HOURS: i64 = 4;

/// Local calendar fields stored next to each reading (`edt_*` columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFields {
    pub minute: u32,
    pub hour: u32,
    pub date: u32,
    /// Zero-based (January = 0), matching rows already in the table
    pub month: u32,
    pub year: i32,
}

impl LocalFields {
    pub fn from_utc(instant: DateTime<Utc>) -> Self {
        let local = to_local(instant);
        Self {
            minute: local.minute(),
            hour: local.hour(),
            date: local.day(),
            month: local.month0(),
            year: local.year(),
        }
    }
}

/// Inclusive UTC bounds of one local calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayBounds {
    /// `YYYY-MM-DD` of the local day
    pub fn label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Naive wall-clock time in the fixed local offset
pub fn to_local(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.naive_utc() - Duration::hours(LOCAL_OFFSET_HOURS)
}

pub fn local_date(instant: DateTime<Utc>) -> NaiveDate {
    to_local(instant).date()
}

/// 00:00:00.000 to 23:59:59.999 local of `date`, as UTC instants
pub fn day_bounds(date: NaiveDate) -> DayBounds {
    let local_start = date.and_time(NaiveTime::MIN);
    let start = (local_start + Duration::hours(LOCAL_OFFSET_HOURS)).and_utc();
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    DayBounds { date, start, end }
}

/// Bounds of the local day before the one containing `now`
pub fn previous_day_bounds(now: DateTime<Utc>) -> DayBounds {
    day_bounds(local_date(now) - Duration::days(1))
}

/// Canonical stored/exported form: `2024-03-10T03:59:00.000Z`
///
/// Fixed width, so string comparison in SQL orders chronologically.
pub fn to_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso(value: &str) -> PipelineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PipelineError::InvalidTimestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_local_fields_cross_midnight() {
        // 03:59Z is still the previous evening locally
        let fields = LocalFields::from_utc(utc(2024, 3, 10, 3, 59, 0));
        assert_eq!(fields.year, 2024);
        assert_eq!(fields.month, 2); // March, zero-based
        assert_eq!(fields.date, 9);
        assert_eq!(fields.hour, 23);
        assert_eq!(fields.minute, 59);
    }

    #[test]
    fn test_local_fields_ignore_dst() {
        // Summer and winter use the same offset
        let winter = LocalFields::from_utc(utc(2024, 1, 15, 12, 0, 0));
        let summer = LocalFields::from_utc(utc(2024, 7, 15, 12, 0, 0));
        assert_eq!(winter.hour, 8);
        assert_eq!(summer.hour, 8);
    }

    #[test]
    fn test_new_year_rollover() {
        let fields = LocalFields::from_utc(utc(2025, 1, 1, 2, 30, 0));
        assert_eq!(fields.year, 2024);
        assert_eq!(fields.month, 11);
        assert_eq!(fields.date, 31);
        assert_eq!(fields.hour, 22);
    }

    #[test]
    fn test_previous_day_bounds() {
        let bounds = previous_day_bounds(utc(2024, 3, 10, 12, 0, 0));
        assert_eq!(bounds.label(), "2024-03-09");
        assert_eq!(to_iso(bounds.start), "2024-03-09T04:00:00.000Z");
        assert_eq!(to_iso(bounds.end), "2024-03-10T03:59:59.999Z");
    }

    #[test]
    fn test_previous_day_bounds_early_utc() {
        // 02:00Z on the 10th is the 9th locally, so "yesterday" is the 8th
        let bounds = previous_day_bounds(utc(2024, 3, 10, 2, 0, 0));
        assert_eq!(bounds.label(), "2024-03-08");
    }

    #[test]
    fn test_iso_roundtrip_and_width() {
        let instant = utc(2024, 3, 10, 3, 59, 0);
        let iso = to_iso(instant);
        assert_eq!(iso, "2024-03-10T03:59:00.000Z");
        assert_eq!(parse_iso(&iso).unwrap(), instant);
        assert!(parse_iso("yesterday").is_err());
    }
}
