//! # Calendar Days
//!
//! Cash sessions are bound to the *local* calendar day of the shop, while
//! every timestamp is stored in UTC. These helpers translate between the two
//! for a fixed UTC offset.
//!
//! ```text
//!   local day 2024-03-10 at UTC-03:00
//!
//!   start (inclusive)            end of day               next start (exclusive)
//!   2024-03-10T03:00:00Z   ...   2024-03-11T02:59:59.999Z  2024-03-11T03:00:00Z
//! ```

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// First instant of `date` in `tz`, as UTC.
pub fn day_start(date: NaiveDate, tz: &FixedOffset) -> DateTime<Utc> {
    let local_midnight = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local_midnight - Duration::seconds(i64::from(tz.local_minus_utc()))))
}

/// Half-open `[start, next_start)` range covering `date` in `tz`.
pub fn day_bounds(date: NaiveDate, tz: &FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day_start(date, tz);
    (start, start + Duration::days(1))
}

/// 23:59:59.999 local time on `date`, as UTC. Used as the close time of
/// sessions closed by the day rollover.
pub fn end_of_day(date: NaiveDate, tz: &FixedOffset) -> DateTime<Utc> {
    day_bounds(date, tz).1 - Duration::milliseconds(1)
}

/// Calendar day of `instant` as seen in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: &FixedOffset) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Parses the date shapes the UI and imported spreadsheets produce:
/// `YYYY-MM-DD`, `DD/MM/YYYY` and full RFC 3339 timestamps (whose own
/// offset decides the day).
pub fn normalize_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%d/%m/%Y") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_bounds_in_negative_offset() {
        let (start, end) = day_bounds(day(2024, 3, 10), &brt());
        assert_eq!(start.to_rfc3339(), "2024-03-10T03:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-03-11T03:00:00+00:00");
    }

    #[test]
    fn test_end_of_day_is_last_millisecond() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let eod = end_of_day(day(2024, 3, 10), &utc);
        assert_eq!(eod.to_rfc3339(), "2024-03-10T23:59:59.999+00:00");
        assert_eq!(local_date(eod, &utc), day(2024, 3, 10));
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        let late_evening = Utc.with_ymd_and_hms(2024, 3, 11, 1, 30, 0).unwrap();
        assert_eq!(local_date(late_evening, &brt()), day(2024, 3, 10));
    }

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("2024-02-29"), Some(day(2024, 2, 29)));
        assert_eq!(normalize_date(" 05/11/2023 "), Some(day(2023, 11, 5)));
        assert_eq!(
            normalize_date("2024-01-15T22:10:00-03:00"),
            Some(day(2024, 1, 15))
        );
        assert_eq!(normalize_date("2023-02-29"), None);
        assert_eq!(normalize_date("yesterday"), None);
        assert_eq!(normalize_date(""), None);
    }
}
