//! Clinic wall-clock helpers.
//!
//! All scheduling decisions (which day is "today", whether the morning
//! session has passed) are made in the clinic's configured UTC offset, never
//! in the server's local zone. Services take an explicit `now` so tests can
//! pin the clock.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");
const DATE_TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Current instant in the clinic's offset.
#[must_use]
pub fn local_now(offset: UtcOffset) -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(offset)
}

/// Parse a `YYYY-MM-DD` calendar date.
#[must_use]
pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), DATE_FORMAT).ok()
}

/// Format a calendar date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_default()
}

/// Format the wall-clock time of an instant as `HH:MM`.
#[must_use]
pub fn format_time(at: OffsetDateTime) -> String {
    at.format(TIME_FORMAT).unwrap_or_default()
}

/// Format an instant as `YYYY-MM-DD HH:MM`.
#[must_use]
pub fn format_date_time(at: OffsetDateTime) -> String {
    at.format(DATE_TIME_FORMAT).unwrap_or_default()
}

/// Midnight at the start of `date` in `offset`.
#[must_use]
pub fn start_of_day(date: Date, offset: UtcOffset) -> OffsetDateTime {
    date.midnight().assume_offset(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn date_round_trip() {
        let d = parse_date("2026-10-18").expect("date");
        assert_eq!(d, date!(2026 - 10 - 18));
        assert_eq!(format_date(d), "2026-10-18");
    }

    #[test]
    fn parse_date_rejects_bad_input() {
        assert!(parse_date("18/10/2026").is_none());
        assert!(parse_date("2026-13-01").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn format_time_is_24_hour() {
        assert_eq!(format_time(datetime!(2026-10-18 16:30 +05:30)), "16:30");
        assert_eq!(format_time(datetime!(2026-10-18 06:05 +05:30)), "06:05");
    }

    #[test]
    fn start_of_day_uses_offset() {
        let start = start_of_day(date!(2026 - 10 - 18), UtcOffset::from_hms(5, 30, 0).expect("offset"));
        assert_eq!(start, datetime!(2026-10-17 18:30 UTC));
    }
}
