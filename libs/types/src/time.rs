//! Exchange-local timestamp composition
//!
//! The gateway stamps every tick with a calendar day (`YYYYMMDD`), a
//! wall-clock time (`HH:MM:SS`) and a millisecond counter, all in the
//! exchange's local time. Points are stored in UTC, so composition
//! needs the exchange's fixed UTC offset.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::errors::TimestampError;

/// UTC offset of the China futures exchanges (+08:00).
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Width of a `YYYYMMDD` day stamp.
pub const DAY_WIDTH: usize = 8;

/// Width of an `HH:MM:SS` time stamp.
pub const TIME_WIDTH: usize = 8;

/// Fixed offset for `utc_offset_secs`, if it lies strictly within a day.
pub fn utc_offset(utc_offset_secs: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(utc_offset_secs)
}

/// Build a UTC timestamp from exchange-local components.
pub fn compose_timestamp(
    day: &str,
    time: &str,
    millisecond: i32,
    utc_offset_secs: i32,
) -> Result<DateTime<Utc>, TimestampError> {
    if !(0..=999).contains(&millisecond) {
        return Err(TimestampError::Millisecond(millisecond));
    }

    let date = NaiveDate::parse_from_str(day, "%Y%m%d")
        .map_err(|_| TimestampError::Day(day.to_string()))?;
    let clock = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .map_err(|_| TimestampError::Time(time.to_string()))?;
    let offset = utc_offset(utc_offset_secs).ok_or(TimestampError::Offset(utc_offset_secs))?;

    let local = date.and_time(clock) + chrono::Duration::milliseconds(millisecond as i64);
    let timestamp = offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TimestampError::Day(day.to_string()))?;

    // Storage keys points by i64 nanoseconds (years 1677 to 2262).
    if unix_nanos(&timestamp).is_none() {
        return Err(TimestampError::OutOfRange);
    }
    Ok(timestamp)
}

/// Nanoseconds since the Unix epoch, as used by the storage write protocol.
pub fn unix_nanos(timestamp: &DateTime<Utc>) -> Option<i64> {
    timestamp.timestamp_nanos_opt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_compose_shifts_to_utc() {
        let ts = compose_timestamp("20170105", "09:30:01", 500, DEFAULT_UTC_OFFSET_SECS).unwrap();
        assert_eq!(ts.to_rfc3339(), "2017-01-05T01:30:01.500+00:00");
    }

    #[test]
    fn test_compose_night_session_crosses_midnight_utc() {
        let ts = compose_timestamp("20170105", "03:00:00", 0, DEFAULT_UTC_OFFSET_SECS).unwrap();
        assert_eq!(ts.to_rfc3339(), "2017-01-04T19:00:00+00:00");
    }

    #[test]
    fn test_compose_rejects_bad_components() {
        assert_eq!(
            compose_timestamp("20171345", "09:30:00", 0, 0),
            Err(TimestampError::Day("20171345".to_string()))
        );
        assert_eq!(
            compose_timestamp("20170105", "25:30:00", 0, 0),
            Err(TimestampError::Time("25:30:00".to_string()))
        );
        assert_eq!(
            compose_timestamp("20170105", "09:30:00", 1000, 0),
            Err(TimestampError::Millisecond(1000))
        );
        assert_eq!(
            compose_timestamp("20170105", "09:30:00", 0, 86_400),
            Err(TimestampError::Offset(86_400))
        );
    }

    #[test]
    fn test_compose_rejects_days_outside_nanosecond_range() {
        assert_eq!(
            compose_timestamp("99990105", "09:30:01", 0, DEFAULT_UTC_OFFSET_SECS),
            Err(TimestampError::OutOfRange)
        );
        assert_eq!(
            compose_timestamp("16000101", "00:00:00", 0, 0),
            Err(TimestampError::OutOfRange)
        );
        assert!(compose_timestamp("22620101", "00:00:00", 0, 0).is_ok());
    }

    #[test]
    fn test_milliseconds_are_preserved() {
        let ts = compose_timestamp("20170105", "09:30:00", 999, 0).unwrap();
        assert_eq!(ts.nanosecond(), 999_000_000);
        assert_eq!(unix_nanos(&ts).unwrap() % 1_000_000_000, 999_000_000);
    }

    proptest::proptest! {
        #[test]
        fn prop_compose_is_monotonic_within_a_day(
            a in 0u32..86_400_000,
            b in 0u32..86_400_000,
        ) {
            let stamp = |ms_of_day: u32| {
                let secs = ms_of_day / 1000;
                let time = format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
                compose_timestamp("20170105", &time, (ms_of_day % 1000) as i32, DEFAULT_UTC_OFFSET_SECS)
                    .unwrap()
            };
            let (lo, hi) = (a.min(b), a.max(b));
            proptest::prop_assert!(stamp(lo) <= stamp(hi));
            proptest::prop_assert_eq!(
                (stamp(hi) - stamp(lo)).num_milliseconds(),
                (hi - lo) as i64
            );
        }
    }
}
