//! Schedule evaluation for TaskRun resources.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Strict wire layout for schedules: absolute UTC, trailing `Z`.
pub const SCHEDULE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Schedule parsing failure.
#[derive(Debug, Error)]
#[error("schedule parsing failed for {value:?}: {source}")]
pub struct ScheduleError {
    pub value: String,
    #[source]
    pub source: chrono::ParseError,
}

/// Time remaining until the schedule, relative to `now`.
///
/// Negative means overdue, which is a valid, expected result: the
/// caller treats any non-positive remainder as "due now".
pub fn time_until(schedule: &str, now: DateTime<Utc>) -> Result<chrono::Duration, ScheduleError> {
    let scheduled = NaiveDateTime::parse_from_str(schedule, SCHEDULE_LAYOUT)
        .map_err(|source| ScheduleError {
            value: schedule.to_string(),
            source,
        })?
        .and_utc();
    Ok(scheduled - now)
}

/// Injectable clock so schedule evaluation is deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock.
    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut current) = self.now.lock() {
            *current = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|n| *n).unwrap_or_else(|_| Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rstest::rstest;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_future_schedule_is_positive() {
        let now = utc("2026-08-27T00:00:00Z");
        let remaining = time_until("2099-01-01T00:00:00Z", now).unwrap();
        assert!(remaining > chrono::Duration::zero());
    }

    #[test]
    fn test_past_schedule_is_negative_not_an_error() {
        let now = utc("2026-08-27T00:00:00Z");
        let remaining = time_until("2020-01-01T00:00:00Z", now).unwrap();
        assert!(remaining < chrono::Duration::zero());
    }

    #[test]
    fn test_exact_time_is_zero() {
        let now = utc("2026-08-27T12:30:00Z");
        let remaining = time_until("2026-08-27T12:30:00Z", now).unwrap();
        assert_eq!(remaining, chrono::Duration::zero());
    }

    #[rstest]
    #[case("not-a-time")]
    #[case("2026-08-27 12:30:00")]
    #[case("2026-08-27T12:30:00")]
    #[case("2026-08-27T12:30:00+02:00")]
    #[case("")]
    fn test_non_strict_layouts_are_rejected(#[case] schedule: &str) {
        let now = utc("2026-08-27T00:00:00Z");
        assert!(time_until(schedule, now).is_err());
    }

    proptest! {
        // time_until(s, t) = parse(s) - t, for arbitrary clock offsets.
        #[test]
        fn prop_remaining_equals_schedule_minus_now(offset_secs in -500_000_000i64..500_000_000i64) {
            let scheduled = Utc.with_ymd_and_hms(2040, 6, 15, 12, 0, 0).single().unwrap();
            let now = scheduled - chrono::Duration::seconds(offset_secs);
            let schedule = scheduled.format(SCHEDULE_LAYOUT).to_string();

            let remaining = time_until(&schedule, now).unwrap();
            prop_assert_eq!(remaining, chrono::Duration::seconds(offset_secs));
        }
    }

    #[test]
    fn test_fixed_clock_moves() {
        let clock = FixedClock::at(utc("2026-08-27T00:00:00Z"));
        assert_eq!(clock.now(), utc("2026-08-27T00:00:00Z"));
        clock.set(utc("2099-01-01T00:00:01Z"));
        assert_eq!(clock.now(), utc("2099-01-01T00:00:01Z"));
    }
}
