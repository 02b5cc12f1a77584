//! Wall-clock source for cooldown decisions.
//!
//! Cooldowns are stored as naive Brasília time (UTC-3) with second precision,
//! matching the timestamps the Authority reports.

use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use parking_lot::Mutex;

/// Offset of Brasília time from UTC, in hours.
const BRT_OFFSET_HOURS: i64 = -3;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current naive BRT time, truncated to whole seconds.
    fn now(&self) -> NaiveDateTime;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Utc::now().naive_utc() + Duration::hours(BRT_OFFSET_HOURS);
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    /// Creates a clock stopped at `now`.
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn system_clock_is_brt_seconds() {
        let now = SystemClock.now();
        assert_eq!(now.nanosecond(), 0);

        let utc = Utc::now().naive_utc();
        let offset = (utc - now).num_minutes();
        assert!((179..=181).contains(&offset), "offset was {offset} minutes");
    }

    #[test]
    fn fixed_clock_moves_on_request() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(61));
        assert_eq!(clock.now(), start + Duration::minutes(61));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
