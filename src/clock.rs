//! Time source and rounding helpers.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Timelike, Utc};

/// Supplies "now" to the lifecycle manager and sync engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

/// Rounds the seconds elapsed since midnight of `instant` to the nearest
/// multiple of `interval_secs` (half rounds up) and drops sub-second digits.
pub fn round_time(instant: DateTime<Utc>, interval_secs: u32) -> DateTime<Utc> {
    let truncated = instant.with_nanosecond(0).unwrap_or(instant);
    if interval_secs <= 1 {
        return truncated;
    }
    let interval = i64::from(interval_secs);
    let seconds = i64::from(truncated.num_seconds_from_midnight());
    let rounded = (2 * seconds + interval) / (2 * interval) * interval;
    truncated + Duration::seconds(rounded - seconds)
}

/// Rounds a duration to the nearest multiple of `interval_secs`, half up.
pub fn round_duration(duration: Duration, interval_secs: u32) -> Duration {
    let seconds = duration.num_seconds();
    if interval_secs <= 1 {
        return Duration::seconds(seconds);
    }
    let interval = i64::from(interval_secs);
    let sign = if seconds < 0 { -1 } else { 1 };
    let magnitude = seconds.abs();
    Duration::seconds(sign * ((2 * magnitude + interval) / (2 * interval) * interval))
}
