//! Wall-clock abstraction.
//!
//! Expiration checks compare against `Clock::now()` so tests can move time
//! around without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

pub const SECONDS_PER_DAY: i64 = 86400;

/// Source of the current time as unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Real time, backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Starts at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now())
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(days * SECONDS_PER_DAY);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Absolute expiration for a window of `days` starting at `base_time`.
pub fn expires_after_days(base_time: i64, days: i32) -> i64 {
    base_time + i64::from(days) * SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(5);
        assert_eq!(clock.now(), 1_005);
        clock.advance_days(1);
        assert_eq!(clock.now(), 1_005 + SECONDS_PER_DAY);
        clock.set(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn expiration_window_is_whole_days() {
        assert_eq!(expires_after_days(0, 7), 7 * SECONDS_PER_DAY);
        assert_eq!(expires_after_days(100, 1), 100 + SECONDS_PER_DAY);
    }
}
