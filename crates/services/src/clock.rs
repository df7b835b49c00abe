use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use bson::DateTime;

/// Source of wall-clock time for lifecycle timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        DateTime::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, at: DateTime) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_millis(secs * 1000);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime {
        DateTime::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Whole seconds from `from` to `to`, floored and never negative.
pub fn elapsed_secs(from: DateTime, to: DateTime) -> i64 {
    ((to.timestamp_millis() - from.timestamp_millis()) / 1000).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(DateTime::from_millis(10_000));
        clock.advance_secs(5);
        clock.advance_millis(250);
        assert_eq!(clock.now().timestamp_millis(), 15_250);
    }

    #[test]
    fn elapsed_is_floored_and_clamped() {
        let a = DateTime::from_millis(1_000);
        assert_eq!(elapsed_secs(a, DateTime::from_millis(3_999)), 2);
        assert_eq!(elapsed_secs(a, DateTime::from_millis(500)), 0);
    }
}
