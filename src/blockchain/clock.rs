use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use std::fmt::Debug;

/// Source of timestamps for blocks and transaction inputs
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock pinned at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        FixedClock {
            current: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `step`
    pub fn advance(&self, step: Duration) {
        let mut current = self.current.lock();
        *current = *current + step;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
