//! Wall-clock abstraction for testability
//!
//! Sync runs, lease checks and conflict horizons all read "now" through a
//! [`Clock`] so tests can pin time.
//!
//! ```
//! use cadence_common::time::{Clock, MockClock};
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let clock = MockClock::at(Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap());
//! clock.advance(Duration::minutes(30));
//! assert_eq!(clock.now(), Utc.with_ymd_and_hms(2025, 1, 6, 9, 30, 0).unwrap());
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self { current: Arc::new(Mutex::new(instant)) }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock() = instant;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
