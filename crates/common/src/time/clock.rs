//! Wall-clock abstraction for testability
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use shiftsync_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now_utc();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!((clock.now_utc() - start).num_seconds(), 5);
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of wall-clock time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Milliseconds since the UNIX epoch.
    fn millis_since_epoch(&self) -> i64 {
        self.now_utc().timestamp_millis()
    }
}

/// Real system clock. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same underlying time, so a clock handed to the engine can
/// be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock starting at the current real time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a mock clock pinned to `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Advance the clock without waiting.
    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock();
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
