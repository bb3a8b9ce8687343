//! # Pencilbook Testing
//!
//! Testing utilities for pencilbook reducers and services.
//!
//! This crate provides:
//! - [`TestClock`]: a settable clock for walking through hold lifetimes
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - [`init_test_tracing`]: opt-in log output for test runs
//!
//! ## Example
//!
//! ```
//! use chrono::Duration;
//! use pencilbook_core::environment::Clock;
//! use pencilbook_testing::test_clock;
//!
//! let clock = test_clock();
//! let start = clock.now();
//! clock.advance(Duration::hours(48));
//! assert_eq!(clock.now() - start, Duration::hours(48));
//! ```

use chrono::{DateTime, Duration, Utc};
use pencilbook_core::environment::Clock;
use std::sync::{Mutex, PoisonError};

mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

/// Clock whose time only moves when a test moves it.
///
/// Shared through `Arc<TestClock>`; every holder observes the same time, so a
/// test can create a hold, advance 47h59m, and run the expiry sweep against the
/// exact instant it intends to.
#[derive(Debug)]
pub struct TestClock {
    time: Mutex<DateTime<Utc>>,
}

impl TestClock {
    /// Create a new clock frozen at `time`.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Mutex::new(time),
        }
    }

    /// Move the clock forward (or backward, for a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += by;
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a test clock frozen at 2025-01-01 00:00:00 UTC.
#[must_use]
pub fn test_clock() -> TestClock {
    TestClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
}

/// Install a compact tracing subscriber for tests.
///
/// Honors `RUST_LOG`; safe to call from many tests since only the first
/// installation wins.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_new_year_2025() {
        assert_eq!(test_clock().now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn advance_and_set_move_time() {
        let clock = test_clock();
        let start = clock.now();

        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), start + Duration::minutes(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
