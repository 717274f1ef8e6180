//! Mock implementations of environment traits.

use chrono::{DateTime, Duration, Utc};
use hype_queue_core::environment::Clock;
use std::sync::{Arc, Mutex};

/// Fixed clock for deterministic tests.
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use hype_queue_testing::FixedClock;
/// use hype_queue_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Manually advanceable clock for time-driven scenarios.
///
/// Clones share the same underlying instant, so a test can hold one handle
/// and advance time while the engine under test reads through another.
///
/// # Example
///
/// ```
/// use hype_queue_testing::{ManualClock, test_clock};
/// use hype_queue_core::environment::Clock;
/// use chrono::Duration;
///
/// let clock = ManualClock::new(test_clock().now());
/// let engine_handle = clock.clone();
/// clock.advance(Duration::seconds(45));
/// assert_eq!(engine_handle.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a new manual clock starting at the given time.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by the given duration.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (another test thread
    /// panicked while holding it).
    #[allow(clippy::unwrap_used)]
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap();
        *time += by;
    }

    /// Set the clock to an absolute instant.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn set(&self, to: DateTime<Utc>) {
        let mut time = self.time.lock().unwrap();
        *time = to;
    }
}

impl Clock for ManualClock {
    #[allow(clippy::unwrap_used)]
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap()
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC).
///
/// # Panics
///
/// Panics if the hardcoded timestamp fails to parse, which cannot happen.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_fixed() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_advances_shared_handles() {
        let clock = ManualClock::new(test_clock().now());
        let other = clock.clone();
        clock.advance(Duration::seconds(45));
        assert_eq!(other.now(), clock.now());
        assert_eq!(other.now() - test_clock().now(), Duration::seconds(45));
    }
}
