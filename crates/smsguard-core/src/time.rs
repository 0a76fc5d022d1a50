//! Wall-clock abstraction for testability.
//!
//! Retention decisions compare stored instants against "now". Routing every
//! read of the current time through [`Clock`] lets tests move time forward
//! deterministically instead of sleeping.
//!
//! # Example
//!
//! ```
//! use smsguard_core::time::{Clock, MockClock};
//! use chrono::Duration;
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//!
//! clock.advance(Duration::days(3));
//!
//! assert_eq!(clock.now() - start, Duration::days(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// Abstraction over the wall clock.
///
/// In production, use [`SystemClock`] which delegates to `Utc::now()`.
/// In tests, use [`MockClock`] to control time deterministically.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock that uses real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A mock clock for testing time-dependent code.
///
/// The clock starts at a base instant and only moves when told to.
#[derive(Debug)]
pub struct MockClock {
    /// Base instant (when the clock was created).
    base: DateTime<Utc>,
    /// Offset from base in milliseconds.
    offset_millis: AtomicI64,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Creates a new mock clock starting at the current time, truncated to
    /// whole milliseconds.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self::starting_at(DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now))
    }

    /// Creates a mock clock starting at a fixed instant.
    #[must_use]
    pub const fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            offset_millis: AtomicI64::new(0),
        }
    }

    /// Creates a mock clock that can be shared across tasks.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances the clock by the given duration. Negative durations move it back.
    pub fn advance(&self, duration: Duration) {
        self.offset_millis
            .fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
    }

    /// Sets the clock to a specific offset from the base.
    pub fn set_offset(&self, offset: Duration) {
        self.offset_millis
            .store(offset.num_milliseconds(), Ordering::SeqCst);
    }

    /// Returns the current offset from the base time.
    #[must_use]
    pub fn offset(&self) -> Duration {
        Duration::milliseconds(self.offset_millis.load(Ordering::SeqCst))
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + self.offset()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        self.as_ref().now()
    }
}
