//! Time management for the air-data cycle
//!
//! All timestamps are monotonic microseconds since boot, matching the
//! high-resolution timer that stamps driver samples. Durations use
//! `fugit` so that constants read as `secs(1)` rather than bare integers.
//!
//! - `MonotonicClock` (std): process-relative monotonic time
//! - `FixedTime`: manually advanced clock for tests and replay

use fugit::MicrosDurationU64;

/// Timestamp in microseconds since boot
pub type Timestamp = u64;

/// Source of monotonic time for the cycle
pub trait TimeSource {
    /// Current timestamp in microseconds
    fn now(&self) -> Timestamp;
}

/// Monotonic time source backed by `std::time::Instant`
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Start a clock whose zero is the moment of construction
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        // Offset by one so that a valid timestamp is never zero
        self.origin.elapsed().as_micros() as Timestamp + 1
    }
}

/// Fixed time source for testing
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Create a clock frozen at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to an absolute timestamp
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Move the clock forward
    pub fn advance(&mut self, by: MicrosDurationU64) {
        self.timestamp += by.to_micros();
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

/// True once `now` is strictly later than `since + window`
///
/// An event that never happened (`None`) always counts as elapsed.
pub fn elapsed_since(now: Timestamp, since: Option<Timestamp>, window: MicrosDurationU64) -> bool {
    since.map_or(true, |since| now > since.saturating_add(window.to_micros()))
}
