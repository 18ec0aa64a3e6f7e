//! Redundant-Sensor Voter Interface
//!
//! The statistical voter that scores redundant instances (timeouts, error
//! density, signal confidence) lives outside this crate. The orchestrator
//! only needs a narrow contract: feed samples, ask for the best instance,
//! read per-instance health and priority, and observe failover events.
//!
//! ```text
//! put(slot, t, [p, T, h], errors, prio) ──► voter ──► best(now) = slot k
//!                                             │
//!                                             ├─► sensor_state(i) = ErrorFlags
//!                                             └─► failover_count() increments
//!                                                 on every switch away from
//!                                                 a faulty instance
//! ```

use core::fmt;

use fugit::MicrosDurationU64;

use crate::{calibration::Priority, time::Timestamp};

/// Number of values fed per sample: corrected pressure, temperature, altitude
pub const VOTED_VALUES: usize = 3;

/// Health flags reported by the voter
///
/// Bit values match the failover reason bitmask carried by operator events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorFlags(u32);

impl ErrorFlags {
    /// No data ever received
    pub const NO_DATA: Self = Self(1 << 0);
    /// Data stopped changing
    pub const STALE_DATA: Self = Self(1 << 1);
    /// No data within the timeout
    pub const TIMEOUT: Self = Self(1 << 2);
    /// Driver error counter too high
    pub const HIGH_ERRCOUNT: Self = Self(1 << 3);
    /// Too many errors per sample
    pub const HIGH_ERRDENSITY: Self = Self(1 << 4);

    /// Healthy
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every known flag
    pub const fn all() -> Self {
        Self(0b11111)
    }

    /// Build from raw bits, dropping unknown ones
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::all().0)
    }

    /// Raw bits
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// No flag set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// All bits of `other` set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Set the bits of `other`
    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl core::ops::BitOr for ErrorFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ErrorFlags {
    /// Operator-facing suffix list, e.g. `" OFF TIMEOUT"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ErrorFlags, &str); 5] = [
            (ErrorFlags::NO_DATA, " OFF"),
            (ErrorFlags::STALE_DATA, " STALE"),
            (ErrorFlags::TIMEOUT, " TIMEOUT"),
            (ErrorFlags::HIGH_ERRCOUNT, " ERR CNT"),
            (ErrorFlags::HIGH_ERRDENSITY, " ERR DNST"),
        ];

        for (flag, name) in NAMES {
            if self.contains(flag) {
                f.write_str(name)?;
            }
        }

        Ok(())
    }
}

/// Voter over redundant sensor instances
///
/// Slot indices are the orchestrator's stable slot indices. The first slot
/// exists from construction; every further slot must be registered with
/// [`add_new_validator`](Self::add_new_validator) before it is fed.
pub trait SensorVoter {
    /// Data timeout after which an instance is flagged
    fn set_timeout(&mut self, timeout: MicrosDurationU64);

    /// Register one more instance; `false` when capacity is exhausted
    fn add_new_validator(&mut self) -> bool;

    /// Feed one sample of `slot`
    fn put(
        &mut self,
        slot: usize,
        timestamp: Timestamp,
        values: &[f32; VOTED_VALUES],
        error_count: u32,
        priority: Priority,
    );

    /// Currently best instance, if any
    fn best(&mut self, now: Timestamp) -> Option<usize>;

    /// Health of `slot`
    fn sensor_state(&self, slot: usize) -> ErrorFlags;

    /// Priority the voter currently holds for `slot` (`0` if unknown)
    fn sensor_priority(&self, slot: usize) -> u8;

    /// Monotonic failover counter
    fn failover_count(&self) -> u32;

    /// Flags of the most recent failover
    fn failover_state(&self) -> ErrorFlags;

    /// Instance that failed in the most recent failover
    fn failover_index(&self) -> Option<usize>;
}
