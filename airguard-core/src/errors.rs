//! Error Types for the Air-Data Voting Stack
//!
//! ## Design
//!
//! Errors follow the same embedded constraints as the rest of the crate:
//! small, `Copy`, and free of heap data (`&'static str` only). They are
//! returned from construction and collaborator surfaces. The periodic
//! cycle itself never returns an error: storage and transport failures are
//! logged and absorbed so that one bad collaborator cannot stall the loop.
//!
//! ## Categories
//!
//! - `ConfigError`: rejected configuration values
//! - `StorageError`: calibration persistence failures
//! - `TransportError`: driver queue failures for one slot

use thiserror_no_std::Error;

/// Result type for configuration checks
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for calibration persistence
pub type StorageResult<T> = Result<T, StorageError>;

/// Invalid configuration value
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Value is NaN or infinite
    #[error("{field} is not a finite number")]
    NonFiniteValue {
        /// Name of the offending field
        field: &'static str,
    },

    /// Value outside its permitted range
    #[error("{field} = {value} outside [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending field
        field: &'static str,
        /// Rejected value
        value: f32,
        /// Lowest accepted value
        min: f32,
        /// Highest accepted value
        max: f32,
    },
}

/// Calibration persistence failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// All calibration entries are bound to other devices
    #[error("No free calibration entry")]
    NoFreeSlot,

    /// Slot index beyond the sensor arena
    #[error("Invalid calibration slot {slot}")]
    InvalidSlot {
        /// Requested slot
        slot: usize,
    },

    /// Backend refused the write
    #[error("Calibration write rejected: {reason}")]
    Rejected {
        /// Backend-provided reason
        reason: &'static str,
    },
}

/// Driver queue failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Driver for the slot went away
    #[error("Sensor slot {slot} disconnected")]
    Disconnected {
        /// Affected slot
        slot: usize,
    },

    /// Slot index beyond the transport's range
    #[error("Invalid sensor slot {slot}")]
    InvalidSlot {
        /// Requested slot
        slot: usize,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NonFiniteValue { field } =>
                defmt::write!(fmt, "{} not finite", field),
            Self::OutOfRange { field, value, min, max } =>
                defmt::write!(fmt, "{} = {} outside [{}, {}]", field, value, min, max),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StorageError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NoFreeSlot => defmt::write!(fmt, "No free calibration entry"),
            Self::InvalidSlot { slot } => defmt::write!(fmt, "Invalid slot {}", slot),
            Self::Rejected { reason } => defmt::write!(fmt, "Rejected: {}", reason),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Disconnected { slot } => defmt::write!(fmt, "Slot {} disconnected", slot),
            Self::InvalidSlot { slot } => defmt::write!(fmt, "Invalid slot {}", slot),
        }
    }
}
