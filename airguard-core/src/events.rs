//! Published Records and Operator Alerts
//!
//! ## Overview
//!
//! The cycle has no caller-visible return value; everything it decides is
//! observable through three outputs:
//!
//! 1. **`VehicleAirData`**: the fused, rate-limited measurement consumed by
//!    the estimator
//! 2. **`SensorsStatus`**: one diagnostic record per cycle with per-slot
//!    health, priority and inconsistency
//! 3. **`FailoverAlert`**: rate-limited emergency message plus a structured
//!    reason bitmask
//!
//! All three are plain `Copy`-friendly structs with a monotonic microsecond
//! timestamp; serialisation for a particular bus is the sink's concern.

use core::fmt::{self, Write};

use heapless::String;

use crate::{
    air_data::MAX_SENSOR_COUNT,
    calibration::DeviceId,
    time::Timestamp,
    voter::ErrorFlags,
};

/// Maximum length of an operator alert message
pub const ALERT_MESSAGE_LEN: usize = 64;

/// Where the published ambient temperature came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TemperatureSource {
    /// ISA default, no representative sensor
    Default = 0,
    /// Barometer mounted outside the enclosure
    ExternalBaro = 1,
    /// Differential-pressure (airspeed) sensor
    Airspeed = 2,
}

/// Fused air-data output
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleAirData {
    /// Publication time (µs)
    pub timestamp: Timestamp,
    /// Mean physical sample time of the averaged window (µs)
    pub timestamp_sample: Timestamp,
    /// Device that produced the data
    pub baro_device_id: DeviceId,
    /// Altitude above the QNH reference (m)
    pub baro_alt_meter: f32,
    /// Mean corrected static pressure (Pa)
    pub baro_pressure_pa: f32,
    /// Ambient air temperature (°C)
    pub ambient_temperature: f32,
    /// Origin of `ambient_temperature`
    pub temperature_source: TemperatureSource,
    /// Air density (kg/m³)
    pub rho: f32,
    /// Calibration revision of the producing device
    pub calibration_count: u8,
}

/// Per-cycle redundancy diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorsStatus {
    /// Publication time (µs)
    pub timestamp: Timestamp,
    /// Device of the selected slot
    pub device_id_primary: DeviceId,
    /// Bound device per slot
    pub device_ids: [DeviceId; MAX_SENSOR_COUNT],
    /// Smoothed deviation from the cross-instance mean; NaN when unbound
    pub inconsistency: [f32; MAX_SENSOR_COUNT],
    /// Voter reports no error
    pub healthy: [bool; MAX_SENSOR_COUNT],
    /// Voter-held priority
    pub priority: [u8; MAX_SENSOR_COUNT],
    /// Calibration enables the slot
    pub enabled: [bool; MAX_SENSOR_COUNT],
    /// Slot holds an external sensor
    pub external: [bool; MAX_SENSOR_COUNT],
}

impl Default for SensorsStatus {
    fn default() -> Self {
        Self {
            timestamp: 0,
            device_id_primary: DeviceId::NONE,
            device_ids: [DeviceId::NONE; MAX_SENSOR_COUNT],
            inconsistency: [f32::NAN; MAX_SENSOR_COUNT],
            healthy: [false; MAX_SENSOR_COUNT],
            priority: [0; MAX_SENSOR_COUNT],
            enabled: [false; MAX_SENSOR_COUNT],
            external: [false; MAX_SENSOR_COUNT],
        }
    }
}

/// Structured failover reason bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FailoverReason(u8);

impl FailoverReason {
    /// Instance never delivered data
    pub const NO_DATA: Self = Self(1 << 0);
    /// Instance data stopped changing
    pub const STALE_DATA: Self = Self(1 << 1);
    /// Instance timed out
    pub const TIMEOUT: Self = Self(1 << 2);
    /// Driver error counter too high
    pub const HIGH_ERROR_COUNT: Self = Self(1 << 3);
    /// Error density too high
    pub const HIGH_ERROR_DENSITY: Self = Self(1 << 4);

    /// Raw bitmask
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// All bits of `other` set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl From<ErrorFlags> for FailoverReason {
    fn from(flags: ErrorFlags) -> Self {
        const REASONS: [(ErrorFlags, FailoverReason); 5] = [
            (ErrorFlags::NO_DATA, FailoverReason::NO_DATA),
            (ErrorFlags::STALE_DATA, FailoverReason::STALE_DATA),
            (ErrorFlags::TIMEOUT, FailoverReason::TIMEOUT),
            (ErrorFlags::HIGH_ERRCOUNT, FailoverReason::HIGH_ERROR_COUNT),
            (ErrorFlags::HIGH_ERRDENSITY, FailoverReason::HIGH_ERROR_DENSITY),
        ];

        REASONS
            .iter()
            .filter(|(flag, _)| flags.contains(*flag))
            .fold(Self(0), |acc, (_, reason)| Self(acc.0 | reason.0))
    }
}

/// Emergency notification for a failed sensor instance
#[derive(Debug, Clone, PartialEq)]
pub struct FailoverAlert {
    /// Emission time (µs)
    pub timestamp: Timestamp,
    /// Failed slot
    pub slot: usize,
    /// Structured reason
    pub reason: FailoverReason,
    /// Human-readable text, e.g. `"Baro #1 failed: TIMEOUT!"`
    pub message: String<ALERT_MESSAGE_LEN>,
}

impl FailoverAlert {
    /// Build the alert for `slot` failing with `flags`
    pub fn new(timestamp: Timestamp, slot: usize, flags: ErrorFlags) -> Self {
        let mut message = String::new();
        // Truncation on overflow is acceptable for operator text
        let _ = write!(message, "Baro #{} failed:{}!", slot, flags);

        Self {
            timestamp,
            slot,
            reason: FailoverReason::from(flags),
            message,
        }
    }
}

impl fmt::Display for FailoverAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Consumer of everything the cycle emits
///
/// Implementations must not block: the cycle calls these inline.
pub trait AirDataSink {
    /// Fused measurement
    fn publish_air_data(&mut self, data: &VehicleAirData);

    /// Diagnostic status
    fn publish_status(&mut self, status: &SensorsStatus);

    /// Operator emergency alert
    fn emergency(&mut self, alert: &FailoverAlert);
}

/// Sink that keeps everything in memory
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    /// Published air data, oldest first
    pub air_data: std::vec::Vec<VehicleAirData>,
    /// Published status records, oldest first
    pub status: std::vec::Vec<SensorsStatus>,
    /// Emitted alerts, oldest first
    pub alerts: std::vec::Vec<FailoverAlert>,
}

#[cfg(feature = "std")]
impl RecordingSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.air_data.clear();
        self.status.clear();
        self.alerts.clear();
    }
}

#[cfg(feature = "std")]
impl AirDataSink for RecordingSink {
    fn publish_air_data(&mut self, data: &VehicleAirData) {
        self.air_data.push(*data);
    }

    fn publish_status(&mut self, status: &SensorsStatus) {
        self.status.push(*status);
    }

    fn emergency(&mut self, alert: &FailoverAlert) {
        self.alerts.push(alert.clone());
    }
}
