//! Air-data voting configuration
//!
//! Mirrors the module's tunable parameters. The orchestrator reloads this
//! from `CalibrationStorage::air_data_config` whenever the parameter store
//! reports an update, so a running system can be retuned without restart.
//!
//! ```rust
//! use airguard_core::AirDataConfig;
//!
//! let config = AirDataConfig::default()
//!     .with_publish_rate_hz(10.0)
//!     .with_qnh_hpa(1020.0);
//! assert!(config.validate().is_ok());
//! ```

use fugit::MicrosDurationU64;

use crate::{
    constants::{calibration::MAX_REFERENCE_EPV_M, physics::SEA_LEVEL_PRESSURE_HPA, timing},
    errors::{ConfigError, ConfigResult},
};

/// Lowest plausible altimeter setting (hPa)
const QNH_MIN_HPA: f32 = 500.0;

/// Highest plausible altimeter setting (hPa)
const QNH_MAX_HPA: f32 = 1500.0;

/// Tunable parameters of the air-data cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AirDataConfig {
    /// Fused output rate in Hz. Zero or negative disables publication.
    pub publish_rate_hz: f32,

    /// Sea-level reference pressure for altitude (hPa)
    pub qnh_hpa: f32,

    /// Enable absolute calibration against the GNSS altitude
    pub auto_calibration: bool,

    /// Voter data timeout (ms)
    pub sensor_timeout_ms: u32,

    /// Fixed reschedule delay between cycles (ms)
    pub cycle_interval_ms: u32,

    /// Reference samples with a worse vertical accuracy are rejected (m)
    pub max_reference_epv_m: f32,
}

impl Default for AirDataConfig {
    fn default() -> Self {
        Self {
            publish_rate_hz: 20.0,
            qnh_hpa: SEA_LEVEL_PRESSURE_HPA,
            auto_calibration: true,
            sensor_timeout_ms: timing::SENSOR_TIMEOUT.to_millis() as u32,
            cycle_interval_ms: timing::CYCLE_INTERVAL.to_millis() as u32,
            max_reference_epv_m: MAX_REFERENCE_EPV_M,
        }
    }
}

impl AirDataConfig {
    /// Set the publication rate
    pub fn with_publish_rate_hz(mut self, rate_hz: f32) -> Self {
        self.publish_rate_hz = rate_hz;
        self
    }

    /// Set the sea-level reference pressure
    pub fn with_qnh_hpa(mut self, qnh_hpa: f32) -> Self {
        self.qnh_hpa = qnh_hpa;
        self
    }

    /// Enable or disable absolute calibration
    pub fn with_auto_calibration(mut self, enabled: bool) -> Self {
        self.auto_calibration = enabled;
        self
    }

    /// Set the voter timeout
    pub fn with_sensor_timeout(mut self, timeout: MicrosDurationU64) -> Self {
        self.sensor_timeout_ms = timeout.to_millis() as u32;
        self
    }

    /// Set the cycle delay
    pub fn with_cycle_interval(mut self, interval: MicrosDurationU64) -> Self {
        self.cycle_interval_ms = interval.to_millis() as u32;
        self
    }

    /// Set the reference accuracy threshold
    pub fn with_max_reference_epv_m(mut self, epv_m: f32) -> Self {
        self.max_reference_epv_m = epv_m;
        self
    }

    /// Sea-level reference pressure in Pa
    pub fn qnh_pa(&self) -> f32 {
        self.qnh_hpa * crate::constants::physics::PA_PER_HPA
    }

    /// Voter timeout as a duration
    pub fn sensor_timeout(&self) -> MicrosDurationU64 {
        MicrosDurationU64::millis(self.sensor_timeout_ms as u64)
    }

    /// Cycle delay as a duration
    pub fn cycle_interval(&self) -> MicrosDurationU64 {
        MicrosDurationU64::millis(self.cycle_interval_ms as u64)
    }

    /// Minimum spacing between two publications, or `None` when disabled
    pub fn publish_interval(&self) -> Option<MicrosDurationU64> {
        if self.publish_rate_hz > 0.0 && self.publish_rate_hz.is_finite() {
            Some(MicrosDurationU64::micros((1e6 / self.publish_rate_hz) as u64))
        } else {
            None
        }
    }

    /// Check every field for a usable value
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.publish_rate_hz.is_finite() {
            return Err(ConfigError::NonFiniteValue { field: "publish_rate_hz" });
        }

        if !self.qnh_hpa.is_finite() {
            return Err(ConfigError::NonFiniteValue { field: "qnh_hpa" });
        }

        if self.qnh_hpa < QNH_MIN_HPA || self.qnh_hpa > QNH_MAX_HPA {
            return Err(ConfigError::OutOfRange {
                field: "qnh_hpa",
                value: self.qnh_hpa,
                min: QNH_MIN_HPA,
                max: QNH_MAX_HPA,
            });
        }

        if !self.max_reference_epv_m.is_finite() {
            return Err(ConfigError::NonFiniteValue { field: "max_reference_epv_m" });
        }

        if self.max_reference_epv_m <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "max_reference_epv_m",
                value: self.max_reference_epv_m,
                min: f32::MIN_POSITIVE,
                max: f32::MAX,
            });
        }

        if self.cycle_interval_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "cycle_interval_ms",
                value: 0.0,
                min: 1.0,
                max: u32::MAX as f32,
            });
        }

        Ok(())
    }
}
