//! Constants for AirGuard Core
//!
//! Centralised numeric values used by the voting cycle, grouped by domain:
//! - **Physics**: standard atmosphere and gas constants
//! - **Timing**: cadence, throttles, staleness and alert windows
//! - **Calibration**: priority bounds and absolute-calibration search limits
//!
//! Use these instead of magic numbers. Names carry their units.

/// Standard atmosphere and gas constants.
pub mod physics;

/// Cycle cadence, throttles and staleness budgets.
pub mod timing;

/// Priority bounds and calibration solver parameters.
pub mod calibration;

pub use physics::{
    ABSOLUTE_NULL_CELSIUS, AIR_GAS_CONSTANT, DEFAULT_TEMPERATURE_CELSIUS,
    SEA_LEVEL_PRESSURE_HPA, TEMPERATURE_MAX_CELSIUS, TEMPERATURE_MIN_CELSIUS,
};

pub use timing::{
    ADVERTISE_CHECK_INTERVAL, CYCLE_INTERVAL, FAILOVER_ALERT_INTERVAL,
    PUBLISH_STALENESS_LIMIT, RELATIVE_CALIBRATION_SETTLE, SENSOR_TIMEOUT,
};

pub use calibration::{
    DEFAULT_EXTERNAL_PRIORITY, DEFAULT_PRIORITY, PRIORITY_MAX, PRIORITY_MIN,
};
