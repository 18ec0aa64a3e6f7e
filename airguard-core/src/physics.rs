//! Standard Atmosphere Transforms
//!
//! Pure functions relating static pressure, altitude, temperature and air
//! density in the ISA troposphere. They hold no state and are safe to call
//! from anywhere in the cycle.
//!
//! ## Altitude from Pressure
//!
//! The hypsometric equation with a linear temperature gradient:
//!
//! ```text
//! h = T₀ × ((P/P₀)^(-L×R/g) - 1) / L
//!
//! Where:
//! - T₀ = 288.15 K (ISA sea-level temperature)
//! - L  = -0.0065 K/m (temperature gradient)
//! - R  = 287.1 J/(kg·K) (dry-air gas constant)
//! - g  = 9.80665 m/s²
//! - P₀ = QNH (sea-level reference pressure)
//! ```
//!
//! The relation is monotonic: lower pressure always means higher altitude.
//! The absolute calibration solver relies on that, not on the exact shape.
//!
//! `libm::powf` keeps this usable without `std`.

use crate::constants::physics::{
    ABSOLUTE_NULL_CELSIUS, AIR_GAS_CONSTANT, ONE_G, TEMP_GRADIENT, TEMP_REF_KELVIN,
};

/// Altitude above the reference level (m) for a static pressure (Pa)
pub fn altitude_from_pressure(pressure_pa: f32, pressure_sealevel_pa: f32) -> f32 {
    let pressure_ratio = pressure_pa / pressure_sealevel_pa;
    let exponent = -(TEMP_GRADIENT * AIR_GAS_CONSTANT) / ONE_G;

    ((libm::powf(pressure_ratio, exponent) * TEMP_REF_KELVIN) - TEMP_REF_KELVIN) / TEMP_GRADIENT
}

/// Air density (kg/m³) from static pressure (Pa) and temperature (°C)
pub fn density_from_pressure_and_temp(pressure_pa: f32, temperature_celsius: f32) -> f32 {
    pressure_pa / (AIR_GAS_CONSTANT * (temperature_celsius - ABSOLUTE_NULL_CELSIUS))
}
