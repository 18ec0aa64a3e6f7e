//! Physical Constants for Air-Data Derivation
//!
//! Values follow the International Standard Atmosphere (ISA) troposphere
//! model used by flight-control altitude estimation.

/// Absolute zero in Celsius (°C).
///
/// Source: NIST Special Publication 330 (2019)
pub const ABSOLUTE_NULL_CELSIUS: f32 = -273.15;

/// Standard gravitational acceleration (m/s²).
pub const ONE_G: f32 = 9.80665;

/// Specific gas constant for dry air (J/(kg·K)).
pub const AIR_GAS_CONSTANT: f32 = 287.1;

/// ISA sea-level reference temperature (K).
pub const TEMP_REF_KELVIN: f32 = 15.0 - ABSOLUTE_NULL_CELSIUS;

/// ISA temperature gradient in the troposphere (K/m).
pub const TEMP_GRADIENT: f32 = -6.5 / 1000.0;

/// Standard atmospheric pressure at sea level (hPa).
///
/// Default QNH when no local altimeter setting is configured.
pub const SEA_LEVEL_PRESSURE_HPA: f32 = 1013.25;

/// Pascals per hectopascal.
pub const PA_PER_HPA: f32 = 100.0;

// ===== AMBIENT TEMPERATURE =====

/// Ambient temperature assumed when no representative source exists (°C).
///
/// Internal barometers sit next to warm electronics and do not measure
/// outside air, so ISA sea-level temperature is used instead.
pub const DEFAULT_TEMPERATURE_CELSIUS: f32 = 15.0;

/// Lower clamp for ambient temperature (°C).
pub const TEMPERATURE_MIN_CELSIUS: f32 = -60.0;

/// Upper clamp for ambient temperature (°C).
pub const TEMPERATURE_MAX_CELSIUS: f32 = 60.0;
