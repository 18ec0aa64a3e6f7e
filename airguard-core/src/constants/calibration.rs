//! Calibration Constants

/// Lowest priority a sensor can hold while still enabled.
///
/// Fault downgrades drop to this floor instead of disabling the slot.
pub const PRIORITY_MIN: u8 = 1;

/// Highest configurable priority.
pub const PRIORITY_MAX: u8 = 100;

/// Priority assigned to an onboard sensor without stored calibration.
pub const DEFAULT_PRIORITY: u8 = 50;

/// Priority assigned to an external sensor without stored calibration.
pub const DEFAULT_EXTERNAL_PRIORITY: u8 = 75;

// ===== ABSOLUTE CALIBRATION =====

/// Filtered delta drift allowed between two convergence checkpoints (m).
pub const DELTA_OFFSET_TOLERANCE_M: f32 = 4.0;

/// Reference vertical accuracy required before filtering starts (m).
pub const MAX_REFERENCE_EPV_M: f32 = 8.0;

/// Half-width of the bisection search interval (Pa).
pub const OFFSET_SEARCH_BOUND_PA: f32 = 10_000.0;

/// Acceptance band around the target altitude (m).
pub const OFFSET_SOLVE_TOLERANCE_M: f32 = 0.1;

/// Bisection iteration cap.
pub const OFFSET_SOLVE_MAX_ITERATIONS: u32 = 100;
