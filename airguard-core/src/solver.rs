//! Absolute Calibration Against an External Altitude Reference
//!
//! ## Problem
//!
//! Relative calibration makes every barometer agree with the selected one,
//! but the whole pool may still carry a common bias. A GNSS fix provides an
//! independent altitude; this module finds the pressure offset that makes
//! the barometric altitude match it.
//!
//! ## Convergence Gate
//!
//! GNSS altitude is noisy and takes a while to settle after a fix, so the
//! delta between barometric and reference altitude is low-pass filtered
//! (τ = 2 s) before anything is trusted:
//!
//! ```text
//!  t0            t0+W               t0+2W
//!  │ filtering... │ checkpoint c1    │ |lpf - c1| ≤ 4 m ? stable : restart
//! ```
//!
//! A reference sample with vertical accuracy worse than the threshold
//! restarts the gate from scratch, as does a checkpoint mismatch.
//!
//! ## Offset Solve
//!
//! Pressure→altitude is monotonic but not linear, so the offset is found by
//! bounded bisection rather than by inverting the transform:
//!
//! ```text
//! find x in [-10000, 10000] Pa such that |f(p - x) - h_ref| ≤ 0.1 m
//! ```
//!
//! Bisection only needs `f(p - x)` to increase with `x`, which holds for any
//! transform where altitude falls as pressure rises.

use fugit::MicrosDurationU64;

use crate::{
    constants::{
        calibration::{
            DELTA_OFFSET_TOLERANCE_M, MAX_REFERENCE_EPV_M, OFFSET_SEARCH_BOUND_PA,
            OFFSET_SOLVE_MAX_ITERATIONS, OFFSET_SOLVE_TOLERANCE_M,
        },
        timing::ABSOLUTE_CALIBRATION_WINDOW,
    },
    filter::AlphaFilter,
    physics::altitude_from_pressure,
    time::Timestamp,
};

/// Bounds of the bisection search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetSearch {
    /// Half-width of the search interval around zero
    pub bound: f32,
    /// Accepted distance from the target
    pub tolerance: f32,
    /// Iteration cap
    pub max_iterations: u32,
}

impl Default for OffsetSearch {
    fn default() -> Self {
        Self {
            bound: OFFSET_SEARCH_BOUND_PA,
            tolerance: OFFSET_SOLVE_TOLERANCE_M,
            max_iterations: OFFSET_SOLVE_MAX_ITERATIONS,
        }
    }
}

/// Find `x` with `|forward(measured - x) - target| <= tolerance`
///
/// `forward(measured - x)` must increase with `x`. Returns `None` when the
/// target is outside the searchable range or the cap is reached first.
pub fn solve_offset<F>(measured: f32, target: f32, forward: F, search: &OffsetSearch) -> Option<f32>
where
    F: Fn(f32) -> f32,
{
    if !measured.is_finite() || !target.is_finite() {
        return None;
    }

    let mut low = -search.bound;
    let mut high = search.bound;

    for _ in 0..search.max_iterations {
        let mid = low + (high - low) / 2.0;
        let value = forward(measured - mid);

        if value > target + search.tolerance {
            high = mid;
        } else if value < target - search.tolerance {
            low = mid;
        } else {
            return Some(mid);
        }
    }

    None
}

/// One altitude fix from the independent reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceSample {
    /// Fix time (µs)
    pub timestamp: Timestamp,
    /// Altitude above mean sea level (m)
    pub altitude_msl_m: f32,
    /// Estimated vertical position error (m)
    pub epv_m: f32,
}

/// Filtered-delta convergence gate plus offset solve
#[derive(Debug, Clone)]
pub struct GnssAltitudeCalibration {
    filter: AlphaFilter,
    first_reference_at: Option<Timestamp>,
    filter_started_at: Option<Timestamp>,
    last_sample_at: Timestamp,
    checkpoint: Option<f32>,
    stable: bool,
    max_epv_m: f32,
    window: MicrosDurationU64,
    search: OffsetSearch,
}

impl Default for GnssAltitudeCalibration {
    fn default() -> Self {
        Self::new(MAX_REFERENCE_EPV_M)
    }
}

impl GnssAltitudeCalibration {
    /// Gate that rejects references with `epv` above `max_epv_m`
    pub fn new(max_epv_m: f32) -> Self {
        let window = ABSOLUTE_CALIBRATION_WINDOW;

        Self {
            filter: AlphaFilter::new(window.to_micros() as f32 * 1e-6),
            first_reference_at: None,
            filter_started_at: None,
            last_sample_at: 0,
            checkpoint: None,
            stable: false,
            max_epv_m,
            window,
            search: OffsetSearch::default(),
        }
    }

    /// Change the reference accuracy threshold
    pub fn set_max_epv(&mut self, max_epv_m: f32) {
        self.max_epv_m = max_epv_m;
    }

    /// Filtered barometric-minus-reference altitude (m)
    pub fn filtered_delta(&self) -> f32 {
        self.filter.state()
    }

    /// First convergence checkpoint, once taken
    pub fn checkpoint(&self) -> Option<f32> {
        self.checkpoint
    }

    /// Whether the last update found the delta stable
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// Drop all convergence state
    pub fn reset(&mut self) {
        self.first_reference_at = None;
        self.filter_started_at = None;
        self.last_sample_at = 0;
        self.checkpoint = None;
        self.stable = false;
    }

    /// Feed a reference fix using the standard atmosphere
    pub fn update(&mut self, reference: &ReferenceSample, measured_pa: f32, qnh_pa: f32) -> Option<f32> {
        self.update_with(reference, measured_pa, |p| altitude_from_pressure(p, qnh_pa))
    }

    /// Feed a reference fix; returns the offset once converged and solved
    ///
    /// The returned offset is meant to be added to every calibrated
    /// sensor's existing offset.
    pub fn update_with<F>(&mut self, reference: &ReferenceSample, measured: f32, forward: F) -> Option<f32>
    where
        F: Fn(f32) -> f32,
    {
        let target = reference.altitude_msl_m;
        let delta = forward(measured) - target;
        self.stable = false;

        if !delta.is_finite() {
            return None;
        }

        if reference.epv_m > self.max_epv_m || !reference.epv_m.is_finite() || self.first_reference_at.is_none() {
            // Reference not usable (yet): restart once it is
            self.reset();
            self.first_reference_at = Some(reference.timestamp);
            self.last_sample_at = reference.timestamp;
            return None;
        }

        let started_at = match self.filter_started_at {
            Some(started_at) => {
                let dt_s = reference.timestamp.saturating_sub(self.last_sample_at) as f32 * 1e-6;
                self.filter.update(delta, dt_s);
                started_at
            }
            None => {
                self.filter_started_at = Some(reference.timestamp);
                self.filter.reset(delta);
                reference.timestamp
            }
        };
        self.last_sample_at = reference.timestamp;

        let elapsed = reference.timestamp.saturating_sub(started_at);
        let window = self.window.to_micros();

        match self.checkpoint {
            None if elapsed > window => {
                self.checkpoint = Some(self.filter.state());
            }
            Some(checkpoint) if elapsed > 2 * window => {
                if libm::fabsf(self.filter.state() - checkpoint) > DELTA_OFFSET_TOLERANCE_M {
                    log_debug!("baro/gnss offset unstable, restarting convergence");
                    self.reset();
                } else {
                    self.stable = true;
                }
            }
            _ => {}
        }

        if !self.stable {
            return None;
        }

        let offset = solve_offset(measured, target, forward, &self.search);

        if offset.is_none() {
            log_debug!("baro/gnss offset solve did not converge, restarting");
            self.reset();
        }

        offset
    }
}
