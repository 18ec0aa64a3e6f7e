//! First-order low-pass filter parameterised by a time constant
//!
//! ```text
//! alpha  = dt / (tau + dt)
//! state += alpha × (sample - state)
//! ```
//!
//! `alpha` is recomputed from every sample's actual interval, so irregular
//! arrival does not change the effective time constant.

/// Exponential smoothing filter with a fixed time constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaFilter {
    time_constant_s: f32,
    state: f32,
}

impl AlphaFilter {
    /// Create a filter with time constant `tau` in seconds
    pub const fn new(time_constant_s: f32) -> Self {
        Self {
            time_constant_s,
            state: 0.0,
        }
    }

    /// Overwrite the state
    pub fn reset(&mut self, sample: f32) {
        self.state = sample;
    }

    /// Blend in a sample that arrived `dt_s` seconds after the previous one
    pub fn update(&mut self, sample: f32, dt_s: f32) -> f32 {
        if dt_s > 0.0 && dt_s.is_finite() && sample.is_finite() {
            let alpha = dt_s / (self.time_constant_s + dt_s);
            self.state += alpha * (sample - self.state);
        }

        self.state
    }

    /// Current filtered value
    pub fn state(&self) -> f32 {
        self.state
    }
}
