//! Per-slot state of the sensor arena

use crate::{
    calibration::{Priority, SensorCalibration},
    time::Timestamp,
};

/// Running sums that decimate the sensor rate down to the publish rate
///
/// Reset on every publish-interval boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    timestamp_sample_sum: u64,
    value_sum: f32,
    temperature_sum: f32,
    count: u32,
}

impl Accumulator {
    /// Add one corrected sample
    pub fn add(&mut self, timestamp_sample: Timestamp, value: f32, temperature: f32) {
        self.timestamp_sample_sum = self.timestamp_sample_sum.saturating_add(timestamp_sample);
        self.value_sum += value;
        self.temperature_sum += temperature;
        self.count += 1;
    }

    /// Samples since the last reset
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mean corrected value
    pub fn mean_value(&self) -> Option<f32> {
        (self.count > 0).then(|| self.value_sum / self.count as f32)
    }

    /// Mean secondary value (temperature)
    pub fn mean_temperature(&self) -> Option<f32> {
        (self.count > 0).then(|| self.temperature_sum / self.count as f32)
    }

    /// Mean physical sample time
    pub fn mean_timestamp_sample(&self) -> Option<Timestamp> {
        (self.count > 0).then(|| self.timestamp_sample_sum / self.count as u64)
    }

    /// Start a new window
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One redundant sensor position, stable for the process lifetime
#[derive(Debug, Clone)]
pub(crate) struct SensorSlot {
    pub calibration: SensorCalibration,
    /// Driver has published at least once; never cleared
    pub advertised: bool,
    /// First enabled sample has been handled
    pub registered: bool,
    /// Runtime voting priority
    pub priority: Priority,
    /// Last failed discovery probe
    pub last_advertise_check: Option<Timestamp>,
    pub last_publication: Timestamp,
    pub accumulator: Accumulator,
    /// Most recent corrected value, used for the inconsistency estimate
    pub last_value: Option<f32>,
    pub inconsistency: f32,
}

impl Default for SensorSlot {
    fn default() -> Self {
        Self {
            calibration: SensorCalibration::default(),
            advertised: false,
            registered: false,
            priority: Priority::default(),
            last_advertise_check: None,
            last_publication: 0,
            accumulator: Accumulator::default(),
            last_value: None,
            inconsistency: 0.0,
        }
    }
}

impl SensorSlot {
    /// Bound to a device and allowed to vote
    pub fn is_active(&self) -> bool {
        !self.calibration.device_id().is_none() && self.calibration.enabled()
    }
}
