//! Redundancy diagnostics

use crate::{
    calibration::CalibrationStorage,
    events::{AirDataSink, SensorsStatus},
    time::Timestamp,
    voter::SensorVoter,
};

use super::{AirDataVoter, MAX_SENSOR_COUNT};

/// Weight of the previous inconsistency estimate
const INCONSISTENCY_RETAIN: f32 = 0.95;

impl<V: SensorVoter, S: CalibrationStorage> AirDataVoter<V, S> {
    /// Update inconsistency estimates and emit the status record
    ///
    /// Nothing is emitted until a slot has been selected.
    pub(super) fn update_status<K: AirDataSink>(&mut self, now: Timestamp, sink: &mut K) {
        let Some(selected) = self.selected else {
            return;
        };

        let mut mean = 0.0f32;
        let mut count = 0u32;

        for slot in self.slots.iter().filter(|s| s.is_active()) {
            if let Some(value) = slot.last_value {
                mean += value;
                count += 1;
            }
        }

        if count > 0 {
            mean /= count as f32;
        }

        let mut status = SensorsStatus {
            timestamp: now,
            device_id_primary: self.slots[selected].calibration.device_id(),
            ..SensorsStatus::default()
        };

        for i in 0..MAX_SENSOR_COUNT {
            let slot = &mut self.slots[i];
            let device_id = slot.calibration.device_id();

            if device_id.is_none() {
                continue;
            }

            if let Some(value) = slot.last_value {
                slot.inconsistency = INCONSISTENCY_RETAIN * slot.inconsistency
                    + (1.0 - INCONSISTENCY_RETAIN) * (value - mean);
            }

            status.device_ids[i] = device_id;
            status.inconsistency[i] = slot.inconsistency;
            status.healthy[i] = self.voter.sensor_state(i).is_empty();
            status.priority[i] = self.voter.sensor_priority(i);
            status.enabled[i] = slot.calibration.enabled();
            status.external[i] = slot.calibration.external();
        }

        sink.publish_status(&status);
    }
}
