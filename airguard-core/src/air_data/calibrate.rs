//! In-flight offset calibration
//!
//! Two one-shot phases run in order:
//!
//! ```text
//!  NotStarted ──► InProgress ──(settle + data)──► Done      relative
//!                                                   │
//!  NotStarted ──► InProgress ──(gate converged)──► Done      absolute
//! ```
//!
//! The relative phase aligns every secondary sensor to the selected one after
//! a short settle time. The absolute phase then shifts all sensors together
//! so the selected altitude matches the reference altitude.
//!
//! New offsets take effect on the samples ingested in the next cycle; the
//! accumulators of the current cycle keep their old-offset values.

use crate::{
    calibration::CalibrationStorage,
    constants::timing::RELATIVE_CALIBRATION_SETTLE,
    solver::ReferenceSample,
    time::Timestamp,
    voter::SensorVoter,
};

use super::{AirDataVoter, MAX_SENSOR_COUNT};

/// Progress of a one-shot calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationPhase {
    /// Nothing observed yet
    #[default]
    NotStarted,
    /// Waiting for the precondition since `since`
    InProgress {
        /// First cycle of the phase (µs)
        since: Timestamp,
    },
    /// Offsets written; never runs again
    Done,
}

impl CalibrationPhase {
    /// Offsets were written
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Enter `InProgress` if not started; returns the start time
    fn start(&mut self, now: Timestamp) -> Option<Timestamp> {
        match *self {
            Self::NotStarted => {
                *self = Self::InProgress { since: now };
                Some(now)
            }
            Self::InProgress { since } => Some(since),
            Self::Done => None,
        }
    }
}

impl<V: SensorVoter, S: CalibrationStorage> AirDataVoter<V, S> {
    /// Advance whichever calibration phase is pending
    pub(super) fn update_calibrations(&mut self, now: Timestamp, reference: Option<&ReferenceSample>) {
        if !self.relative_calibration.is_done() {
            if self.relative_calibration_step(now) {
                self.relative_calibration = CalibrationPhase::Done;
            }
        } else if !self.absolute_calibration.is_done() && self.config.auto_calibration {
            if let Some(reference) = reference {
                self.absolute_calibration.start(now);

                if self.absolute_calibration_step(reference) {
                    self.absolute_calibration = CalibrationPhase::Done;
                }
            }
        }
    }

    fn relative_calibration_step(&mut self, now: Timestamp) -> bool {
        let Some(since) = self.relative_calibration.start(now) else {
            return false;
        };

        if now <= since.saturating_add(RELATIVE_CALIBRATION_SETTLE.to_micros()) {
            return false;
        }

        let Some(selected) = self.selected else {
            return false;
        };

        let Some(primary) = self.slots[selected].accumulator.mean_value() else {
            return false;
        };

        for slot in 0..MAX_SENSOR_COUNT {
            if slot == selected || !self.slots[slot].is_active() {
                continue;
            }

            let Some(mean) = self.slots[slot].accumulator.mean_value() else {
                continue;
            };

            let calibration = &mut self.slots[slot].calibration;
            let offset = mean - primary + calibration.offset();
            calibration.set_offset(offset);

            log_info!("baro {} relative offset {:.2} Pa", calibration.device_id(), offset);

            if let Err(_e) = calibration.persist(slot, &mut self.storage) {
                log_warn!("baro {} calibration not saved: {}", slot, _e);
            }

            self.storage.notify_changed();
        }

        true
    }

    fn absolute_calibration_step(&mut self, reference: &ReferenceSample) -> bool {
        let Some(selected) = self.selected else {
            return false;
        };

        let Some(measured) = self.slots[selected].accumulator.mean_value() else {
            return false;
        };

        let qnh_pa = self.config.qnh_pa();

        let Some(offset) = self.gnss_calibration.update(reference, measured, qnh_pa) else {
            return false;
        };

        log_info!("baro absolute offset {:.2} Pa", offset);

        for slot in 0..MAX_SENSOR_COUNT {
            let state = &mut self.slots[slot];

            if state.calibration.device_id().is_none() || state.accumulator.count() == 0 {
                continue;
            }

            let new_offset = state.calibration.offset() + offset;
            state.calibration.set_offset(new_offset);

            if let Err(_e) = state.calibration.persist(slot, &mut self.storage) {
                log_warn!("baro {} calibration not saved: {}", slot, _e);
            }

            self.storage.notify_changed();
        }

        true
    }
}
