//! Redundant Air-Data Orchestration
//!
//! ## Overview
//!
//! `AirDataVoter` owns a fixed arena of sensor slots and runs one cycle per
//! control period. Every cycle walks the same pipeline:
//!
//! ```text
//!  storage ──► parameter reload
//!                   │
//!  transport ─► discovery ─► ingest (correct, vote, accumulate)
//!                                          │
//!                          ┌── selection ◄─┘
//!                          ▼
//!                 relative / absolute calibration
//!                          │
//!                          ▼
//!          publish (rate limited) ─► failover ─► status ─► sink
//! ```
//!
//! ## Timing
//!
//! - Undiscovered slots are probed at most once per second
//! - Up to `QUEUE_LENGTH` samples are drained per slot per cycle
//! - Output is decimated to the configured rate and dropped when the
//!   averaged sample time is more than one second old
//!
//! ## Parameter updates
//!
//! A cycle that reloads parameters skips the selection change and the
//! failover check, so a priority edit never triggers a switch or an alert
//! in the same cycle it is applied.
//!
//! ## Priorities
//!
//! Each slot keeps a runtime [`Priority`] separate from its configured one.
//! Failover and estimator faults lower the runtime value only; a later edit
//! of the configured value is applied as a delta unless the runtime value
//! was still equal to the old configured value.

use core::fmt;

use crate::{
    calibration::{CalibrationStorage, Priority, SensorCalibration},
    config::AirDataConfig,
    constants::{
        physics::{DEFAULT_TEMPERATURE_CELSIUS, TEMPERATURE_MAX_CELSIUS, TEMPERATURE_MIN_CELSIUS},
        timing::{ADVERTISE_CHECK_INTERVAL, AIRSPEED_TEMPERATURE_MAX_AGE, PUBLISH_STALENESS_LIMIT},
    },
    errors::ConfigResult,
    events::{AirDataSink, TemperatureSource, VehicleAirData},
    physics::{altitude_from_pressure, density_from_pressure_and_temp},
    solver::{GnssAltitudeCalibration, ReferenceSample},
    time::{elapsed_since, Timestamp},
    transport::{BaroSample, BaroTransport},
    voter::SensorVoter,
};

mod calibrate;
mod failover;
mod slot;
mod status;

pub use calibrate::CalibrationPhase;
pub use slot::Accumulator;

use slot::SensorSlot;

/// Number of sensor slots
pub const MAX_SENSOR_COUNT: usize = 4;

/// Temperature reported by the differential-pressure sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirspeedTemperature {
    /// Measurement time (µs)
    pub timestamp_sample: Timestamp,
    /// Air temperature (°C)
    pub temperature_c: f32,
}

/// Inputs from outside the barometer set, sampled once per cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AuxiliaryInputs {
    /// Estimator's barometer fault flag, when it published this cycle
    pub estimator_baro_fault: Option<bool>,
    /// Reference altitude fix, when one arrived this cycle
    pub reference: Option<ReferenceSample>,
    /// Latest airspeed sensor temperature, if any
    pub airspeed_temperature: Option<AirspeedTemperature>,
}

impl AuxiliaryInputs {
    /// No auxiliary data this cycle
    pub fn none() -> Self {
        Self::default()
    }

    /// Attach a reference fix
    pub fn with_reference(mut self, reference: ReferenceSample) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Attach the estimator fault flag
    pub fn with_estimator_fault(mut self, fault: bool) -> Self {
        self.estimator_baro_fault = Some(fault);
        self
    }

    /// Attach an airspeed temperature reading
    pub fn with_airspeed_temperature(mut self, timestamp_sample: Timestamp, temperature_c: f32) -> Self {
        self.airspeed_temperature = Some(AirspeedTemperature { timestamp_sample, temperature_c });
        self
    }
}

/// Voting, calibration and failover over redundant barometers
pub struct AirDataVoter<V: SensorVoter, S: CalibrationStorage> {
    config: AirDataConfig,
    voter: V,
    storage: S,
    slots: [SensorSlot; MAX_SENSOR_COUNT],
    selected: Option<usize>,
    // Validators the voter holds; the first exists from construction
    voter_capacity: usize,
    last_failover_count: u32,
    last_failover_alert: Option<Timestamp>,
    last_estimator_baro_fault: bool,
    relative_calibration: CalibrationPhase,
    absolute_calibration: CalibrationPhase,
    gnss_calibration: GnssAltitudeCalibration,
}

impl<V: SensorVoter, S: CalibrationStorage> AirDataVoter<V, S> {
    /// Create a voter using the configuration held by `storage`
    pub fn new(mut voter: V, storage: S) -> ConfigResult<Self> {
        let config = storage.air_data_config();
        config.validate()?;

        voter.set_timeout(config.sensor_timeout());

        Ok(Self {
            config,
            voter,
            storage,
            slots: core::array::from_fn(|_| SensorSlot::default()),
            selected: None,
            voter_capacity: 1,
            last_failover_count: 0,
            last_failover_alert: None,
            last_estimator_baro_fault: false,
            relative_calibration: CalibrationPhase::NotStarted,
            absolute_calibration: CalibrationPhase::NotStarted,
            gnss_calibration: GnssAltitudeCalibration::new(config.max_reference_epv_m),
        })
    }

    /// Run one control cycle
    pub fn run_cycle<T, K>(&mut self, now: Timestamp, transport: &mut T, inputs: &AuxiliaryInputs, sink: &mut K)
    where
        T: BaroTransport,
        K: AirDataSink,
    {
        let parameter_update = self.parameters_update(false);

        let mut updated = [false; MAX_SENSOR_COUNT];

        for slot in 0..MAX_SENSOR_COUNT {
            updated[slot] = self.ingest_slot(slot, now, transport, inputs);
        }

        if let Some(fault) = inputs.estimator_baro_fault {
            self.last_estimator_baro_fault = fault;
        }

        self.update_selection(now, parameter_update, transport);
        self.update_calibrations(now, inputs.reference.as_ref());
        self.publish(now, &updated, inputs, sink);

        if !parameter_update {
            self.check_failover(now, sink);
        }

        self.update_status(now, sink);
    }

    /// Cancel every data-arrival callback
    pub fn stop<T: BaroTransport>(&mut self, transport: &mut T) {
        for slot in 0..MAX_SENSOR_COUNT {
            transport.unregister_callback(slot);
        }
    }

    /// Feed an external thermal compensation term for `slot`
    pub fn set_thermal_offset(&mut self, slot: usize, thermal_offset_pa: f32) {
        if let Some(state) = self.slots.get_mut(slot) {
            state.calibration.set_thermal_offset(thermal_offset_pa);
        }
    }

    /// Currently selected slot
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Calibration of `slot`
    pub fn calibration(&self, slot: usize) -> Option<&SensorCalibration> {
        self.slots.get(slot).map(|s| &s.calibration)
    }

    /// Runtime voting priority of `slot`
    pub fn priority(&self, slot: usize) -> Option<Priority> {
        self.slots.get(slot).map(|s| s.priority)
    }

    /// Whether a driver was ever seen on `slot`
    pub fn advertised(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.advertised)
    }

    /// Smoothed deviation of `slot` from the cross-instance mean
    pub fn inconsistency(&self, slot: usize) -> Option<f32> {
        self.slots.get(slot).map(|s| s.inconsistency)
    }

    /// Accumulated window of `slot` since the last publish boundary
    pub fn accumulator(&self, slot: usize) -> Option<&Accumulator> {
        self.slots.get(slot).map(|s| &s.accumulator)
    }

    /// Relative calibration progress
    pub fn relative_calibration(&self) -> CalibrationPhase {
        self.relative_calibration
    }

    /// Absolute calibration progress
    pub fn absolute_calibration(&self) -> CalibrationPhase {
        self.absolute_calibration
    }

    /// Active configuration
    pub fn config(&self) -> &AirDataConfig {
        &self.config
    }

    /// Underlying voter
    pub fn voter(&self) -> &V {
        &self.voter
    }

    /// Underlying voter, mutably
    pub fn voter_mut(&mut self) -> &mut V {
        &mut self.voter
    }

    /// Parameter storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Parameter storage, mutably
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Reload configuration and calibrations when storage flags a change
    ///
    /// Returns whether a reload happened. A forced reload also consumes the
    /// pending change flag.
    fn parameters_update(&mut self, force: bool) -> bool {
        let changed = self.storage.take_update();

        if !changed && !force {
            return false;
        }

        let config = self.storage.air_data_config();

        match config.validate() {
            Ok(()) => {
                if config.sensor_timeout() != self.config.sensor_timeout() {
                    self.voter.set_timeout(config.sensor_timeout());
                }
                self.gnss_calibration.set_max_epv(config.max_reference_epv_m);
                self.config = config;
            }
            Err(_e) => {
                log_warn!("air data config rejected: {}", _e);
            }
        }

        for state in self.slots.iter_mut() {
            let old = state.calibration.priority();
            state.calibration.reload(&self.storage);
            let new = state.calibration.priority();

            if old != new {
                state.priority = if state.priority.get() == old {
                    Priority::new(new as i32)
                } else {
                    state.priority.offset_by(new as i32 - old as i32)
                };
            }
        }

        true
    }

    /// Discover and drain one slot; returns whether any sample was taken
    fn ingest_slot<T: BaroTransport>(
        &mut self,
        slot: usize,
        now: Timestamp,
        transport: &mut T,
        inputs: &AuxiliaryInputs,
    ) -> bool {
        if !self.slots[slot].advertised {
            if !elapsed_since(now, self.slots[slot].last_advertise_check, ADVERTISE_CHECK_INTERVAL) {
                return false;
            }

            if !transport.advertised(slot) {
                self.slots[slot].last_advertise_check = Some(now);
                return false;
            }

            log_debug!("baro {} advertised", slot);
            self.slots[slot].advertised = true;
        }

        let mut updated = false;

        for _ in 0..T::QUEUE_LENGTH {
            let sample = match transport.poll_sample(slot) {
                Ok(sample) => sample,
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_e)) => {
                    log_warn!("baro {} read failed: {}", slot, _e);
                    break;
                }
            };

            if sample.device_id.is_none() {
                continue;
            }

            let state = &mut self.slots[slot];

            if state.calibration.set_device_id(sample.device_id, sample.external, &self.storage) {
                state.priority = Priority::new(state.calibration.priority() as i32);
            }

            if !state.calibration.enabled() {
                continue;
            }

            if !state.registered {
                self.register_sensor(slot, transport);
            }

            if inputs.estimator_baro_fault == Some(true)
                && !self.last_estimator_baro_fault
                && self.selected == Some(slot)
            {
                log_warn!("baro {} flagged by estimator", slot);
                self.slots[slot].priority = Priority::MIN;
            }

            self.ingest_sample(slot, &sample);
            updated = true;
        }

        updated
    }

    /// One-time setup on the first enabled sample of a slot
    fn register_sensor<T: BaroTransport>(&mut self, slot: usize, transport: &mut T) {
        while self.voter_capacity <= slot {
            if !self.voter.add_new_validator() {
                log_error!("failed to add validator for baro {}", slot);
                break;
            }
            self.voter_capacity += 1;
        }

        if self.selected.is_none() {
            transport.register_callback(slot);
        }

        let state = &mut self.slots[slot];

        if !state.calibration.calibrated() {
            if let Err(_e) = state.calibration.persist(slot, &mut self.storage) {
                log_warn!("baro {} calibration not saved: {}", slot, _e);
            }
            self.storage.notify_changed();
        }

        state.registered = true;

        self.parameters_update(true);
    }

    fn ingest_sample(&mut self, slot: usize, sample: &BaroSample) {
        let state = &mut self.slots[slot];
        let pressure = state.calibration.correct(sample.pressure_pa);

        if !pressure.is_finite() {
            return;
        }

        let altitude = altitude_from_pressure(pressure, self.config.qnh_pa());
        let values = [pressure, sample.temperature_c, altitude];

        if slot < self.voter_capacity {
            self.voter.put(slot, sample.timestamp, &values, sample.error_count, state.priority);
        }

        state.accumulator.add(sample.timestamp_sample, pressure, sample.temperature_c);
        state.last_value = Some(pressure);
    }

    fn update_selection<T: BaroTransport>(&mut self, now: Timestamp, parameter_update: bool, transport: &mut T) {
        let best = self
            .voter
            .best(now)
            .filter(|&slot| slot < MAX_SENSOR_COUNT && !self.slots[slot].calibration.device_id().is_none());

        let Some(best) = best else {
            return;
        };

        if self.selected == Some(best) || parameter_update {
            return;
        }

        for slot in 0..MAX_SENSOR_COUNT {
            transport.unregister_callback(slot);
        }

        if let Some(_previous) = self.selected {
            log_info!("baro switch from #{} -> #{}", _previous, best);
        }

        self.selected = Some(best);
        transport.register_callback(best);
    }

    /// Emit decimated output for the selected slot
    fn publish<K: AirDataSink>(
        &mut self,
        now: Timestamp,
        updated: &[bool; MAX_SENSOR_COUNT],
        inputs: &AuxiliaryInputs,
        sink: &mut K,
    ) {
        let Some(interval) = self.config.publish_interval() else {
            return;
        };

        let qnh_pa = self.config.qnh_pa();

        for slot in 0..MAX_SENSOR_COUNT {
            let state = &self.slots[slot];

            if !updated[slot] {
                continue;
            }

            let (Some(pressure), Some(temperature), Some(timestamp_sample)) = (
                state.accumulator.mean_value(),
                state.accumulator.mean_temperature(),
                state.accumulator.mean_timestamp_sample(),
            ) else {
                continue;
            };

            if now < state.last_publication.saturating_add(interval.to_micros()) {
                continue;
            }

            let fresh = now <= timestamp_sample.saturating_add(PUBLISH_STALENESS_LIMIT.to_micros());
            let healthy = self.voter.sensor_state(slot).is_empty();

            if fresh && healthy && self.selected == Some(slot) {
                let source = if state.calibration.external() {
                    TemperatureSource::ExternalBaro
                } else {
                    TemperatureSource::Default
                };

                let (ambient_temperature, temperature_source) =
                    ambient_temperature(now, temperature, source, inputs);

                let data = VehicleAirData {
                    timestamp: now,
                    timestamp_sample,
                    baro_device_id: state.calibration.device_id(),
                    baro_alt_meter: altitude_from_pressure(pressure, qnh_pa),
                    baro_pressure_pa: pressure,
                    ambient_temperature,
                    temperature_source,
                    rho: density_from_pressure_and_temp(pressure, ambient_temperature),
                    calibration_count: state.calibration.calibration_count(),
                };

                sink.publish_air_data(&data);
            }

            let state = &mut self.slots[slot];
            state.last_publication = now;
            state.accumulator.reset();
        }
    }
}

/// Pick the best available ambient temperature
///
/// Fallback order: a fresh airspeed reading, the external barometer, then the
/// standard-atmosphere default. The result is clamped to a plausible range.
fn ambient_temperature(
    now: Timestamp,
    baro_temperature: f32,
    source: TemperatureSource,
    inputs: &AuxiliaryInputs,
) -> (f32, TemperatureSource) {
    let (mut temperature, mut source) = match source {
        TemperatureSource::ExternalBaro if baro_temperature.is_finite() => (baro_temperature, source),
        _ => (DEFAULT_TEMPERATURE_CELSIUS, TemperatureSource::Default),
    };

    if let Some(airspeed) = inputs.airspeed_temperature {
        let fresh = airspeed.timestamp_sample <= now
            && now - airspeed.timestamp_sample < AIRSPEED_TEMPERATURE_MAX_AGE.to_micros();

        if fresh && airspeed.temperature_c.is_finite() {
            temperature = airspeed.temperature_c;
            source = TemperatureSource::Airspeed;
        }
    }

    (temperature.clamp(TEMPERATURE_MIN_CELSIUS, TEMPERATURE_MAX_CELSIUS), source)
}

impl<V: SensorVoter, S: CalibrationStorage> fmt::Display for AirDataVoter<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(selected) = self.selected {
            writeln!(
                f,
                "selected barometer: {} ({})",
                self.slots[selected].calibration.device_id(),
                selected
            )?;
        }

        for (i, slot) in self.slots.iter().enumerate().filter(|(_, s)| s.advertised) {
            writeln!(f, "#{} priority {}: {}", i, slot.priority.get(), slot.calibration)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
