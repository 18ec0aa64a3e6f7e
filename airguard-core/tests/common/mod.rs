//! Common fixtures for air-data integration tests
//!
//! This module provides:
//! - `PriorityVoter`: a small voter that times sensors out and prefers the
//!   highest healthy priority, enough to drive failover end to end
//! - `Bench`: orchestrator, transport, sink and clock wired together and
//!   stepped one cycle at a time

#![allow(dead_code)]

use airguard_core::{
    calibration::StoredCalibration,
    constants::timing::CYCLE_INTERVAL,
    time::{FixedTime, TimeSource, Timestamp},
    AirDataConfig, AirDataVoter, AuxiliaryInputs, BaroSample, DeviceId, ErrorFlags,
    MemoryCalibrationStore, Priority, QueuedTransport, RecordingSink, SensorVoter, MAX_SENSOR_COUNT,
};
use fugit::MicrosDurationU64;

/// Standard sea-level pressure (Pa)
pub const SEA_LEVEL_PA: f32 = 101_325.0;

/// Voter that picks the healthy slot with the highest priority
///
/// A slot is unhealthy when it never delivered data, when its last sample
/// is older than the timeout, or when a test forces flags on it. Losing the
/// current slot to an unhealthy state counts as a failover.
pub struct PriorityVoter {
    pub timeout_us: u64,
    pub validators: usize,
    last_put: [Option<Timestamp>; MAX_SENSOR_COUNT],
    pub last_values: [[f32; 3]; MAX_SENSOR_COUNT],
    priorities: [u8; MAX_SENSOR_COUNT],
    pub forced: [ErrorFlags; MAX_SENSOR_COUNT],
    now: Timestamp,
    current: Option<usize>,
    failover_count: u32,
    failover_state: ErrorFlags,
    failover_index: Option<usize>,
}

impl PriorityVoter {
    pub fn new() -> Self {
        Self {
            timeout_us: 0,
            validators: 1,
            last_put: [None; MAX_SENSOR_COUNT],
            last_values: [[f32::NAN; 3]; MAX_SENSOR_COUNT],
            priorities: [0; MAX_SENSOR_COUNT],
            forced: [ErrorFlags::empty(); MAX_SENSOR_COUNT],
            now: 0,
            current: None,
            failover_count: 0,
            failover_state: ErrorFlags::empty(),
            failover_index: None,
        }
    }

    fn state_at(&self, slot: usize, now: Timestamp) -> ErrorFlags {
        let mut flags = self.forced[slot];

        match self.last_put[slot] {
            None => flags.set(ErrorFlags::NO_DATA),
            Some(t) if now.saturating_sub(t) > self.timeout_us => flags.set(ErrorFlags::TIMEOUT),
            Some(_) => {}
        }

        flags
    }
}

impl SensorVoter for PriorityVoter {
    fn set_timeout(&mut self, timeout: MicrosDurationU64) {
        self.timeout_us = timeout.to_micros();
    }

    fn add_new_validator(&mut self) -> bool {
        if self.validators < MAX_SENSOR_COUNT {
            self.validators += 1;
            true
        } else {
            false
        }
    }

    fn put(&mut self, slot: usize, timestamp: Timestamp, values: &[f32; 3], _error_count: u32, priority: Priority) {
        self.last_put[slot] = Some(timestamp);
        self.last_values[slot] = *values;
        self.priorities[slot] = priority.get();
    }

    fn best(&mut self, now: Timestamp) -> Option<usize> {
        self.now = now;

        let best = (0..MAX_SENSOR_COUNT)
            .filter(|&slot| self.state_at(slot, now).is_empty())
            .max_by_key(|&slot| (self.priorities[slot], core::cmp::Reverse(slot)));

        if let (Some(current), Some(next)) = (self.current, best) {
            let state = self.state_at(current, now);

            if next != current && !state.is_empty() {
                self.failover_count += 1;
                self.failover_state = state;
                self.failover_index = Some(current);
            }
        }

        if best.is_some() {
            self.current = best;
        }

        self.current
    }

    fn sensor_state(&self, slot: usize) -> ErrorFlags {
        self.state_at(slot, self.now)
    }

    fn sensor_priority(&self, slot: usize) -> u8 {
        self.priorities[slot]
    }

    fn failover_count(&self) -> u32 {
        self.failover_count
    }

    fn failover_state(&self) -> ErrorFlags {
        self.failover_state
    }

    fn failover_index(&self) -> Option<usize> {
        self.failover_index
    }
}

/// Stored calibration for an internal sensor
pub fn stored(device: u32, offset: f32, priority: u8) -> StoredCalibration {
    StoredCalibration {
        device_id: DeviceId(device),
        offset,
        priority,
        external: false,
    }
}

/// Sample taken at `t`
pub fn sample(t: Timestamp, device: u32, pressure: f32) -> BaroSample {
    BaroSample {
        timestamp: t,
        timestamp_sample: t,
        device_id: DeviceId(device),
        external: false,
        pressure_pa: pressure,
        temperature_c: 20.0,
        error_count: 0,
    }
}

/// One reading per cycle: (slot, device, raw pressure)
pub type Reading = (usize, u32, f32);

/// Orchestrator plus simulated surroundings
pub struct Bench {
    pub air: AirDataVoter<PriorityVoter, MemoryCalibrationStore>,
    pub transport: QueuedTransport,
    pub sink: RecordingSink,
    pub clock: FixedTime,
}

impl Bench {
    pub fn new(store: MemoryCalibrationStore) -> Self {
        Self {
            air: AirDataVoter::new(PriorityVoter::new(), store).unwrap(),
            transport: QueuedTransport::new(),
            sink: RecordingSink::new(),
            clock: FixedTime::new(0),
        }
    }

    /// Calibrated sensors: (slot, device, offset, priority)
    pub fn with_sensors(config: AirDataConfig, sensors: &[(usize, u32, f32, u8)]) -> Self {
        let store = sensors
            .iter()
            .fold(MemoryCalibrationStore::new(config), |store, &(slot, device, offset, priority)| {
                store.with_entry(slot, stored(device, offset, priority))
            });

        Self::new(store)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Advance one cycle, deliver `readings` and run the cycle
    pub fn step(&mut self, readings: &[Reading]) {
        self.step_with(readings, &AuxiliaryInputs::none());
    }

    pub fn step_with(&mut self, readings: &[Reading], inputs: &AuxiliaryInputs) {
        self.clock.advance(CYCLE_INTERVAL);
        let now = self.clock.now();

        for &(slot, device, pressure) in readings {
            self.transport.publish(slot, sample(now, device, pressure)).unwrap();
        }

        self.air.run_cycle(now, &mut self.transport, inputs, &mut self.sink);
    }

    /// Repeat `step` until the clock reaches `until`
    pub fn run_until(&mut self, until: Timestamp, readings: &[Reading]) {
        while self.now() < until {
            self.step(readings);
        }
    }
}
