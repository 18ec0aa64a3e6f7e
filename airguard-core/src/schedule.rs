//! Fixed-delay cycle runner for hosted targets
//!
//! Drives [`AirDataVoter::run_cycle`] with a constant sleep between cycles,
//! independent of whether new data arrived. Stopping is cooperative: raising
//! the [`StopHandle`] ends the loop at the next cycle boundary.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use fugit::MicrosDurationU64;

use crate::{
    air_data::{AirDataVoter, AuxiliaryInputs},
    calibration::CalibrationStorage,
    events::AirDataSink,
    time::{TimeSource, Timestamp},
    transport::BaroTransport,
    voter::SensorVoter,
};

/// Shared flag that ends a running [`CycleRunner`]
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request the runner to stop after the current cycle
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Runs the air-data cycle on a fixed delay
pub struct CycleRunner<C: TimeSource> {
    clock: C,
    interval: Duration,
    stop: StopHandle,
}

impl<C: TimeSource> CycleRunner<C> {
    /// Runner sleeping `interval` between cycles
    pub fn new(clock: C, interval: MicrosDurationU64) -> Self {
        Self {
            clock,
            interval: Duration::from_micros(interval.to_micros()),
            stop: StopHandle::default(),
        }
    }

    /// Handle that stops this runner from another thread or callback
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run a single cycle at the current time
    pub fn step<V, S, T, K>(
        &self,
        air: &mut AirDataVoter<V, S>,
        transport: &mut T,
        inputs: &AuxiliaryInputs,
        sink: &mut K,
    ) -> Timestamp
    where
        V: SensorVoter,
        S: CalibrationStorage,
        T: BaroTransport,
        K: AirDataSink,
    {
        let now = self.clock.now();
        air.run_cycle(now, transport, inputs, sink);
        now
    }

    /// Loop until stopped; returns the number of cycles run
    ///
    /// `inputs` is polled once per cycle for the auxiliary data. Callbacks
    /// are released on the transport when the loop ends.
    pub fn run<V, S, T, K, F>(
        &self,
        air: &mut AirDataVoter<V, S>,
        transport: &mut T,
        sink: &mut K,
        mut inputs: F,
    ) -> u64
    where
        V: SensorVoter,
        S: CalibrationStorage,
        T: BaroTransport,
        K: AirDataSink,
        F: FnMut(Timestamp) -> AuxiliaryInputs,
    {
        let mut cycles = 0;

        log_debug!("air data cycle started, interval {:?}", self.interval);

        while !self.stop.is_stopped() {
            let aux = inputs(self.clock.now());
            self.step(air, transport, &aux, sink);
            cycles += 1;

            thread::sleep(self.interval);
        }

        air.stop(transport);
        log_debug!("air data cycle stopped after {} cycles", cycles);

        cycles
    }
}
