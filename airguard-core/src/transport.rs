//! Driver Transport for Raw Barometer Samples
//!
//! ## Overview
//!
//! Drivers publish samples into one bounded queue per slot; the cycle is
//! the single consumer. The cycle drains at most [`BaroTransport::QUEUE_LENGTH`]
//! samples per slot and leaves the rest for the next cycle, so a producer
//! that outruns the consumer cannot stretch a cycle.
//!
//! ```text
//! driver ISR/thread          cycle (single consumer)
//!      │                          │
//!   publish ──► [ q q q q ] ──► poll_sample ×≤QUEUE_LENGTH
//!                  full: oldest sample dropped
//! ```
//!
//! `poll_sample` follows the `nb` convention: `WouldBlock` means "nothing
//! queued right now", never an error.

use core::cell::Cell;

use heapless::spsc::Queue;

use crate::{
    air_data::MAX_SENSOR_COUNT,
    calibration::DeviceId,
    errors::TransportError,
    time::Timestamp,
};

/// One raw barometer sample as published by a driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaroSample {
    /// Publication time (µs)
    pub timestamp: Timestamp,
    /// Time the physical measurement was taken (µs)
    pub timestamp_sample: Timestamp,
    /// Hardware identity of the producing sensor
    pub device_id: DeviceId,
    /// Sensor sits outside the autopilot enclosure
    pub external: bool,
    /// Static pressure (Pa)
    pub pressure_pa: f32,
    /// Sensor die temperature (°C)
    pub temperature_c: f32,
    /// Driver error counter
    pub error_count: u32,
}

/// Per-slot sample queues fed by drivers
pub trait BaroTransport {
    /// Maximum samples drained from one slot per cycle
    const QUEUE_LENGTH: usize;

    /// Whether a driver has ever published on `slot`
    fn advertised(&self, slot: usize) -> bool;

    /// Pop the oldest queued sample of `slot`
    fn poll_sample(&mut self, slot: usize) -> nb::Result<BaroSample, TransportError>;

    /// Request low-latency wake-up on new data for `slot`
    fn register_callback(&mut self, slot: usize);

    /// Cancel the wake-up request for `slot`
    fn unregister_callback(&mut self, slot: usize);
}

/// Backing queue size; holds `SAMPLE_QUEUE_SIZE - 1` samples
const SAMPLE_QUEUE_SIZE: usize = 8;

/// In-process transport with one bounded ring per slot
///
/// Used for simulation, replay and tests. A full ring drops its oldest
/// sample, as a driver queue would.
pub struct QueuedTransport {
    queues: [Queue<BaroSample, SAMPLE_QUEUE_SIZE>; MAX_SENSOR_COUNT],
    advertised: [bool; MAX_SENSOR_COUNT],
    callbacks: [bool; MAX_SENSOR_COUNT],
    advertise_checks: [Cell<u32>; MAX_SENSOR_COUNT],
    dropped: u32,
}

impl Default for QueuedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl QueuedTransport {
    /// Empty transport, nothing advertised
    pub fn new() -> Self {
        Self {
            queues: core::array::from_fn(|_| Queue::new()),
            advertised: [false; MAX_SENSOR_COUNT],
            callbacks: [false; MAX_SENSOR_COUNT],
            advertise_checks: core::array::from_fn(|_| Cell::new(0)),
            dropped: 0,
        }
    }

    /// Queue a sample from the driver of `slot`, advertising the slot
    pub fn publish(&mut self, slot: usize, sample: BaroSample) -> Result<(), TransportError> {
        let queue = self
            .queues
            .get_mut(slot)
            .ok_or(TransportError::InvalidSlot { slot })?;

        if queue.is_full() {
            queue.dequeue();
            self.dropped += 1;
        }

        // Cannot fail after making room
        let _ = queue.enqueue(sample);
        self.advertised[slot] = true;
        Ok(())
    }

    /// Samples waiting on `slot`
    pub fn pending(&self, slot: usize) -> usize {
        self.queues.get(slot).map_or(0, |q| q.len())
    }

    /// Whether a wake-up is registered for `slot`
    pub fn callback_registered(&self, slot: usize) -> bool {
        self.callbacks.get(slot).copied().unwrap_or(false)
    }

    /// How often `advertised` was queried for `slot`
    pub fn advertise_checks(&self, slot: usize) -> u32 {
        self.advertise_checks.get(slot).map_or(0, Cell::get)
    }

    /// Samples lost to full queues
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl BaroTransport for QueuedTransport {
    const QUEUE_LENGTH: usize = 4;

    fn advertised(&self, slot: usize) -> bool {
        match self.advertise_checks.get(slot) {
            Some(checks) => {
                checks.set(checks.get() + 1);
                self.advertised[slot]
            }
            None => false,
        }
    }

    fn poll_sample(&mut self, slot: usize) -> nb::Result<BaroSample, TransportError> {
        self.queues
            .get_mut(slot)
            .ok_or(nb::Error::Other(TransportError::InvalidSlot { slot }))?
            .dequeue()
            .ok_or(nb::Error::WouldBlock)
    }

    fn register_callback(&mut self, slot: usize) {
        if let Some(registered) = self.callbacks.get_mut(slot) {
            *registered = true;
        }
    }

    fn unregister_callback(&mut self, slot: usize) {
        if let Some(registered) = self.callbacks.get_mut(slot) {
            *registered = false;
        }
    }
}
