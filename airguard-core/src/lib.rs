//! Redundant air-data sensor voting for flight control
//!
//! Selects, calibrates and fails over among several barometers that feed one
//! logical pressure/altitude stream. Designed to run inside a fixed-period
//! control loop on small targets.
//!
//! Key constraints:
//! - Fixed slot arena, no heap allocation in the cycle
//! - Single-threaded cycle, runs to completion
//! - Collaborators (transport, voter, parameter storage, sinks) reached through traits
//!
//! ```no_run
//! use airguard_core::{AirDataConfig, AirDataVoter, MemoryCalibrationStore};
//! # use airguard_core::voter::{SensorVoter, ErrorFlags};
//! # use airguard_core::calibration::Priority;
//! # use airguard_core::time::Timestamp;
//! # struct MyVoter;
//! # impl SensorVoter for MyVoter {
//! #     fn set_timeout(&mut self, _: fugit::MicrosDurationU64) {}
//! #     fn add_new_validator(&mut self) -> bool { true }
//! #     fn put(&mut self, _: usize, _: Timestamp, _: &[f32; 3], _: u32, _: Priority) {}
//! #     fn best(&mut self, _: Timestamp) -> Option<usize> { None }
//! #     fn sensor_state(&self, _: usize) -> ErrorFlags { ErrorFlags::empty() }
//! #     fn sensor_priority(&self, _: usize) -> u8 { 0 }
//! #     fn failover_count(&self) -> u32 { 0 }
//! #     fn failover_state(&self) -> ErrorFlags { ErrorFlags::empty() }
//! #     fn failover_index(&self) -> Option<usize> { None }
//! # }
//!
//! let store = MemoryCalibrationStore::new(AirDataConfig::default());
//! let voter = AirDataVoter::new(MyVoter, store).unwrap();
//! // Call voter.run_cycle(now, &mut transport, &inputs, &mut sink) every 50 ms
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod air_data;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod filter;
pub mod physics;
pub mod solver;
pub mod time;
pub mod transport;
pub mod voter;

#[cfg(feature = "std")]
pub mod schedule;

// Public API
pub use air_data::{AirDataVoter, AirspeedTemperature, AuxiliaryInputs, CalibrationPhase, MAX_SENSOR_COUNT};
pub use calibration::{CalibrationStorage, DeviceId, MemoryCalibrationStore, Priority};
pub use config::AirDataConfig;
pub use errors::{ConfigError, StorageError, TransportError};
pub use events::{AirDataSink, FailoverAlert, SensorsStatus, TemperatureSource, VehicleAirData};
pub use solver::ReferenceSample;
pub use transport::{BaroSample, BaroTransport, QueuedTransport};
pub use voter::{ErrorFlags, SensorVoter};

#[cfg(feature = "std")]
pub use events::RecordingSink;
#[cfg(feature = "std")]
pub use schedule::{CycleRunner, StopHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
