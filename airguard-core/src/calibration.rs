//! Per-Instance Sensor Calibration
//!
//! ## Overview
//!
//! Every sensor slot carries a calibration record: the hardware identity it
//! is bound to, a pressure offset, a configured priority and two flags. The
//! record is loaded from and saved to a `CalibrationStorage` keyed by device
//! identity, so a sensor keeps its calibration when it moves to another
//! slot and a hot-swapped sensor never inherits its predecessor's offset.
//!
//! ## Correction
//!
//! ```text
//! corrected = raw - thermal_offset - offset
//! ```
//!
//! Relative and absolute calibration both write `offset`; the thermal term
//! comes from an external temperature-compensation source.
//!
//! ## Priority
//!
//! The configured priority is `0..=100` where `0` disables the sensor. The
//! priority used for voting is a separate runtime value, always
//! `1..=100` (see [`Priority`]), which fault handling may lower without
//! touching the stored configuration.

use core::fmt;

use crate::{
    air_data::MAX_SENSOR_COUNT,
    config::AirDataConfig,
    constants::calibration::{
        DEFAULT_EXTERNAL_PRIORITY, DEFAULT_PRIORITY, PRIORITY_MAX, PRIORITY_MIN,
    },
    errors::{StorageError, StorageResult},
};

/// Opaque hardware identity reported by the driver
///
/// Zero means "no sensor bound".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// No sensor bound
    pub const NONE: Self = Self(0);

    /// Whether this is the unbound sentinel
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Raw identity value
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime voting priority, always within `[1, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    /// Floor: still enabled, never preferred over a healthy peer
    pub const MIN: Self = Self(PRIORITY_MIN);

    /// Ceiling
    pub const MAX: Self = Self(PRIORITY_MAX);

    /// Clamp any integer into the valid range
    pub fn new(value: i32) -> Self {
        Self(value.clamp(PRIORITY_MIN as i32, PRIORITY_MAX as i32) as u8)
    }

    /// Shift by `delta`, clamped
    pub fn offset_by(self, delta: i32) -> Self {
        Self::new(self.0 as i32 + delta)
    }

    /// Raw value
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(DEFAULT_PRIORITY)
    }
}

/// Calibration as persisted in storage
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredCalibration {
    /// Identity this entry belongs to
    pub device_id: DeviceId,
    /// Pressure offset (Pa)
    pub offset: f32,
    /// Configured priority, `0` disables the sensor
    pub priority: u8,
    /// Sensor sits outside the autopilot enclosure
    pub external: bool,
}

/// Persistence backend for calibration records and module parameters
///
/// Writes are fire-and-forget from the cycle's point of view: errors are
/// logged by the caller and never retried within the same cycle.
pub trait CalibrationStorage {
    /// Stored calibration for a device, if any
    fn find(&self, device_id: DeviceId) -> Option<StoredCalibration>;

    /// Persist a calibration, preferring the entry at `slot`
    fn save(&mut self, slot: usize, calibration: &StoredCalibration) -> StorageResult<()>;

    /// Signal that persisted parameters changed
    fn notify_changed(&mut self);

    /// Consume the "parameters changed" flag
    fn take_update(&mut self) -> bool;

    /// Current module configuration
    fn air_data_config(&self) -> AirDataConfig;
}

/// Runtime calibration of one slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorCalibration {
    device_id: DeviceId,
    external: bool,
    offset: f32,
    thermal_offset: f32,
    priority: u8,
    calibrated: bool,
    calibration_count: u8,
}

impl Default for SensorCalibration {
    fn default() -> Self {
        Self {
            device_id: DeviceId::NONE,
            external: false,
            offset: 0.0,
            thermal_offset: 0.0,
            priority: DEFAULT_PRIORITY,
            calibrated: false,
            calibration_count: 0,
        }
    }
}

impl SensorCalibration {
    /// Bound hardware identity
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Pressure offset (Pa)
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Thermal compensation offset (Pa)
    pub fn thermal_offset(&self) -> f32 {
        self.thermal_offset
    }

    /// Configured priority (`0` = disabled)
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Whether the sensor may vote
    pub fn enabled(&self) -> bool {
        self.priority > 0
    }

    /// Sensor sits outside the autopilot enclosure
    pub fn external(&self) -> bool {
        self.external
    }

    /// A stored record exists for the bound device
    pub fn calibrated(&self) -> bool {
        !self.device_id.is_none() && self.calibrated
    }

    /// Bumped on every change of the persisted calibration
    pub fn calibration_count(&self) -> u8 {
        self.calibration_count
    }

    /// Apply thermal and stored offsets to a raw pressure
    pub fn correct(&self, raw_pa: f32) -> f32 {
        raw_pa - self.thermal_offset - self.offset
    }

    /// Set the offset (not persisted until [`persist`](Self::persist))
    pub fn set_offset(&mut self, offset: f32) {
        if offset.is_finite() {
            self.offset = offset;
        }
    }

    /// Update thermal compensation
    pub fn set_thermal_offset(&mut self, thermal_offset: f32) {
        self.thermal_offset = if thermal_offset.is_finite() { thermal_offset } else { 0.0 };
    }

    /// Bind a (possibly new) device and load its stored calibration
    ///
    /// Returns whether the slot was rebound. The driver's `external` flag
    /// always wins over the stored one; a change of that flag alone keeps
    /// the binding.
    pub fn set_device_id<S: CalibrationStorage>(&mut self, device_id: DeviceId, external: bool, storage: &S) -> bool {
        self.external = external;

        if self.device_id == device_id {
            return false;
        }

        *self = Self {
            device_id,
            external,
            calibration_count: self.calibration_count,
            ..Self::default()
        };
        self.reload(storage);
        true
    }

    /// Reload the stored calibration for the bound device
    pub fn reload<S: CalibrationStorage>(&mut self, storage: &S) {
        if self.device_id.is_none() {
            return;
        }

        match storage.find(self.device_id) {
            Some(stored) => {
                let changed = !self.calibrated
                    || stored.offset != self.offset
                    || stored.priority != self.priority;

                self.offset = stored.offset;
                self.priority = stored.priority.min(PRIORITY_MAX);
                self.calibrated = true;

                if changed {
                    self.calibration_count = self.calibration_count.wrapping_add(1);
                }
            }
            None => {
                self.offset = 0.0;
                self.priority = if self.external { DEFAULT_EXTERNAL_PRIORITY } else { DEFAULT_PRIORITY };
                self.calibrated = false;
            }
        }
    }

    /// Snapshot for storage
    pub fn to_stored(&self) -> StoredCalibration {
        StoredCalibration {
            device_id: self.device_id,
            offset: self.offset,
            priority: self.priority,
            external: self.external,
        }
    }

    /// Write the current calibration to storage
    pub fn persist<S: CalibrationStorage>(&mut self, slot: usize, storage: &mut S) -> StorageResult<()> {
        if self.device_id.is_none() {
            return Err(StorageError::Rejected { reason: "no device bound" });
        }

        storage.save(slot, &self.to_stored())?;
        self.calibrated = true;
        self.calibration_count = self.calibration_count.wrapping_add(1);
        Ok(())
    }
}

impl fmt::Display for SensorCalibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Baro {} EN: {}, offset: {:.4}, {}",
            self.device_id,
            self.enabled() as u8,
            self.offset,
            if self.external { "external" } else { "internal" },
        )
    }
}

/// In-memory parameter store
///
/// One entry per slot. Any write raises the update flag so the next cycle
/// sees a parameter update, matching a real parameter backend.
#[derive(Debug, Clone)]
pub struct MemoryCalibrationStore {
    entries: [Option<StoredCalibration>; MAX_SENSOR_COUNT],
    config: AirDataConfig,
    updated: bool,
    notifications: u32,
}

impl MemoryCalibrationStore {
    /// Empty store with the given configuration
    pub fn new(config: AirDataConfig) -> Self {
        Self {
            entries: [None; MAX_SENSOR_COUNT],
            config,
            updated: false,
            notifications: 0,
        }
    }

    /// Pre-load an entry, as if configured by the operator
    pub fn with_entry(mut self, index: usize, calibration: StoredCalibration) -> Self {
        if let Some(entry) = self.entries.get_mut(index) {
            *entry = Some(calibration);
        }
        self
    }

    /// Edit an entry and flag a parameter update
    pub fn set_entry(&mut self, index: usize, calibration: StoredCalibration) -> StorageResult<()> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(StorageError::InvalidSlot { slot: index })?;
        *entry = Some(calibration);
        self.updated = true;
        Ok(())
    }

    /// Replace the configuration and flag a parameter update
    pub fn set_config(&mut self, config: AirDataConfig) {
        self.config = config;
        self.updated = true;
    }

    /// Stored entry at `index`
    pub fn entry(&self, index: usize) -> Option<StoredCalibration> {
        self.entries.get(index).copied().flatten()
    }

    /// Number of `notify_changed` calls so far
    pub fn notifications(&self) -> u32 {
        self.notifications
    }
}

impl CalibrationStorage for MemoryCalibrationStore {
    fn find(&self, device_id: DeviceId) -> Option<StoredCalibration> {
        if device_id.is_none() {
            return None;
        }

        self.entries
            .iter()
            .flatten()
            .find(|entry| entry.device_id == device_id)
            .copied()
    }

    fn save(&mut self, slot: usize, calibration: &StoredCalibration) -> StorageResult<()> {
        if slot >= MAX_SENSOR_COUNT {
            return Err(StorageError::InvalidSlot { slot });
        }

        // Same device keeps its entry, otherwise prefer the slot's own entry
        let index = self
            .entries
            .iter()
            .position(|e| matches!(e, Some(e) if e.device_id == calibration.device_id))
            .or_else(|| self.entries[slot].is_none().then_some(slot))
            .or_else(|| self.entries.iter().position(Option::is_none))
            .ok_or(StorageError::NoFreeSlot)?;

        self.entries[index] = Some(*calibration);
        Ok(())
    }

    fn notify_changed(&mut self) {
        self.notifications += 1;
        self.updated = true;
    }

    fn take_update(&mut self) -> bool {
        core::mem::take(&mut self.updated)
    }

    fn air_data_config(&self) -> AirDataConfig {
        self.config
    }
}
