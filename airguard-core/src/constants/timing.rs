//! Timing Constants
//!
//! Cadence and tolerance windows of the voting cycle. Staleness is judged by
//! comparing timestamps against these windows; nothing inside a cycle blocks
//! or times out.

use fugit::MicrosDurationU64;

/// Fixed delay between two cycles.
pub const CYCLE_INTERVAL: MicrosDurationU64 = MicrosDurationU64::millis(50);

/// Voter timeout handed to `SensorVoter::set_timeout`.
pub const SENSOR_TIMEOUT: MicrosDurationU64 = MicrosDurationU64::millis(300);

/// Minimum spacing between availability probes of an unadvertised slot.
pub const ADVERTISE_CHECK_INTERVAL: MicrosDurationU64 = MicrosDurationU64::secs(1);

/// Averaged sample timestamps older than this are never published.
pub const PUBLISH_STALENESS_LIMIT: MicrosDurationU64 = MicrosDurationU64::secs(1);

/// Operator failover alerts are emitted at most once per this window.
pub const FAILOVER_ALERT_INTERVAL: MicrosDurationU64 = MicrosDurationU64::secs(3);

/// Settle time after start-up before relative calibration may run.
pub const RELATIVE_CALIBRATION_SETTLE: MicrosDurationU64 = MicrosDurationU64::secs(1);

/// Airspeed-sensor temperature older than this is ignored.
pub const AIRSPEED_TEMPERATURE_MAX_AGE: MicrosDurationU64 = MicrosDurationU64::secs(1);

/// Convergence window of the absolute calibration filter.
///
/// The first checkpoint is taken after one window, the comparison after two.
pub const ABSOLUTE_CALIBRATION_WINDOW: MicrosDurationU64 = MicrosDurationU64::secs(2);
