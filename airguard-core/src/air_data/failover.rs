//! Failover reaction: operator alert plus priority floor

use crate::{
    calibration::{CalibrationStorage, Priority},
    constants::timing::FAILOVER_ALERT_INTERVAL,
    events::{AirDataSink, FailoverAlert},
    time::{elapsed_since, Timestamp},
    voter::SensorVoter,
};

use super::{AirDataVoter, MAX_SENSOR_COUNT};

impl<V: SensorVoter, S: CalibrationStorage> AirDataVoter<V, S> {
    /// React to a change of the voter's failover counter
    ///
    /// The failed slot drops to the minimum priority at once so it cannot
    /// win back selection; the alert itself is rate limited.
    pub(super) fn check_failover<K: AirDataSink>(&mut self, now: Timestamp, sink: &mut K) {
        let count = self.voter.failover_count();

        if count == self.last_failover_count {
            return;
        }

        let flags = self.voter.failover_state();
        let failed = self.voter.failover_index().filter(|&slot| slot < MAX_SENSOR_COUNT);

        if let (false, Some(slot)) = (flags.is_empty(), failed) {
            if elapsed_since(now, self.last_failover_alert, FAILOVER_ALERT_INTERVAL) {
                let alert = FailoverAlert::new(now, slot, flags);
                log_error!("{}", alert);
                sink.emergency(&alert);
                self.last_failover_alert = Some(now);
            }

            self.slots[slot].priority = Priority::MIN;
        }

        self.last_failover_count = count;
    }
}
