use fugit::MicrosDurationU64;

use super::*;
use crate::{
    calibration::{DeviceId, MemoryCalibrationStore, StoredCalibration},
    events::RecordingSink,
    transport::QueuedTransport,
    voter::ErrorFlags,
};

const MS: Timestamp = 1_000;

/// Voter double: selection and failover are scripted by the test
struct ScriptedVoter {
    timeout: Option<MicrosDurationU64>,
    validators: usize,
    validator_limit: usize,
    puts: Vec<(usize, [f32; 3], Priority)>,
    best: Option<usize>,
    states: [ErrorFlags; MAX_SENSOR_COUNT],
    failover_count: u32,
    failover_state: ErrorFlags,
    failover_index: Option<usize>,
}

impl ScriptedVoter {
    fn new() -> Self {
        Self {
            timeout: None,
            validators: 1,
            validator_limit: MAX_SENSOR_COUNT,
            puts: Vec::new(),
            best: None,
            states: [ErrorFlags::empty(); MAX_SENSOR_COUNT],
            failover_count: 0,
            failover_state: ErrorFlags::empty(),
            failover_index: None,
        }
    }

    fn puts_for(&self, slot: usize) -> usize {
        self.puts.iter().filter(|(s, ..)| *s == slot).count()
    }

    fn fail(&mut self, slot: usize, flags: ErrorFlags) {
        self.failover_count += 1;
        self.failover_state = flags;
        self.failover_index = Some(slot);
        self.states[slot] = flags;
    }
}

impl SensorVoter for ScriptedVoter {
    fn set_timeout(&mut self, timeout: MicrosDurationU64) {
        self.timeout = Some(timeout);
    }

    fn add_new_validator(&mut self) -> bool {
        if self.validators < self.validator_limit {
            self.validators += 1;
            true
        } else {
            false
        }
    }

    fn put(&mut self, slot: usize, _timestamp: Timestamp, values: &[f32; 3], _error_count: u32, priority: Priority) {
        self.puts.push((slot, *values, priority));
    }

    fn best(&mut self, _now: Timestamp) -> Option<usize> {
        self.best
    }

    fn sensor_state(&self, slot: usize) -> ErrorFlags {
        self.states[slot]
    }

    fn sensor_priority(&self, slot: usize) -> u8 {
        self.puts
            .iter()
            .rev()
            .find(|(s, ..)| *s == slot)
            .map_or(0, |(_, _, p)| p.get())
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

type Voter = AirDataVoter<ScriptedVoter, MemoryCalibrationStore>;

fn stored(device: u32, offset: f32, priority: u8) -> StoredCalibration {
    StoredCalibration {
        device_id: DeviceId(device),
        offset,
        priority,
        external: false,
    }
}

fn sample(t: Timestamp, device: u32, pressure: f32) -> BaroSample {
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

/// Two pre-calibrated sensors on slots 0 and 1
fn two_sensor_setup(config: AirDataConfig) -> (Voter, QueuedTransport, RecordingSink) {
    let store = MemoryCalibrationStore::new(config)
        .with_entry(0, stored(1, 0.0, 50))
        .with_entry(1, stored(2, 0.0, 50));

    let mut voter = ScriptedVoter::new();
    voter.best = Some(0);

    (
        AirDataVoter::new(voter, store).unwrap(),
        QueuedTransport::new(),
        RecordingSink::new(),
    )
}

fn cycle(air: &mut Voter, transport: &mut QueuedTransport, sink: &mut RecordingSink, t: Timestamp) {
    air.run_cycle(t, transport, &AuxiliaryInputs::none(), sink);
}

fn feed(transport: &mut QueuedTransport, t: Timestamp, pressures: &[(usize, u32, f32)]) {
    for &(slot, device, pressure) in pressures {
        transport.publish(slot, sample(t, device, pressure)).unwrap();
    }
}

#[test]
fn construction_applies_timeout_and_rejects_bad_config() {
    let (air, _, _) = two_sensor_setup(AirDataConfig::default());
    assert_eq!(air.voter().timeout, Some(AirDataConfig::default().sensor_timeout()));

    let store = MemoryCalibrationStore::new(AirDataConfig::default().with_qnh_hpa(f32::NAN));
    assert!(AirDataVoter::new(ScriptedVoter::new(), store).is_err());
}

#[test]
fn discovery_is_throttled() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    for k in 1..=20 {
        cycle(&mut air, &mut transport, &mut sink, k * 50 * MS);
    }

    assert_eq!(transport.advertise_checks(0), 1);
    assert!(!air.advertised(0));

    cycle(&mut air, &mut transport, &mut sink, 1_100 * MS);
    assert_eq!(transport.advertise_checks(0), 2);
}

#[test]
fn discovery_probe_at_time_zero_is_throttled() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    cycle(&mut air, &mut transport, &mut sink, 0);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);
    cycle(&mut air, &mut transport, &mut sink, 1_000 * MS);
    assert_eq!(transport.advertise_checks(0), 1);

    cycle(&mut air, &mut transport, &mut sink, 1_050 * MS);
    assert_eq!(transport.advertise_checks(0), 2);
}

#[test]
fn first_sample_binds_and_selects() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 50 * MS, &[(0, 1, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    assert!(air.advertised(0));
    assert_eq!(air.selected(), Some(0));
    assert_eq!(air.calibration(0).unwrap().device_id(), DeviceId(1));
    assert!(transport.callback_registered(0));
    assert_eq!(air.voter().puts_for(0), 1);

    assert_eq!(sink.air_data.len(), 1);
    assert_eq!(sink.air_data[0].baro_pressure_pa, 100_000.0);
    assert_eq!(sink.status.len(), 1);
    assert_eq!(sink.status[0].device_id_primary, DeviceId(1));
}

#[test]
fn uncalibrated_sensor_is_persisted_with_default_priority() {
    let store = MemoryCalibrationStore::new(AirDataConfig::default());
    let mut air = AirDataVoter::new(ScriptedVoter::new(), store).unwrap();
    let mut transport = QueuedTransport::new();
    let mut sink = RecordingSink::new();

    feed(&mut transport, 50 * MS, &[(2, 7, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    let entry = air.storage().entry(2).unwrap();
    assert_eq!(entry.device_id, DeviceId(7));
    assert_eq!(entry.priority, 50);
    assert_eq!(air.storage().notifications(), 1);
    assert!(air.calibration(2).unwrap().calibrated());

    // Slots 1 and 2 need their own validators
    assert_eq!(air.voter().validators, 3);
    assert!(transport.callback_registered(2));

    // Nothing selected, so nothing published
    assert!(sink.air_data.is_empty());
    assert!(sink.status.is_empty());
}

#[test]
fn validator_exhaustion_skips_voting() {
    let config = AirDataConfig::default().with_publish_rate_hz(0.0);
    let store = MemoryCalibrationStore::new(config).with_entry(1, stored(2, 0.0, 50));
    let mut voter = ScriptedVoter::new();
    voter.validator_limit = 1;

    let mut air = AirDataVoter::new(voter, store).unwrap();
    let mut transport = QueuedTransport::new();
    let mut sink = RecordingSink::new();

    feed(&mut transport, 50 * MS, &[(1, 2, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    assert_eq!(air.voter().puts_for(1), 0);
    assert_eq!(air.accumulator(1).unwrap().count(), 1);
}

#[test]
fn zero_device_and_disabled_samples_never_vote() {
    let store = MemoryCalibrationStore::new(AirDataConfig::default()).with_entry(1, stored(2, 0.0, 0));
    let mut air = AirDataVoter::new(ScriptedVoter::new(), store).unwrap();
    let mut transport = QueuedTransport::new();
    let mut sink = RecordingSink::new();

    feed(&mut transport, 50 * MS, &[(0, 0, 100_000.0), (1, 2, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    assert!(air.calibration(0).unwrap().device_id().is_none());
    assert!(!air.calibration(1).unwrap().enabled());
    assert!(air.voter().puts.is_empty());
    assert_eq!(transport.pending(0), 0);
    assert_eq!(transport.pending(1), 0);
}

#[test]
fn drains_at_most_queue_length_per_cycle() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    for i in 0..6 {
        feed(&mut transport, (40 + i) * MS, &[(0, 1, 100_000.0)]);
    }
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    assert_eq!(air.voter().puts_for(0), QueuedTransport::QUEUE_LENGTH);
    assert_eq!(transport.pending(0), 2);
}

#[test]
fn thermal_offset_is_subtracted() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 50 * MS, &[(0, 1, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    air.set_thermal_offset(0, 12.0);
    feed(&mut transport, 100 * MS, &[(0, 1, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 100 * MS);

    assert_eq!(sink.air_data[0].baro_pressure_pa, 100_000.0);
    assert_eq!(sink.air_data[1].baro_pressure_pa, 99_988.0);
}

#[test]
fn parameter_update_defers_switch_and_failover() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 50 * MS, &[(0, 1, 100_000.0), (1, 2, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);
    assert_eq!(air.selected(), Some(0));

    air.voter_mut().best = Some(1);
    air.voter_mut().fail(0, ErrorFlags::TIMEOUT);
    air.storage_mut().set_config(AirDataConfig::default());

    feed(&mut transport, 100 * MS, &[(0, 1, 100_000.0), (1, 2, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 100 * MS);

    assert_eq!(air.selected(), Some(0));
    assert!(sink.alerts.is_empty());
    assert_eq!(air.priority(0), Some(Priority::new(50)));

    feed(&mut transport, 150 * MS, &[(0, 1, 100_000.0), (1, 2, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 150 * MS);

    assert_eq!(air.selected(), Some(1));
    assert!(transport.callback_registered(1));
    assert!(!transport.callback_registered(0));
    assert_eq!(sink.alerts.len(), 1);
    assert_eq!(sink.alerts[0].slot, 0);
    assert_eq!(sink.alerts[0].message.as_str(), "Baro #0 failed: TIMEOUT!");
    assert_eq!(air.priority(0), Some(Priority::MIN));
}

#[test]
fn alert_at_time_zero_starts_the_rate_limit() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 0, &[(0, 1, 100_000.0), (1, 2, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 0);

    air.voter_mut().fail(0, ErrorFlags::TIMEOUT);
    cycle(&mut air, &mut transport, &mut sink, 0);
    assert_eq!(sink.alerts.len(), 1);
    assert_eq!(sink.alerts[0].timestamp, 0);

    air.voter_mut().fail(1, ErrorFlags::TIMEOUT);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    assert_eq!(sink.alerts.len(), 1);
    assert_eq!(air.priority(1), Some(Priority::MIN));
}

#[test]
fn driver_external_flag_does_not_rebind() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());
    let external = |t: Timestamp| BaroSample {
        external: true,
        ..sample(t, 1, 100_000.0)
    };

    transport.publish(0, external(50 * MS)).unwrap();
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);
    assert_eq!(air.calibration(0).unwrap().calibration_count(), 1);

    air.set_thermal_offset(0, 12.0);
    air.voter_mut().fail(0, ErrorFlags::TIMEOUT);
    transport.publish(0, external(100 * MS)).unwrap();
    cycle(&mut air, &mut transport, &mut sink, 100 * MS);
    assert_eq!(air.priority(0), Some(Priority::MIN));

    for k in 3..=5 {
        transport.publish(0, external(k * 50 * MS)).unwrap();
        cycle(&mut air, &mut transport, &mut sink, k * 50 * MS);
    }

    let calibration = air.calibration(0).unwrap();
    assert_eq!(air.priority(0), Some(Priority::MIN));
    assert_eq!(calibration.calibration_count(), 1);
    assert_eq!(calibration.thermal_offset(), 12.0);
    assert!(calibration.external());
}

#[test]
fn configured_priority_edits_reconcile_with_runtime() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 50 * MS, &[(0, 1, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    // Runtime equals old configured value: take the new one
    air.storage_mut().set_entry(0, stored(1, 0.0, 80)).unwrap();
    cycle(&mut air, &mut transport, &mut sink, 100 * MS);
    assert_eq!(air.priority(0), Some(Priority::new(80)));

    air.voter_mut().fail(0, ErrorFlags::STALE_DATA);
    cycle(&mut air, &mut transport, &mut sink, 150 * MS);
    assert_eq!(air.priority(0), Some(Priority::MIN));

    // Runtime was lowered: apply the delta only
    air.storage_mut().set_entry(0, stored(1, 0.0, 90)).unwrap();
    cycle(&mut air, &mut transport, &mut sink, 200 * MS);
    assert_eq!(air.priority(0), Some(Priority::new(11)));
}

#[test]
fn estimator_fault_edge_lowers_selected_priority() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 50 * MS, &[(0, 1, 100_000.0), (1, 2, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    let faulted = AuxiliaryInputs::none().with_estimator_fault(true);
    feed(&mut transport, 100 * MS, &[(0, 1, 100_000.0), (1, 2, 100_000.0)]);
    air.run_cycle(100 * MS, &mut transport, &faulted, &mut sink);

    assert_eq!(air.priority(0), Some(Priority::MIN));
    assert_eq!(air.priority(1), Some(Priority::new(50)));
    assert_eq!(air.voter().puts.last().map(|(s, _, p)| (*s, *p)), Some((1, Priority::new(50))));
}

#[test]
fn publication_is_rate_limited_and_averaged() {
    let config = AirDataConfig::default().with_publish_rate_hz(10.0);
    let (mut air, mut transport, mut sink) = two_sensor_setup(config);

    for k in 1..=10u64 {
        let t = k * 50 * MS;
        feed(&mut transport, t, &[(0, 1, 100_000.0 + k as f32)]);
        cycle(&mut air, &mut transport, &mut sink, t);
    }

    let times: Vec<_> = sink.air_data.iter().map(|d| d.timestamp).collect();
    assert_eq!(times, [100 * MS, 200 * MS, 300 * MS, 400 * MS, 500 * MS]);

    // Samples 3 and 4 averaged
    assert_eq!(sink.air_data[1].baro_pressure_pa, 100_003.5);
    assert_eq!(sink.air_data[1].timestamp_sample, 175 * MS);
}

#[test]
fn stale_or_unhealthy_data_is_dropped() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 3_000 * MS, &[(0, 1, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 5_000 * MS);

    assert!(sink.air_data.is_empty());
    assert_eq!(air.accumulator(0).unwrap().count(), 0);

    air.voter_mut().states[0] = ErrorFlags::HIGH_ERRCOUNT;
    feed(&mut transport, 5_050 * MS, &[(0, 1, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 5_050 * MS);

    assert!(sink.air_data.is_empty());
    assert!(!sink.status[1].healthy[0]);
}

#[test]
fn zero_rate_disables_output_only() {
    let config = AirDataConfig::default().with_publish_rate_hz(0.0);
    let (mut air, mut transport, mut sink) = two_sensor_setup(config);

    feed(&mut transport, 50 * MS, &[(0, 1, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    assert!(sink.air_data.is_empty());
    assert_eq!(sink.status.len(), 1);
}

#[test]
fn inconsistency_tracks_deviation_from_mean() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 50 * MS, &[(0, 1, 100_000.0), (1, 2, 100_010.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    let status = &sink.status[0];
    assert!((status.inconsistency[0] + 0.25).abs() < 1e-3);
    assert!((status.inconsistency[1] - 0.25).abs() < 1e-3);
    assert!(status.inconsistency[2].is_nan());
    assert_eq!(status.device_ids[1], DeviceId(2));
    assert!(status.enabled[1]);
}

#[test]
fn ambient_temperature_fallbacks() {
    let now = 10_000 * MS;
    let none = AuxiliaryInputs::none();

    assert_eq!(
        ambient_temperature(now, 30.0, TemperatureSource::Default, &none),
        (15.0, TemperatureSource::Default)
    );
    assert_eq!(
        ambient_temperature(now, 30.0, TemperatureSource::ExternalBaro, &none),
        (30.0, TemperatureSource::ExternalBaro)
    );
    assert_eq!(
        ambient_temperature(now, f32::NAN, TemperatureSource::ExternalBaro, &none),
        (15.0, TemperatureSource::Default)
    );

    let fresh = AuxiliaryInputs::none().with_airspeed_temperature(now - 500 * MS, 5.0);
    assert_eq!(
        ambient_temperature(now, 30.0, TemperatureSource::ExternalBaro, &fresh),
        (5.0, TemperatureSource::Airspeed)
    );

    let stale = AuxiliaryInputs::none().with_airspeed_temperature(now - 1_500 * MS, 5.0);
    assert_eq!(
        ambient_temperature(now, 30.0, TemperatureSource::Default, &stale),
        (15.0, TemperatureSource::Default)
    );

    let hot = AuxiliaryInputs::none().with_airspeed_temperature(now, 95.0);
    assert_eq!(
        ambient_temperature(now, 30.0, TemperatureSource::Default, &hot),
        (60.0, TemperatureSource::Airspeed)
    );
}

#[test]
fn stop_releases_callbacks_and_display_lists_slots() {
    let (mut air, mut transport, mut sink) = two_sensor_setup(AirDataConfig::default());

    feed(&mut transport, 50 * MS, &[(0, 1, 100_000.0)]);
    cycle(&mut air, &mut transport, &mut sink, 50 * MS);

    let text = air.to_string();
    assert!(text.contains("selected barometer: 1 (0)"));
    assert!(text.contains("#0 priority 50"));

    air.stop(&mut transport);
    assert!(!transport.callback_registered(0));
}
