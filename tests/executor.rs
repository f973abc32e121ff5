use std::sync::Arc;

use callroute::{
    AudioDevice, AudioSessionDriver, CallPhase, CommandOutcome, DeviceStateTracker, DriverOp,
    Error, MockDriver, PortDescriptor, PortKind, RouteCommandExecutor,
};

const STREAMING: CallPhase = CallPhase::StreamsRunning {
    video_enabled: false,
};

fn setup() -> (MockDriver, RouteCommandExecutor, DeviceStateTracker) {
    let driver = MockDriver::new();
    let executor = RouteCommandExecutor::new(Arc::new(driver.clone()));
    (driver, executor, DeviceStateTracker::new())
}

fn refresh(driver: &MockDriver, tracker: &mut DeviceStateTracker, radio_on: bool) {
    tracker.refresh(
        &driver.current_route(),
        &driver.available_inputs(),
        radio_on,
    );
}

#[test]
fn to_headphones_is_idempotent() {
    let (driver, executor, mut tracker) = setup();
    driver.plug_headphones();
    driver
        .set_preferred_input(&PortDescriptor::new(PortKind::BuiltInMic, "builtin-mic"))
        .unwrap();
    refresh(&driver, &mut tracker, false);
    assert!(tracker.states().headphones.connected);
    driver.clear_calls();

    let first = executor.to_headphones(&mut tracker, STREAMING).unwrap();
    let second = executor.to_headphones(&mut tracker, STREAMING).unwrap();

    assert_eq!(first, CommandOutcome::Applied);
    assert_eq!(second, CommandOutcome::AlreadyActive);
    assert_eq!(driver.count(DriverOp::SetPreferredInput), 1);
    assert_eq!(driver.count(DriverOp::SetMode), 1);
}

#[test]
fn to_headphones_requires_connection() {
    let (driver, executor, mut tracker) = setup();
    refresh(&driver, &mut tracker, false);

    let err = executor.to_headphones(&mut tracker, STREAMING).unwrap_err();
    assert!(matches!(
        err,
        Error::Precondition {
            device: AudioDevice::Headphones,
            ..
        }
    ));
    assert!(driver.calls().is_empty());
}

#[test]
fn to_receiver_noop_with_headphones_connected() {
    let (driver, executor, mut tracker) = setup();
    driver.plug_headphones();
    refresh(&driver, &mut tracker, false);
    driver.clear_calls();

    let result = executor.to_receiver(&mut tracker, STREAMING);
    assert!(matches!(result, Err(Error::Precondition { .. })));
    assert!(driver.calls().is_empty());
}

#[test]
fn to_receiver_guard_uses_discoverable_headset_mic() {
    let (driver, executor, mut tracker) = setup();
    // Tracker has not seen the headset yet.
    refresh(&driver, &mut tracker, false);
    driver.plug_headphones();

    let result = executor.to_receiver(&mut tracker, CallPhase::Connected);
    assert!(matches!(result, Err(Error::Precondition { .. })));
    assert_eq!(driver.count(DriverOp::SetPreferredInput), 0);
}

#[test]
fn to_receiver_failure_leaves_flags() {
    let (driver, executor, mut tracker) = setup();
    refresh(&driver, &mut tracker, false);
    let before = tracker.states();
    driver.fail_next(DriverOp::SetPreferredInput);

    let err = executor.to_receiver(&mut tracker, STREAMING).unwrap_err();
    assert!(matches!(
        err,
        Error::SessionConfiguration {
            op: DriverOp::SetPreferredInput,
            ..
        }
    ));
    assert_eq!(tracker.states(), before);
}

#[test]
fn to_speaker_failure_forces_speaker_disabled() {
    let (driver, executor, mut tracker) = setup();
    executor.to_speaker(&mut tracker).unwrap();
    refresh(&driver, &mut tracker, false);
    assert!(tracker.states().speaker.enabled);

    driver.fail_next(DriverOp::OverrideOutput);
    assert!(executor.to_speaker(&mut tracker).is_err());
    assert!(!tracker.states().speaker.enabled);
}

#[test]
fn to_speaker_leaves_preferred_input_alone() {
    let (driver, executor, mut tracker) = setup();
    executor.to_speaker(&mut tracker).unwrap();
    assert_eq!(driver.count(DriverOp::SetPreferredInput), 0);
    assert_eq!(driver.count(DriverOp::OverrideOutput), 1);
}

#[test]
fn to_bluetooth_failure_forces_bluetooth_disabled() {
    let (driver, executor, mut tracker) = setup();
    driver.connect_bluetooth(PortKind::BluetoothHFP);
    driver
        .set_preferred_input(&PortDescriptor::new(PortKind::BluetoothHFP, "bt-in"))
        .unwrap();
    refresh(&driver, &mut tracker, true);
    assert!(tracker.states().bluetooth.enabled);

    // Fall back silently, then fail the switch back.
    driver
        .set_preferred_input(&PortDescriptor::new(PortKind::BuiltInMic, "builtin-mic"))
        .unwrap();
    driver.fail_next(DriverOp::SetMode);
    let err = executor.to_bluetooth(&mut tracker, STREAMING).unwrap_err();

    assert!(matches!(
        err,
        Error::SessionConfiguration {
            op: DriverOp::SetMode,
            ..
        }
    ));
    assert!(!tracker.states().bluetooth.enabled);
    assert!(tracker.states().bluetooth.connected);
}

#[test]
fn to_bluetooth_skips_when_input_already_bluetooth() {
    let (driver, executor, mut tracker) = setup();
    driver.connect_bluetooth(PortKind::BluetoothLE);
    refresh(&driver, &mut tracker, true);
    executor.to_bluetooth(&mut tracker, STREAMING).unwrap();
    driver.clear_calls();

    let outcome = executor
        .apply(AudioDevice::Bluetooth, &mut tracker, STREAMING)
        .unwrap();
    assert_eq!(outcome, CommandOutcome::AlreadyActive);
    assert!(driver.calls().is_empty());
}
