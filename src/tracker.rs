//! Device state tracking.
//!
//! Pure: the tracker never talks to the driver. The dispatcher hands it a
//! fresh route snapshot and the available inputs on every refresh.

use tracing::trace;

use crate::event::{AccessoryStatus, SpeakerStatus, StatusEvent};
use crate::types::{AudioDevice, PortDescriptor, PortKind, RouteSnapshot};

/// Connected/enabled flags of one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    /// The device is physically present.
    pub connected: bool,
    /// The device is the active input and output of the session.
    pub enabled: bool,
}

/// Flags of all four devices, copied out once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStates {
    pub receiver: DeviceState,
    pub speaker: DeviceState,
    pub bluetooth: DeviceState,
    pub headphones: DeviceState,
}

impl Default for DeviceStates {
    fn default() -> Self {
        // Built-in devices are always present.
        let builtin = DeviceState {
            connected: true,
            enabled: false,
        };
        Self {
            receiver: builtin,
            speaker: builtin,
            bluetooth: DeviceState::default(),
            headphones: DeviceState::default(),
        }
    }
}

impl DeviceStates {
    pub fn get(&self, device: AudioDevice) -> DeviceState {
        match device {
            AudioDevice::Receiver => self.receiver,
            AudioDevice::Speaker => self.speaker,
            AudioDevice::Bluetooth => self.bluetooth,
            AudioDevice::Headphones => self.headphones,
        }
    }

    /// The device currently carrying the call, if any is known.
    pub fn enabled_device(&self) -> Option<AudioDevice> {
        [
            AudioDevice::Bluetooth,
            AudioDevice::Headphones,
            AudioDevice::Speaker,
            AudioDevice::Receiver,
        ]
        .into_iter()
        .find(|d| self.get(*d).enabled)
    }

    /// Number of devices flagged enabled. Never more than one after a refresh.
    pub fn enabled_count(&self) -> usize {
        [self.receiver, self.speaker, self.bluetooth, self.headphones]
            .iter()
            .filter(|s| s.enabled)
            .count()
    }

    pub fn status(&self) -> StatusEvent {
        StatusEvent {
            bluetooth: AccessoryStatus {
                connected: self.bluetooth.connected,
                enabled: self.bluetooth.enabled,
            },
            headphones: AccessoryStatus {
                connected: self.headphones.connected,
                enabled: self.headphones.enabled,
            },
            speaker: SpeakerStatus {
                enabled: self.speaker.enabled,
            },
        }
    }
}

/// Owns the device flags for the lifetime of an audio session.
#[derive(Debug, Default)]
pub struct DeviceStateTracker {
    states: DeviceStates,
}

impl DeviceStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current flags.
    pub fn states(&self) -> DeviceStates {
        self.states
    }

    pub fn status(&self) -> StatusEvent {
        self.states.status()
    }

    /// Recompute all device flags from a fresh driver snapshot.
    ///
    /// `peripheral_enabled` is the radio monitor's power flag; it gates the
    /// discoverable-input fallback for Bluetooth.
    pub fn refresh(
        &mut self,
        route: &RouteSnapshot,
        available_inputs: &[PortDescriptor],
        peripheral_enabled: bool,
    ) {
        if route.is_empty() {
            trace!("empty route snapshot, keeping previous device state");
            return;
        }

        let s = &mut self.states;
        let first_output = route.first_output();

        if let Some(output) = first_output {
            s.bluetooth.connected = output.is_bluetooth()
                || (peripheral_enabled && available_inputs.iter().any(|p| p.kind.is_bluetooth()));

            s.headphones.connected = output == PortKind::Headphones
                || available_inputs
                    .iter()
                    .any(|p| p.kind == PortKind::HeadsetMic);

            if output == PortKind::BuiltInReceiver {
                s.speaker.enabled = false;
                s.bluetooth.enabled = false;
                s.headphones.enabled = false;
            }

            s.speaker.enabled = output == PortKind::BuiltInSpeaker;
            if s.speaker.enabled {
                s.bluetooth.enabled = false;
                s.headphones.enabled = false;
            }
        }

        if s.bluetooth.connected && route.inputs.iter().any(|p| p.kind.is_bluetooth()) {
            s.bluetooth.enabled = true;
            s.speaker.enabled = false;
            s.headphones.enabled = false;
        } else {
            s.bluetooth.enabled = false;
        }

        if s.headphones.connected && route.inputs.iter().any(|p| p.kind == PortKind::HeadsetMic) {
            s.headphones.enabled = true;
            s.speaker.enabled = false;
            s.bluetooth.enabled = false;
        } else {
            s.headphones.enabled = false;
        }

        let other_enabled = s.speaker.enabled || s.bluetooth.enabled || s.headphones.enabled;
        s.receiver.enabled = match first_output {
            Some(output) => output == PortKind::BuiltInReceiver && !other_enabled,
            None => s.receiver.enabled && !other_enabled,
        };

        trace!(
            bluetooth = ?s.bluetooth,
            headphones = ?s.headphones,
            speaker = s.speaker.enabled,
            receiver = s.receiver.enabled,
            "device state refreshed"
        );
    }

    /// Clear the enabled flag of a device whose route command failed.
    pub fn force_disabled(&mut self, device: AudioDevice) {
        match device {
            AudioDevice::Receiver => self.states.receiver.enabled = false,
            AudioDevice::Speaker => self.states.speaker.enabled = false,
            AudioDevice::Bluetooth => self.states.bluetooth.enabled = false,
            AudioDevice::Headphones => self.states.headphones.enabled = false,
        }
    }

    /// Back to the session-start state.
    pub fn reset(&mut self) {
        self.states = DeviceStates::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(kind: PortKind) -> PortDescriptor {
        PortDescriptor::new(kind, format!("{kind:?}"))
    }

    fn route(inputs: &[PortKind], outputs: &[PortKind]) -> RouteSnapshot {
        RouteSnapshot::new(
            inputs.iter().copied().map(port).collect(),
            outputs.iter().copied().map(port).collect(),
        )
    }

    #[test]
    fn test_initial_state_all_disabled() {
        let tracker = DeviceStateTracker::new();
        let s = tracker.states();
        assert_eq!(s.enabled_count(), 0);
        assert!(!s.bluetooth.connected);
        assert!(!s.headphones.connected);
        assert_eq!(tracker.status(), StatusEvent::default());
    }

    #[test]
    fn test_receiver_route() {
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(&[PortKind::BuiltInMic], &[PortKind::BuiltInReceiver]),
            &[port(PortKind::BuiltInMic)],
            false,
        );
        let s = tracker.states();
        assert!(s.receiver.enabled);
        assert_eq!(s.enabled_count(), 1);
        assert_eq!(s.enabled_device(), Some(AudioDevice::Receiver));
    }

    #[test]
    fn test_speaker_route() {
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(&[PortKind::BuiltInMic], &[PortKind::BuiltInSpeaker]),
            &[port(PortKind::BuiltInMic)],
            false,
        );
        let s = tracker.states();
        assert!(s.speaker.enabled);
        assert!(!s.receiver.enabled);
        assert_eq!(s.enabled_count(), 1);
    }

    #[test]
    fn test_bluetooth_output_and_input() {
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(&[PortKind::BluetoothHFP], &[PortKind::BluetoothHFP]),
            &[port(PortKind::BuiltInMic), port(PortKind::BluetoothHFP)],
            false,
        );
        let s = tracker.states();
        assert!(s.bluetooth.connected);
        assert!(s.bluetooth.enabled);
        assert_eq!(s.enabled_count(), 1);
    }

    #[test]
    fn test_bluetooth_output_without_bluetooth_input_not_enabled() {
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(&[PortKind::BuiltInMic], &[PortKind::BluetoothA2DP]),
            &[port(PortKind::BuiltInMic)],
            false,
        );
        let s = tracker.states();
        assert!(s.bluetooth.connected);
        assert!(!s.bluetooth.enabled);
    }

    #[test]
    fn test_bluetooth_fallback_requires_radio_on() {
        let available = [port(PortKind::BuiltInMic), port(PortKind::BluetoothHFP)];
        let snapshot = route(&[PortKind::BuiltInMic], &[PortKind::BuiltInReceiver]);

        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(&snapshot, &available, false);
        assert!(!tracker.states().bluetooth.connected);

        tracker.refresh(&snapshot, &available, true);
        assert!(tracker.states().bluetooth.connected);
        assert!(!tracker.states().bluetooth.enabled);
        assert!(tracker.states().receiver.enabled);
    }

    #[test]
    fn test_headphones_fallback_on_discoverable_headset_mic() {
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(&[PortKind::BuiltInMic], &[PortKind::BuiltInSpeaker]),
            &[port(PortKind::BuiltInMic), port(PortKind::HeadsetMic)],
            false,
        );
        let s = tracker.states();
        assert!(s.headphones.connected);
        assert!(!s.headphones.enabled);
        assert!(s.speaker.enabled);
    }

    #[test]
    fn test_headphones_enabled_wins_over_bluetooth_input() {
        // Both accessory inputs in the route: the later step takes it.
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(
                &[PortKind::BluetoothHFP, PortKind::HeadsetMic],
                &[PortKind::Headphones],
            ),
            &[port(PortKind::BluetoothHFP), port(PortKind::HeadsetMic)],
            true,
        );
        let s = tracker.states();
        assert!(s.headphones.enabled);
        assert!(!s.bluetooth.enabled);
        assert_eq!(s.enabled_count(), 1);
    }

    #[test]
    fn test_empty_route_keeps_previous_state() {
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(&[PortKind::HeadsetMic], &[PortKind::Headphones]),
            &[port(PortKind::HeadsetMic)],
            false,
        );
        let before = tracker.states();
        assert!(before.headphones.enabled);

        tracker.refresh(&RouteSnapshot::default(), &[], false);
        assert_eq!(tracker.states(), before);
    }

    #[test]
    fn test_empty_outputs_skip_output_steps() {
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(&[PortKind::BuiltInMic], &[PortKind::BuiltInSpeaker]),
            &[port(PortKind::BuiltInMic)],
            false,
        );
        assert!(tracker.states().speaker.enabled);

        // Outputs gone mid-switch: connected flags and speaker are untouched.
        tracker.refresh(&route(&[PortKind::BuiltInMic], &[]), &[], false);
        let s = tracker.states();
        assert!(s.speaker.enabled);
        assert!(!s.bluetooth.connected);
    }

    #[test]
    fn test_force_disabled_and_reset() {
        let mut tracker = DeviceStateTracker::new();
        tracker.refresh(
            &route(&[PortKind::BluetoothHFP], &[PortKind::BluetoothHFP]),
            &[port(PortKind::BluetoothHFP)],
            true,
        );
        tracker.force_disabled(AudioDevice::Bluetooth);
        assert!(tracker.states().bluetooth.connected);
        assert!(!tracker.states().bluetooth.enabled);

        tracker.reset();
        assert_eq!(tracker.states(), DeviceStates::default());
    }

    #[test]
    fn test_mutual_exclusion_over_mixed_snapshots() {
        let kinds = [
            PortKind::BuiltInMic,
            PortKind::BuiltInReceiver,
            PortKind::BuiltInSpeaker,
            PortKind::Headphones,
            PortKind::HeadsetMic,
            PortKind::BluetoothLE,
            PortKind::BluetoothHFP,
            PortKind::BluetoothA2DP,
        ];
        let mut tracker = DeviceStateTracker::new();
        for (i, output) in kinds.iter().enumerate() {
            for input in &kinds {
                let available: Vec<_> = kinds[..=i].iter().copied().map(port).collect();
                tracker.refresh(
                    &route(&[*input, PortKind::HeadsetMic], &[*output]),
                    &available,
                    i % 2 == 0,
                );
                assert!(
                    tracker.states().enabled_count() <= 1,
                    "more than one device enabled for output {output:?}, input {input:?}"
                );
            }
        }
    }
}
