//! Route decision logic.
//!
//! All functions are pure (no I/O), fully unit-testable.

use crate::error::{Error, Result};
use crate::tracker::DeviceStates;
use crate::types::{AudioDevice, CallDirection, CallPhase, OutputRequest};

/// Pick the device that should carry audio for `phase`.
///
/// Accessories win in the order Bluetooth, Headphones. An explicit request
/// only chooses between the built-in speaker and receiver, and is rejected
/// while an accessory is connected.
pub fn decide(
    states: &DeviceStates,
    phase: CallPhase,
    explicit: Option<OutputRequest>,
) -> Result<AudioDevice> {
    if let Some(request) = explicit {
        let device = match request {
            OutputRequest::Speaker => AudioDevice::Speaker,
            OutputRequest::Receiver => AudioDevice::Receiver,
        };
        if states.bluetooth.connected {
            return Err(Error::precondition(device, "bluetooth accessory connected"));
        }
        if states.headphones.connected {
            return Err(Error::precondition(device, "headphones connected"));
        }
        return Ok(device);
    }

    if states.bluetooth.connected {
        return Ok(AudioDevice::Bluetooth);
    }
    if states.headphones.connected {
        return Ok(AudioDevice::Headphones);
    }
    Ok(builtin_for_phase(phase))
}

/// Built-in output for a phase when no accessory is present.
pub fn builtin_for_phase(phase: CallPhase) -> AudioDevice {
    match phase {
        CallPhase::StreamsRunning {
            video_enabled: true,
        } => AudioDevice::Speaker,
        CallPhase::Ringing(CallDirection::Incoming) => AudioDevice::Speaker,
        _ => AudioDevice::Receiver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::DeviceState;

    fn states(bluetooth: bool, headphones: bool) -> DeviceStates {
        DeviceStates {
            bluetooth: DeviceState {
                connected: bluetooth,
                enabled: false,
            },
            headphones: DeviceState {
                connected: headphones,
                enabled: false,
            },
            ..DeviceStates::default()
        }
    }

    #[test]
    fn test_bluetooth_beats_headphones() {
        let target = decide(&states(true, true), CallPhase::Connected, None).unwrap();
        assert_eq!(target, AudioDevice::Bluetooth);
    }

    #[test]
    fn test_headphones_beat_builtin() {
        let phase = CallPhase::StreamsRunning {
            video_enabled: true,
        };
        let target = decide(&states(false, true), phase, None).unwrap();
        assert_eq!(target, AudioDevice::Headphones);
    }

    #[test]
    fn test_builtin_by_phase() {
        let none = states(false, false);
        let cases = [
            (
                CallPhase::StreamsRunning {
                    video_enabled: true,
                },
                AudioDevice::Speaker,
            ),
            (
                CallPhase::StreamsRunning {
                    video_enabled: false,
                },
                AudioDevice::Receiver,
            ),
            (
                CallPhase::Ringing(CallDirection::Incoming),
                AudioDevice::Speaker,
            ),
            (
                CallPhase::Ringing(CallDirection::Outgoing),
                AudioDevice::Receiver,
            ),
            (CallPhase::Connected, AudioDevice::Receiver),
            (CallPhase::Idle, AudioDevice::Receiver),
            (CallPhase::Ended, AudioDevice::Receiver),
        ];
        for (phase, expected) in cases {
            assert_eq!(decide(&none, phase, None).unwrap(), expected, "{phase:?}");
        }
    }

    #[test]
    fn test_explicit_request_overrides_builtin_choice() {
        let none = states(false, false);
        let video = CallPhase::StreamsRunning {
            video_enabled: true,
        };
        assert_eq!(
            decide(&none, video, Some(OutputRequest::Receiver)).unwrap(),
            AudioDevice::Receiver
        );
        assert_eq!(
            decide(&none, CallPhase::Connected, Some(OutputRequest::Speaker)).unwrap(),
            AudioDevice::Speaker
        );
    }

    #[test]
    fn test_explicit_request_rejected_with_accessory() {
        let err = decide(
            &states(false, true),
            CallPhase::Connected,
            Some(OutputRequest::Speaker),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Precondition {
                device: AudioDevice::Speaker,
                ..
            }
        ));

        assert!(
            decide(
                &states(true, false),
                CallPhase::Connected,
                Some(OutputRequest::Receiver)
            )
            .is_err()
        );
    }
}
