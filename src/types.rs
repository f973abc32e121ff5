use std::fmt;

/// A physical audio path that can carry a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioDevice {
    /// Built-in earpiece.
    Receiver,
    /// Built-in loudspeaker.
    Speaker,
    Bluetooth,
    /// Wired headset.
    Headphones,
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioDevice::Receiver => "receiver",
            AudioDevice::Speaker => "speaker",
            AudioDevice::Bluetooth => "bluetooth",
            AudioDevice::Headphones => "headphones",
        };
        f.write_str(name)
    }
}

/// Kind of a port reported by the audio session driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    BuiltInMic,
    BuiltInReceiver,
    BuiltInSpeaker,
    Headphones,
    HeadsetMic,
    BluetoothLE,
    BluetoothHFP,
    BluetoothA2DP,
}

impl PortKind {
    /// Whether this is one of the Bluetooth port kinds.
    pub fn is_bluetooth(self) -> bool {
        matches!(
            self,
            PortKind::BluetoothLE | PortKind::BluetoothHFP | PortKind::BluetoothA2DP
        )
    }
}

/// A single input or output port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortDescriptor {
    pub kind: PortKind,
    pub id: String,
}

impl PortDescriptor {
    pub fn new(kind: PortKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// The active route as reported by the driver.
///
/// Either list may be empty while the hardware is switching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSnapshot {
    pub inputs: Vec<PortDescriptor>,
    pub outputs: Vec<PortDescriptor>,
}

impl RouteSnapshot {
    pub fn new(inputs: Vec<PortDescriptor>, outputs: Vec<PortDescriptor>) -> Self {
        Self { inputs, outputs }
    }

    /// Kind of the first output port, if any.
    pub fn first_output(&self) -> Option<PortKind> {
        self.outputs.first().map(|p| p.kind)
    }

    /// Kind of the first input port, if any.
    pub fn first_input(&self) -> Option<PortKind> {
        self.inputs.first().map(|p| p.kind)
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

/// Call phase as seen by the route engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallPhase {
    #[default]
    Idle,
    Ringing(CallDirection),
    Connected,
    /// Media flowing both ways.
    StreamsRunning { video_enabled: bool },
    Paused,
    Ended,
}

impl CallPhase {
    pub fn is_streaming(self) -> bool {
        matches!(self, CallPhase::StreamsRunning { .. })
    }
}

/// Call-state transitions delivered by the SIP call engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    OutgoingInit,
    IncomingReceived,
    IncomingEarlyMedia,
    Connected,
    StreamsRunning { video_enabled: bool },
    Paused,
    PausedByRemote,
    End,
    Error,
    Released,
}

impl CallState {
    /// The engine-level phase this transition moves the call into.
    pub fn phase(self) -> CallPhase {
        match self {
            CallState::OutgoingInit => CallPhase::Ringing(CallDirection::Outgoing),
            CallState::IncomingReceived | CallState::IncomingEarlyMedia => {
                CallPhase::Ringing(CallDirection::Incoming)
            }
            CallState::Connected => CallPhase::Connected,
            CallState::StreamsRunning { video_enabled } => {
                CallPhase::StreamsRunning { video_enabled }
            }
            CallState::Paused | CallState::PausedByRemote => CallPhase::Paused,
            CallState::End | CallState::Error | CallState::Released => CallPhase::Ended,
        }
    }
}

/// Opaque identifier of a call in the SIP call engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHandle(pub u64);

/// The call engine's view of its current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInfo {
    pub handle: CallHandle,
    pub phase: CallPhase,
}

/// Power state of the short-range radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioPower {
    On,
    Off,
    Resetting,
    Unauthorized,
    Unknown,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Default,
    VoiceChat,
}

/// Forced output selection that leaves the preferred input alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOverride {
    Speaker,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCategory {
    PlayAndRecord { allow_bluetooth: bool },
}

/// An explicit output choice made by the user (speaker toggle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRequest {
    Speaker,
    Receiver,
}

/// Driver operations, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Activate,
    SetCategory,
    SetMode,
    SetPreferredSampleRate,
    SetPreferredInput,
    OverrideOutput,
}

impl fmt::Display for DriverOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverOp::Activate => "activate",
            DriverOp::SetCategory => "set_category",
            DriverOp::SetMode => "set_mode",
            DriverOp::SetPreferredSampleRate => "set_preferred_sample_rate",
            DriverOp::SetPreferredInput => "set_preferred_input",
            DriverOp::OverrideOutput => "override_output",
        };
        f.write_str(name)
    }
}
