use crate::types::{CallState, OutputRequest, PortKind, RadioPower};

/// Flags of an accessory as published to subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessoryStatus {
    pub connected: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeakerStatus {
    pub enabled: bool,
}

/// Status batch published after each decision cycle.
///
/// The three fields always describe the same instant; consumers must apply
/// them together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusEvent {
    pub bluetooth: AccessoryStatus,
    pub headphones: AccessoryStatus,
    pub speaker: SpeakerStatus,
}

/// Why the platform changed the audio route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChangeReason {
    /// An accessory became available.
    NewDeviceAvailable,
    /// An accessory went away. Carries the first output of the previous route.
    OldDeviceUnavailable { previous_output: Option<PortKind> },
    CategoryChange,
    Override,
    WakeFromSleep,
    NoSuitableRouteForCategory,
    RouteConfigurationChange,
    Unknown,
}

/// Inbound events processed by the dispatcher, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteEvent {
    /// The platform audio route changed.
    RouteChanged(RouteChangeReason),
    /// The short-range radio changed power state.
    RadioPower(RadioPower),
    InterruptionBegan,
    InterruptionEnded,
    /// The current call moved to a new state.
    CallState(CallState),
    /// The user asked for the loudspeaker or the earpiece.
    OutputRequested(OutputRequest),
    /// Re-read the driver route without issuing commands.
    Refresh,
}
