//! Route commands: the driver call sequences that realize a decision.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::driver::AudioSessionDriver;
use crate::error::{DriverError, Error, Result};
use crate::tracker::DeviceStateTracker;
use crate::types::{
    AudioDevice, CallPhase, DriverOp, OutputOverride, PortDescriptor, PortKind, SessionMode,
};

/// Result of a route command that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Driver calls were issued.
    Applied,
    /// The route already matched; nothing was written.
    AlreadyActive,
}

/// Issues guarded driver calls for each target device.
///
/// Flags are only touched to force a device's `enabled` off after a failed
/// command; the follow-up refresh establishes everything else.
pub struct RouteCommandExecutor {
    driver: Arc<dyn AudioSessionDriver>,
}

impl RouteCommandExecutor {
    pub fn new(driver: Arc<dyn AudioSessionDriver>) -> Self {
        Self { driver }
    }

    /// Run the command for a decided target.
    pub fn apply(
        &self,
        target: AudioDevice,
        tracker: &mut DeviceStateTracker,
        phase: CallPhase,
    ) -> Result<CommandOutcome> {
        match target {
            AudioDevice::Receiver => self.to_receiver(tracker, phase),
            AudioDevice::Speaker => self.to_speaker(tracker),
            AudioDevice::Bluetooth => self.to_bluetooth(tracker, phase),
            AudioDevice::Headphones => self.to_headphones(tracker, phase),
        }
    }

    pub fn to_receiver(
        &self,
        tracker: &mut DeviceStateTracker,
        phase: CallPhase,
    ) -> Result<CommandOutcome> {
        let available = self.driver.available_inputs();
        if tracker.states().headphones.connected
            || find_port(&available, PortKind::HeadsetMic).is_some()
        {
            debug!("headphones connected, not routing to receiver");
            return Err(Error::precondition(
                AudioDevice::Receiver,
                "headphones connected",
            ));
        }
        let Some(mic) = find_port(&available, PortKind::BuiltInMic) else {
            debug!("built-in microphone not available");
            return Err(Error::precondition(
                AudioDevice::Receiver,
                "built-in microphone unavailable",
            ));
        };

        if tracker.states().speaker.enabled {
            self.call(DriverOp::OverrideOutput, |d| {
                d.override_output(OutputOverride::None)
            })?;
        }
        self.select_input(mic, phase)?;

        debug!("routed to receiver");
        Ok(CommandOutcome::Applied)
    }

    pub fn to_speaker(&self, tracker: &mut DeviceStateTracker) -> Result<CommandOutcome> {
        if let Err(e) = self.call(DriverOp::OverrideOutput, |d| {
            d.override_output(OutputOverride::Speaker)
        }) {
            tracker.force_disabled(AudioDevice::Speaker);
            return Err(e);
        }
        debug!("routed to speaker");
        Ok(CommandOutcome::Applied)
    }

    pub fn to_headphones(
        &self,
        tracker: &mut DeviceStateTracker,
        phase: CallPhase,
    ) -> Result<CommandOutcome> {
        self.to_accessory(
            tracker,
            phase,
            AudioDevice::Headphones,
            |kind| kind == PortKind::HeadsetMic,
        )
    }

    pub fn to_bluetooth(
        &self,
        tracker: &mut DeviceStateTracker,
        phase: CallPhase,
    ) -> Result<CommandOutcome> {
        self.to_accessory(tracker, phase, AudioDevice::Bluetooth, PortKind::is_bluetooth)
    }

    fn to_accessory(
        &self,
        tracker: &mut DeviceStateTracker,
        phase: CallPhase,
        device: AudioDevice,
        is_input: fn(PortKind) -> bool,
    ) -> Result<CommandOutcome> {
        if !tracker.states().get(device).connected {
            debug!(device = %device, "accessory not connected");
            return Err(Error::precondition(device, "accessory not connected"));
        }

        // Repeated route-change notifications land here while the switch is
        // already in place.
        if self.driver.current_route().first_input().is_some_and(is_input) {
            debug!(device = %device, "accessory already routed");
            return Ok(CommandOutcome::AlreadyActive);
        }

        let available = self.driver.available_inputs();
        let Some(port) = available.iter().find(|p| is_input(p.kind)) else {
            debug!(device = %device, "no accessory input available");
            return Err(Error::precondition(device, "no accessory input available"));
        };

        if let Err(e) = self.select_input(port, phase) {
            tracker.force_disabled(device);
            return Err(e);
        }
        debug!(device = %device, port = %port.id, "routed to accessory");
        Ok(CommandOutcome::Applied)
    }

    /// Voice-chat mode while streaming, then the preferred input.
    fn select_input(&self, port: &PortDescriptor, phase: CallPhase) -> Result<()> {
        if phase.is_streaming() {
            self.call(DriverOp::SetMode, |d| d.set_mode(SessionMode::VoiceChat))?;
        }
        self.call(DriverOp::SetPreferredInput, |d| d.set_preferred_input(port))
    }

    fn call<F>(&self, op: DriverOp, f: F) -> Result<()>
    where
        F: FnOnce(&dyn AudioSessionDriver) -> std::result::Result<(), DriverError>,
    {
        f(self.driver.as_ref()).map_err(|e| {
            warn!(op = %op, "audio session call failed: {e}");
            Error::driver(op, e)
        })
    }
}

fn find_port(ports: &[PortDescriptor], kind: PortKind) -> Option<&PortDescriptor> {
    ports.iter().find(|p| p.kind == kind)
}
