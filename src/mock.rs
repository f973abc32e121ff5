//! In-memory collaborators for testing: [`MockDriver`] and [`MockCalls`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{AudioSessionDriver, CallControl};
use crate::error::{DriverError, Error, Result};
use crate::types::{
    AudioDevice, CallHandle, CallInfo, CallPhase, DriverOp, OutputOverride, PortDescriptor,
    PortKind, RouteSnapshot, SessionCategory, SessionMode,
};

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

/// A driver call recorded by [`MockDriver`], failed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Activate(bool),
    SetCategory(SessionCategory),
    SetMode(SessionMode),
    SetPreferredSampleRate(u32),
    SetPreferredInput(PortKind),
    OverrideOutput(OutputOverride),
}

impl DriverCall {
    pub fn op(&self) -> DriverOp {
        match self {
            DriverCall::Activate(_) => DriverOp::Activate,
            DriverCall::SetCategory(_) => DriverOp::SetCategory,
            DriverCall::SetMode(_) => DriverOp::SetMode,
            DriverCall::SetPreferredSampleRate(_) => DriverOp::SetPreferredSampleRate,
            DriverCall::SetPreferredInput(_) => DriverOp::SetPreferredInput,
            DriverCall::OverrideOutput(_) => DriverOp::OverrideOutput,
        }
    }
}

struct DriverState {
    /// Output kind of the connected Bluetooth accessory.
    bluetooth: Option<PortKind>,
    headset: bool,
    /// Accessories in connection order; the last one is the default route.
    connection_order: Vec<AudioDevice>,
    preferred_input: Option<PortKind>,
    speaker_override: bool,
    mode: SessionMode,
    active: bool,
    category: Option<SessionCategory>,
    sample_rate: Option<u32>,
    forced_route: Option<RouteSnapshot>,
    /// Snapshot to force once the given number of route reads has passed.
    scheduled_route: Option<(usize, RouteSnapshot)>,
    fail_next: HashSet<DriverOp>,
    calls: Vec<DriverCall>,
}

/// A simulated audio session driver.
///
/// The route follows a simplified platform model:
/// - with no preference, the most recently connected accessory carries the
///   output (a Bluetooth accessory keeps the built-in mic until selected);
/// - a preferred accessory input moves both input and output onto it and
///   cancels any speaker override;
/// - a preferred built-in mic routes to the receiver;
/// - a speaker override forces the loudspeaker output.
///
/// A newly connected accessory takes over the route: it clears the
/// preferred input. Connecting or disconnecting an accessory also cancels
/// the override.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<Mutex<DriverState>>,
}

const BUILTIN_MIC: &str = "builtin-mic";
const HEADSET_MIC: &str = "headset-mic";
const BLUETOOTH_IN: &str = "bt-in";

impl MockDriver {
    /// A driver with only built-in ports.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DriverState {
                bluetooth: None,
                headset: false,
                connection_order: Vec::new(),
                preferred_input: None,
                speaker_override: false,
                mode: SessionMode::Default,
                active: false,
                category: None,
                sample_rate: None,
                forced_route: None,
                scheduled_route: None,
                fail_next: HashSet::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Plug in a wired headset.
    pub fn plug_headphones(&self) {
        let mut state = self.state.lock().unwrap();
        state.headset = true;
        state.connection_order.retain(|d| *d != AudioDevice::Headphones);
        state.connection_order.push(AudioDevice::Headphones);
        state.preferred_input = None;
        state.speaker_override = false;
    }

    /// Unplug the wired headset, returning the first output of the route
    /// before removal.
    pub fn unplug_headphones(&self) -> Option<PortKind> {
        let mut state = self.state.lock().unwrap();
        let previous = route_of(&state).first_output();
        state.headset = false;
        state.connection_order.retain(|d| *d != AudioDevice::Headphones);
        state.speaker_override = false;
        previous
    }

    /// Connect a Bluetooth accessory whose default output is `output`.
    pub fn connect_bluetooth(&self, output: PortKind) {
        debug_assert!(output.is_bluetooth());
        let mut state = self.state.lock().unwrap();
        state.bluetooth = Some(output);
        state.connection_order.retain(|d| *d != AudioDevice::Bluetooth);
        state.connection_order.push(AudioDevice::Bluetooth);
        state.preferred_input = None;
        state.speaker_override = false;
    }

    /// Disconnect the Bluetooth accessory, returning the first output of the
    /// route before removal.
    pub fn disconnect_bluetooth(&self) -> Option<PortKind> {
        let mut state = self.state.lock().unwrap();
        let previous = route_of(&state).first_output();
        state.bluetooth = None;
        state.connection_order.retain(|d| *d != AudioDevice::Bluetooth);
        state.speaker_override = false;
        previous
    }

    /// Report `route` from [`current_route()`](AudioSessionDriver::current_route)
    /// until cleared with `None`, e.g. an empty snapshot mid-switch.
    pub fn force_route(&self, route: Option<RouteSnapshot>) {
        self.state.lock().unwrap().forced_route = route;
    }

    /// Like [`force_route`](Self::force_route), but only after `reads` more
    /// calls to `current_route()` have returned the simulated route.
    pub fn force_route_after(&self, reads: usize, route: RouteSnapshot) {
        self.state.lock().unwrap().scheduled_route = Some((reads, route));
    }

    /// Make the next call of `op` fail.
    pub fn fail_next(&self, op: DriverOp) {
        self.state.lock().unwrap().fail_next.insert(op);
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls made of `op`.
    pub fn count(&self, op: DriverOp) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn mode(&self) -> SessionMode {
        self.state.lock().unwrap().mode
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    pub fn category(&self) -> Option<SessionCategory> {
        self.state.lock().unwrap().category
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.state.lock().unwrap().sample_rate
    }

    pub fn speaker_override(&self) -> bool {
        self.state.lock().unwrap().speaker_override
    }

    /// Record a call and consume a pending failure for it.
    fn record(&self, call: DriverCall) -> std::result::Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        state.calls.push(call);
        if state.fail_next.remove(&op) {
            return Err(DriverError::new(format!("injected {op} failure")));
        }
        Ok(())
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn available_of(state: &DriverState) -> Vec<PortDescriptor> {
    let mut inputs = vec![PortDescriptor::new(PortKind::BuiltInMic, BUILTIN_MIC)];
    if state.headset {
        inputs.push(PortDescriptor::new(PortKind::HeadsetMic, HEADSET_MIC));
    }
    if let Some(output) = state.bluetooth {
        inputs.push(PortDescriptor::new(bluetooth_input_kind(output), BLUETOOTH_IN));
    }
    inputs
}

fn bluetooth_input_kind(output: PortKind) -> PortKind {
    if output == PortKind::BluetoothLE {
        PortKind::BluetoothLE
    } else {
        PortKind::BluetoothHFP
    }
}

fn route_of(state: &DriverState) -> RouteSnapshot {
    if let Some(route) = &state.forced_route {
        return route.clone();
    }

    let mic = PortDescriptor::new(PortKind::BuiltInMic, BUILTIN_MIC);
    let preferred_accessory = match state.preferred_input {
        Some(PortKind::HeadsetMic) if state.headset => Some(AudioDevice::Headphones),
        Some(kind) if kind.is_bluetooth() && state.bluetooth.is_some() => {
            Some(AudioDevice::Bluetooth)
        }
        _ => None,
    };
    let builtin_preferred = state.preferred_input == Some(PortKind::BuiltInMic);

    let (inputs, outputs) = match (preferred_accessory, state.bluetooth) {
        (Some(AudioDevice::Bluetooth), Some(output)) => {
            let kind = bluetooth_input_kind(output);
            (
                vec![PortDescriptor::new(kind, BLUETOOTH_IN)],
                vec![PortDescriptor::new(kind, "bt-out")],
            )
        }
        (Some(_), _) => (
            vec![PortDescriptor::new(PortKind::HeadsetMic, HEADSET_MIC)],
            vec![PortDescriptor::new(PortKind::Headphones, "wired-headphones")],
        ),
        (None, _) if builtin_preferred => (
            vec![mic.clone()],
            vec![PortDescriptor::new(PortKind::BuiltInReceiver, "builtin-receiver")],
        ),
        (None, bluetooth) => match (state.connection_order.last(), bluetooth) {
            (Some(AudioDevice::Bluetooth), Some(output)) => {
                (vec![mic.clone()], vec![PortDescriptor::new(output, "bt-out")])
            }
            (Some(AudioDevice::Headphones), _) if state.headset => (
                vec![PortDescriptor::new(PortKind::HeadsetMic, HEADSET_MIC)],
                vec![PortDescriptor::new(PortKind::Headphones, "wired-headphones")],
            ),
            _ => (
                vec![mic.clone()],
                vec![PortDescriptor::new(PortKind::BuiltInReceiver, "builtin-receiver")],
            ),
        },
    };

    if state.speaker_override {
        return RouteSnapshot::new(
            inputs,
            vec![PortDescriptor::new(PortKind::BuiltInSpeaker, "builtin-speaker")],
        );
    }
    RouteSnapshot::new(inputs, outputs)
}

impl AudioSessionDriver for MockDriver {
    fn activate(&self, active: bool) -> std::result::Result<(), DriverError> {
        self.record(DriverCall::Activate(active))?;
        self.state.lock().unwrap().active = active;
        Ok(())
    }

    fn set_category(&self, category: SessionCategory) -> std::result::Result<(), DriverError> {
        self.record(DriverCall::SetCategory(category))?;
        self.state.lock().unwrap().category = Some(category);
        Ok(())
    }

    fn set_mode(&self, mode: SessionMode) -> std::result::Result<(), DriverError> {
        self.record(DriverCall::SetMode(mode))?;
        self.state.lock().unwrap().mode = mode;
        Ok(())
    }

    fn set_preferred_sample_rate(&self, hz: u32) -> std::result::Result<(), DriverError> {
        self.record(DriverCall::SetPreferredSampleRate(hz))?;
        self.state.lock().unwrap().sample_rate = Some(hz);
        Ok(())
    }

    fn set_preferred_input(&self, port: &PortDescriptor) -> std::result::Result<(), DriverError> {
        self.record(DriverCall::SetPreferredInput(port.kind))?;
        let mut state = self.state.lock().unwrap();
        if !available_of(&state).iter().any(|p| p.kind == port.kind) {
            return Err(DriverError::new(format!("input {} not available", port.id)));
        }
        state.preferred_input = Some(port.kind);
        if port.kind != PortKind::BuiltInMic {
            state.speaker_override = false;
        }
        Ok(())
    }

    fn override_output(&self, output: OutputOverride) -> std::result::Result<(), DriverError> {
        self.record(DriverCall::OverrideOutput(output))?;
        self.state.lock().unwrap().speaker_override = output == OutputOverride::Speaker;
        Ok(())
    }

    fn current_route(&self) -> RouteSnapshot {
        let mut state = self.state.lock().unwrap();
        let due = match state.scheduled_route.as_mut() {
            Some((0, _)) => true,
            Some((reads, _)) => {
                *reads -= 1;
                false
            }
            None => false,
        };
        if due {
            let route = state.scheduled_route.take().map(|(_, route)| route);
            state.forced_route = route;
        }
        route_of(&state)
    }

    fn available_inputs(&self) -> Vec<PortDescriptor> {
        available_of(&self.state.lock().unwrap())
    }
}

// ---------------------------------------------------------------------------
// MockCalls
// ---------------------------------------------------------------------------

struct CallsState {
    current: Option<CallInfo>,
    count: usize,
    paused: Vec<CallHandle>,
    fail_pause: bool,
    pause_delay: Option<Duration>,
}

/// A simulated SIP call engine holding at most one call in focus.
#[derive(Clone)]
pub struct MockCalls {
    state: Arc<Mutex<CallsState>>,
}

impl MockCalls {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CallsState {
                current: None,
                count: 0,
                paused: Vec::new(),
                fail_pause: false,
                pause_delay: None,
            })),
        }
    }

    /// Make `handle` the current call in `phase`; counts as one live call.
    pub fn set_call(&self, handle: CallHandle, phase: CallPhase) {
        let mut state = self.state.lock().unwrap();
        state.current = Some(CallInfo { handle, phase });
        state.count = state.count.max(1);
    }

    /// Override the number of live calls (e.g. a second call on hold).
    pub fn set_calls_count(&self, count: usize) {
        self.state.lock().unwrap().count = count;
    }

    /// Drop every call.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.current = None;
        state.count = 0;
    }

    /// Calls paused through [`CallControl::pause`].
    pub fn paused(&self) -> Vec<CallHandle> {
        self.state.lock().unwrap().paused.clone()
    }

    /// Make every subsequent pause take `delay` before completing.
    pub fn pause_delay(&self, delay: Duration) {
        self.state.lock().unwrap().pause_delay = Some(delay);
    }

    /// Make every subsequent pause fail.
    pub fn fail_pause(&self, fail: bool) {
        self.state.lock().unwrap().fail_pause = fail;
    }
}

impl Default for MockCalls {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallControl for MockCalls {
    fn current_call(&self) -> Option<CallInfo> {
        self.state.lock().unwrap().current
    }

    fn calls_count(&self) -> usize {
        self.state.lock().unwrap().count
    }

    async fn pause(&self, call: CallHandle) -> Result<()> {
        let delay = self.state.lock().unwrap().pause_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_pause {
            return Err(Error::CallControl(format!("cannot pause call {}", call.0)));
        }
        state.paused.push(call);
        if let Some(current) = state.current.as_mut().filter(|c| c.handle == call) {
            current.phase = CallPhase::Paused;
        }
        Ok(())
    }
}
