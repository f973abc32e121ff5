//! Dispatcher task: a single tokio task owns the device state.
//!
//! Every inbound event goes through one mpsc channel and is handled to
//! completion (refresh, decide, execute, publish) before the next one is
//! received. Subscribers only ever see published status batches.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::decision;
use crate::driver::{AudioSessionDriver, CallControl};
use crate::error::{Error, Result};
use crate::event::{RouteChangeReason, RouteEvent, StatusEvent};
use crate::executor::RouteCommandExecutor;
use crate::tracker::DeviceStateTracker;
use crate::types::{
    AudioDevice, CallPhase, OutputRequest, PortKind, RadioPower, RouteSnapshot, SessionMode,
};

/// A request sent to the dispatcher task.
#[derive(Debug)]
pub(crate) enum Request {
    /// Process an event; reply with the status published by its cycle.
    Event {
        event: RouteEvent,
        reply: Option<oneshot::Sender<Result<StatusEvent>>>,
    },
    /// Tear the session down and stop the task.
    Shutdown { reply: oneshot::Sender<Result<()>> },
}

/// Handle for communicating with the dispatcher task.
pub(crate) struct DispatcherHandle {
    pub tx: mpsc::Sender<Request>,
    pub cancel: CancellationToken,
    pub reply_timeout: Duration,
    pub _task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Queue an event and wait for its cycle to publish.
    pub async fn dispatch(&self, event: RouteEvent) -> Result<StatusEvent> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Event {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| Error::NotRunning)?;

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::NotRunning),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Queue an event without waiting. Never blocks.
    pub fn post(&self, event: RouteEvent) -> Result<()> {
        self.tx
            .try_send(Request::Event { event, reply: None })
            .map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull,
                TrySendError::Closed(_) => Error::NotRunning,
            })
    }

    /// Request graceful shutdown of the dispatcher task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Request::Shutdown { reply: reply_tx })
            .await
            .is_err()
        {
            self.cancel.cancel();
            return Ok(());
        }

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) | Err(_) => {
                self.cancel.cancel();
                Ok(())
            }
        }
    }
}

/// Outbound status channels.
pub(crate) struct Publisher {
    pub status_tx: watch::Sender<StatusEvent>,
    pub event_tx: broadcast::Sender<StatusEvent>,
}

impl Publisher {
    /// Publish `status` as one batch. Unchanged status is only re-sent when
    /// `force` is set (a route command ran this cycle).
    fn publish(&self, status: StatusEvent, force: bool) {
        let changed = *self.status_tx.borrow() != status;
        if !changed && !force {
            trace!("status unchanged, not publishing");
            return;
        }
        self.status_tx.send_replace(status);
        let _ = self.event_tx.send(status);
        debug!(?status, "status published");
    }
}

/// State owned by the dispatcher task.
pub(crate) struct Dispatcher {
    tracker: DeviceStateTracker,
    executor: RouteCommandExecutor,
    driver: Arc<dyn AudioSessionDriver>,
    calls: Arc<dyn CallControl>,
    publisher: Publisher,
    phase: CallPhase,
    peripheral_enabled: bool,
    command_ran: bool,
}

impl Dispatcher {
    pub fn new(
        driver: Arc<dyn AudioSessionDriver>,
        calls: Arc<dyn CallControl>,
        publisher: Publisher,
        peripheral_enabled: bool,
    ) -> Self {
        Self {
            tracker: DeviceStateTracker::new(),
            executor: RouteCommandExecutor::new(driver.clone()),
            driver,
            calls,
            publisher,
            phase: CallPhase::Idle,
            peripheral_enabled,
            command_ran: false,
        }
    }

    /// Initial refresh and publish, before the task starts taking events.
    pub fn prime(&mut self) -> StatusEvent {
        self.refresh();
        let status = self.tracker.status();
        self.publisher.publish(status, true);
        status
    }

    /// Run one unit of work: react to `event`, then publish.
    async fn run_cycle(&mut self, event: RouteEvent) -> Result<StatusEvent> {
        self.command_ran = false;
        let outcome = self.handle(event).await;

        let states = self.tracker.states();
        debug_assert!(states.enabled_count() <= 1, "{states:?}");
        let status = states.status();
        self.publisher.publish(status, self.command_ran);
        outcome.map(|()| status)
    }

    async fn handle(&mut self, event: RouteEvent) -> Result<()> {
        debug!(?event, phase = ?self.phase, "handling route event");
        match event {
            RouteEvent::RouteChanged(reason) => self.on_route_change(reason),
            RouteEvent::RadioPower(power) => self.on_radio_power(power),
            RouteEvent::InterruptionBegan => self.on_interruption_began().await,
            RouteEvent::InterruptionEnded => {
                // The paused call is left for the user to resume.
                debug!("interruption ended");
            }
            RouteEvent::CallState(state) => self.on_call_phase(state.phase()),
            RouteEvent::OutputRequested(request) => return self.on_output_request(request),
            RouteEvent::Refresh => {
                self.refresh();
            }
        }
        Ok(())
    }

    fn on_route_change(&mut self, reason: RouteChangeReason) {
        match reason {
            RouteChangeReason::NewDeviceAvailable => {
                let route = self.refresh();
                match route.first_output() {
                    Some(PortKind::Headphones) => self.route_to(AudioDevice::Headphones),
                    Some(kind) if kind.is_bluetooth() => self.route_to(AudioDevice::Bluetooth),
                    other => debug!(output = ?other, "new device is not an accessory output"),
                }
                self.refresh();
            }
            RouteChangeReason::OldDeviceUnavailable {
                previous_output: Some(PortKind::Headphones),
            } => {
                self.refresh();
                if self.tracker.states().bluetooth.connected {
                    self.route_to(AudioDevice::Bluetooth);
                } else {
                    self.route_to(AudioDevice::Receiver);
                }
                self.refresh();
            }
            RouteChangeReason::OldDeviceUnavailable {
                previous_output: Some(kind),
            } if kind.is_bluetooth() => {
                self.refresh();
                if self.tracker.states().headphones.connected {
                    self.route_to(AudioDevice::Headphones);
                } else {
                    self.route_to(AudioDevice::Receiver);
                }
                self.refresh();
            }
            _ => {
                self.refresh();
            }
        }
    }

    fn on_radio_power(&mut self, power: RadioPower) {
        self.peripheral_enabled = power == RadioPower::On;
        self.refresh();
        if matches!(power, RadioPower::On | RadioPower::Off) {
            self.reroute();
            self.refresh();
        }
    }

    async fn on_interruption_began(&mut self) {
        let Some(call) = self.calls.current_call() else {
            return;
        };
        if !call.phase.is_streaming() {
            debug!(phase = ?call.phase, "interruption began, call not streaming");
            return;
        }
        info!(call = call.handle.0, "interruption began, pausing call");
        if let Err(e) = self.calls.pause(call.handle).await {
            warn!(call = call.handle.0, "failed to pause call: {e}");
        }
    }

    fn on_call_phase(&mut self, phase: CallPhase) {
        if matches!(phase, CallPhase::Paused | CallPhase::Ended) {
            let remaining = self.calls.calls_count();
            if remaining > 0 {
                // The route stays with whichever call the engine now focuses.
                self.phase = self.calls.current_call().map_or(phase, |c| c.phase);
                debug!(
                    ?phase,
                    remaining,
                    current = ?self.phase,
                    "calls remain, keeping route"
                );
                return;
            }
            if phase == CallPhase::Ended {
                self.command_ran = true;
                if let Err(e) = self.driver.set_mode(SessionMode::Default) {
                    warn!("failed to reset session mode: {e}");
                }
            }
        }
        self.phase = phase;
        self.refresh();
        self.reroute();
        self.refresh();
    }

    fn on_output_request(&mut self, request: OutputRequest) -> Result<()> {
        self.refresh();
        let target = decision::decide(&self.tracker.states(), self.phase, Some(request))
            .inspect_err(|e| debug!(?request, "output request rejected: {e}"))?;
        self.command_ran = true;
        let result = self
            .executor
            .apply(target, &mut self.tracker, self.phase)
            .map(|_| ());
        self.refresh();
        result
    }

    /// Apply the priority decision for the current phase.
    fn reroute(&mut self) {
        match decision::decide(&self.tracker.states(), self.phase, None) {
            Ok(target) => self.route_to(target),
            Err(e) => debug!("no route decided: {e}"),
        }
    }

    fn route_to(&mut self, target: AudioDevice) {
        self.command_ran = true;
        match self.executor.apply(target, &mut self.tracker, self.phase) {
            Ok(outcome) => debug!(device = %target, ?outcome, "route command done"),
            Err(e @ Error::Precondition { .. }) => debug!(device = %target, "route skipped: {e}"),
            Err(e) => warn!(device = %target, "route command failed: {e}"),
        }
    }

    /// Refresh the tracker and return the snapshot it saw.
    fn refresh(&mut self) -> RouteSnapshot {
        let route = self.driver.current_route();
        let available = self.driver.available_inputs();
        self.tracker
            .refresh(&route, &available, self.peripheral_enabled);
        route
    }

    /// Deactivate the session and return to the initial state.
    fn teardown(&mut self) {
        if let Err(e) = self.driver.activate(false) {
            warn!("failed to deactivate audio session: {e}");
        }
        self.tracker.reset();
        self.phase = CallPhase::Idle;
        self.publisher.publish(self.tracker.status(), true);
        info!("audio session torn down");
    }
}

/// Spawn the dispatcher task.
pub(crate) fn spawn_dispatcher(
    dispatcher: Dispatcher,
    queue_capacity: usize,
    reply_timeout: Duration,
) -> DispatcherHandle {
    let (tx, rx) = mpsc::channel::<Request>(queue_capacity);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(dispatch_loop(dispatcher, rx, cancel.clone()));

    DispatcherHandle {
        tx,
        cancel,
        reply_timeout,
        _task: task,
    }
}

/// The main dispatch loop.
async fn dispatch_loop(
    mut dispatcher: Dispatcher,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    debug!("dispatcher started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("dispatcher cancelled");
                break;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Shutdown { reply }) => {
                        debug!("dispatcher shutdown requested");
                        dispatcher.teardown();
                        let _ = reply.send(Ok(()));
                        return;
                    }
                    Some(Request::Event { event, reply }) => {
                        let result = dispatcher.run_cycle(event).await;
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    }
                    None => {
                        debug!("channel closed");
                        break;
                    }
                }
            }
        }
    }

    dispatcher.teardown();
    debug!("dispatcher exiting");
}
