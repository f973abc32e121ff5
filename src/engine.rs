use tokio::sync::{broadcast, watch};

use crate::dispatcher::DispatcherHandle;
use crate::error::Result;
use crate::event::{RouteEvent, StatusEvent};
use crate::types::OutputRequest;

/// A running audio-route reconciliation engine.
///
/// Created via [`RouteEngineBuilder`](crate::RouteEngineBuilder). All events
/// are processed one at a time by a background task; this handle only
/// queues them and reads what that task has published.
pub struct RouteEngine {
    pub(crate) dispatcher: DispatcherHandle,
    pub(crate) status_rx: watch::Receiver<StatusEvent>,
    pub(crate) event_tx: broadcast::Sender<StatusEvent>,
}

impl RouteEngine {
    /// Submit an event and wait until its cycle has published.
    ///
    /// Returns the status published at the end of the cycle. Route command
    /// failures during automatic reactions are logged, not returned.
    pub async fn dispatch(&self, event: RouteEvent) -> Result<StatusEvent> {
        self.dispatcher.dispatch(event).await
    }

    /// Submit an event without waiting.
    ///
    /// Safe to call from synchronous platform callbacks. Fails with
    /// [`Error::QueueFull`](crate::Error::QueueFull) rather than blocking.
    pub fn post(&self, event: RouteEvent) -> Result<()> {
        self.dispatcher.post(event)
    }

    /// Ask for the loudspeaker or the earpiece.
    ///
    /// Rejected with [`Error::Precondition`](crate::Error::Precondition)
    /// while a Bluetooth or wired accessory is connected.
    pub async fn request_output(&self, request: OutputRequest) -> Result<StatusEvent> {
        self.dispatch(RouteEvent::OutputRequested(request)).await
    }

    /// Re-read the driver route without issuing any route command.
    pub async fn refresh(&self) -> Result<StatusEvent> {
        self.dispatch(RouteEvent::Refresh).await
    }

    /// The last published status.
    pub fn status(&self) -> StatusEvent {
        *self.status_rx.borrow()
    }

    /// Watch the last published status.
    pub fn watch_status(&self) -> watch::Receiver<StatusEvent> {
        self.status_rx.clone()
    }

    /// Subscribe to every published status batch.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.event_tx.subscribe()
    }

    /// Deactivate the audio session and stop the engine.
    pub async fn close(&self) -> Result<()> {
        self.dispatcher.shutdown().await
    }
}
