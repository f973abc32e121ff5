//! RouteEngineBuilder: configure the audio session and start the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, Publisher, spawn_dispatcher};
use crate::driver::{AudioSessionDriver, CallControl};
use crate::engine::RouteEngine;
use crate::event::StatusEvent;
use crate::types::SessionCategory;

/// Builder for a [`RouteEngine`].
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use callroute::{MockCalls, MockDriver, RouteEngineBuilder};
/// # async fn example() {
/// let engine = RouteEngineBuilder::new()
///     .preferred_sample_rate(16_000)
///     .start(Arc::new(MockDriver::new()), Arc::new(MockCalls::new()))
///     .await;
/// # }
/// ```
pub struct RouteEngineBuilder {
    preferred_sample_rate: u32,
    allow_bluetooth: bool,
    activate_on_start: bool,
    peripheral_enabled: bool,
    queue_capacity: usize,
    event_capacity: usize,
    reply_timeout: Duration,
}

impl RouteEngineBuilder {
    pub fn new() -> Self {
        Self {
            preferred_sample_rate: 48_000,
            allow_bluetooth: true,
            activate_on_start: true,
            peripheral_enabled: false,
            queue_capacity: 32,
            event_capacity: 64,
            reply_timeout: Duration::from_secs(5),
        }
    }

    /// Preferred hardware sample rate in Hz (default: 48000).
    pub fn preferred_sample_rate(mut self, hz: u32) -> Self {
        self.preferred_sample_rate = hz;
        self
    }

    /// Whether the session category allows Bluetooth accessories (default: true).
    pub fn allow_bluetooth(mut self, allow: bool) -> Self {
        self.allow_bluetooth = allow;
        self
    }

    /// Whether to activate the audio session on start (default: true).
    pub fn activate_on_start(mut self, activate: bool) -> Self {
        self.activate_on_start = activate;
        self
    }

    /// Radio power flag until the first radio event arrives (default: false).
    pub fn peripheral_enabled(mut self, enabled: bool) -> Self {
        self.peripheral_enabled = enabled;
        self
    }

    /// Capacity of the inbound event queue (default: 32).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Capacity of the status broadcast channel (default: 64).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// How long handle calls wait for the dispatcher to reply (default: 5s).
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Configure the session and spawn the dispatcher.
    ///
    /// Driver failures during configuration are logged and do not prevent
    /// the engine from starting.
    pub async fn start(
        self,
        driver: Arc<dyn AudioSessionDriver>,
        calls: Arc<dyn CallControl>,
    ) -> RouteEngine {
        self.configure_session(driver.as_ref());

        let (status_tx, status_rx) = watch::channel(StatusEvent::default());
        let (event_tx, _) = broadcast::channel::<StatusEvent>(self.event_capacity);
        let publisher = Publisher {
            status_tx,
            event_tx: event_tx.clone(),
        };

        let mut dispatcher = Dispatcher::new(driver, calls, publisher, self.peripheral_enabled);
        let status = dispatcher.prime();
        info!(?status, "route engine started");

        let dispatcher = spawn_dispatcher(dispatcher, self.queue_capacity, self.reply_timeout);

        RouteEngine {
            dispatcher,
            status_rx,
            event_tx,
        }
    }

    fn configure_session(&self, driver: &dyn AudioSessionDriver) {
        let category = SessionCategory::PlayAndRecord {
            allow_bluetooth: self.allow_bluetooth,
        };
        debug!(?category, "configuring audio session");
        if let Err(e) = driver.set_category(category) {
            warn!("failed to set session category: {e}");
        }
        if let Err(e) = driver.set_preferred_sample_rate(self.preferred_sample_rate) {
            warn!(
                hz = self.preferred_sample_rate,
                "failed to set preferred sample rate: {e}"
            );
        }
        if self.activate_on_start {
            if let Err(e) = driver.activate(true) {
                warn!("failed to activate audio session: {e}");
            }
        }
    }
}

impl Default for RouteEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
