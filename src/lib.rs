//! Audio-route reconciliation for voice and video calls.
//!
//! Accessory, radio-power and call-state events are merged through one
//! serialized dispatcher that refreshes device state, decides a route,
//! drives the audio session and publishes a [`StatusEvent`].

pub mod builder;
pub mod decision;
pub(crate) mod dispatcher;
pub mod driver;
pub mod engine;
pub mod error;
pub mod event;
pub mod executor;
pub mod mock;
pub mod tracker;
pub mod types;

pub use builder::RouteEngineBuilder;
pub use driver::{AudioSessionDriver, CallControl};
pub use engine::RouteEngine;
pub use error::{DriverError, Error, Result};
pub use event::{AccessoryStatus, RouteChangeReason, RouteEvent, SpeakerStatus, StatusEvent};
pub use executor::{CommandOutcome, RouteCommandExecutor};
pub use mock::{DriverCall, MockCalls, MockDriver};
pub use tracker::{DeviceState, DeviceStateTracker, DeviceStates};
pub use types::{
    AudioDevice, CallDirection, CallHandle, CallInfo, CallPhase, CallState, DriverOp,
    OutputOverride, OutputRequest, PortDescriptor, PortKind, RadioPower, RouteSnapshot,
    SessionCategory, SessionMode,
};
