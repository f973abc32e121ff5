//! Collaborator traits consumed by the route engine.

use async_trait::async_trait;

use crate::error::{DriverError, Result};
use crate::types::{
    CallHandle, CallInfo, OutputOverride, PortDescriptor, RouteSnapshot, SessionCategory,
    SessionMode,
};

/// Platform audio-session driver.
///
/// Calls are synchronous and expected to return quickly. Implementations
/// report failures as [`DriverError`]; the engine never retries them.
pub trait AudioSessionDriver: Send + Sync {
    /// Activate or deactivate the audio session.
    fn activate(&self, active: bool) -> std::result::Result<(), DriverError>;

    fn set_category(&self, category: SessionCategory) -> std::result::Result<(), DriverError>;

    fn set_mode(&self, mode: SessionMode) -> std::result::Result<(), DriverError>;

    fn set_preferred_sample_rate(&self, hz: u32) -> std::result::Result<(), DriverError>;

    /// Select the preferred input port (which also steers the output on
    /// accessories that carry both).
    fn set_preferred_input(&self, port: &PortDescriptor) -> std::result::Result<(), DriverError>;

    /// Force the output to the loudspeaker, or clear a previous override.
    fn override_output(&self, output: OutputOverride) -> std::result::Result<(), DriverError>;

    /// The active route, queried fresh.
    fn current_route(&self) -> RouteSnapshot;

    /// Inputs the session could switch to right now.
    fn available_inputs(&self) -> Vec<PortDescriptor>;
}

/// The SIP call engine, as far as routing needs it.
///
/// The route engine only ever reads call state and asks for a pause.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// The call currently in focus, if any.
    fn current_call(&self) -> Option<CallInfo>;

    /// Number of calls that still exist in the call engine.
    fn calls_count(&self) -> usize;

    /// Put a call on hold.
    async fn pause(&self, call: CallHandle) -> Result<()>;
}
