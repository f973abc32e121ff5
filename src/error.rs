use crate::types::{AudioDevice, DriverOp};

/// Errors returned by the route engine.
///
/// None of these are fatal to the audio session: the dispatcher logs them
/// and the next qualifying event re-runs the decision cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A call into the audio session driver failed.
    #[error("audio session {op} failed: {reason}")]
    SessionConfiguration { op: DriverOp, reason: String },

    /// A route was requested that the current device state does not allow.
    #[error("cannot route to {device}: {reason}")]
    Precondition {
        device: AudioDevice,
        reason: &'static str,
    },

    /// The call engine rejected a request.
    #[error("call control error: {0}")]
    CallControl(String),

    /// The dispatcher task is not running.
    #[error("route engine not running")]
    NotRunning,

    /// Timed out waiting for the dispatcher to reply.
    #[error("timed out waiting for route engine")]
    Timeout,

    /// The event queue is full.
    #[error("route event queue full")]
    QueueFull,
}

impl Error {
    pub(crate) fn driver(op: DriverOp, err: DriverError) -> Self {
        Self::SessionConfiguration {
            op,
            reason: err.reason,
        }
    }

    pub(crate) fn precondition(device: AudioDevice, reason: &'static str) -> Self {
        Self::Precondition { device, reason }
    }
}

/// Failure reported by an [`AudioSessionDriver`](crate::AudioSessionDriver)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct DriverError {
    pub reason: String,
}

impl DriverError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
