//! Controller errors

use crate::controller::ControllerState;
use chaos_client::ClientError;
use chaos_core::ObjectError;
use chaos_informer::InformerError;
use chaos_injection::InjectionError;

/// Controller, scheduler and agent error
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// `stop` on a controller that is not running
    #[error("controller is not running")]
    NotRunning,

    /// `run` outside the not-running state
    #[error("controller cannot run from state {0}")]
    InvalidState(ControllerState),

    /// A queued key resolved to an object of an unexpected type
    #[error("object {key} has unexpected type {found}")]
    TypeMismatch {
        /// Queue key
        key: String,
        /// Full type of the stored object
        found: String,
    },

    /// Repository call failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Informer stopped with an error
    #[error(transparent)]
    Informer(#[from] InformerError),

    /// Injection could not be built or executed
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// Malformed key or object
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// Background task panicked
    #[error("task failed: {0}")]
    Task(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ControllerError {
    /// Whether requeueing the job may help
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Client(e) => !e.is_validation(),
            Self::Informer(e) => e.is_retryable(),
            Self::TypeMismatch { .. } | Self::Object(_) | Self::Config(_) => false,
            _ => true,
        }
    }
}
