//! Informer, store and queue errors

use chaos_client::ClientError;
use chaos_watch::EventType;

/// Store keying error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The keyer could not derive an index key
    #[error("cannot compute index key for {full_id}: {reason}")]
    Key {
        /// Full ID of the object being keyed
        full_id: String,
        /// Keyer message
        reason: String,
    },
}

/// Work queue error
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Push after shutdown
    #[error("queue is shut down")]
    ShutDown,

    /// Second shutdown
    #[error("queue is already shut down")]
    AlreadyShutDown,
}

/// Informer error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InformerError {
    /// List or watch call failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Object could not be keyed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Key could not be enqueued
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The watch channel closed while the informer was running
    #[error("watch channel closed")]
    WatchClosed,

    /// An event type the informer does not handle
    #[error("unexpected {event_type} event for {full_id}")]
    UnexpectedEvent {
        /// Received event type
        event_type: EventType,
        /// Object carried by the event
        full_id: String,
    },
}

impl InformerError {
    /// Check if the informer may be restarted with a fresh list/watch
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Client(e) => e.is_retryable(),
            Self::WatchClosed => true,
            _ => false,
        }
    }
}
