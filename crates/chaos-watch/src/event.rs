//! Watch events

use chaos_core::SharedObject;
use std::fmt;

/// Kind of change carried by an [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Object was created
    Added,
    /// Object was replaced
    Updated,
    /// Object was removed
    Deleted,
    /// Watch-level error
    Error,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "ADDED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Immutable snapshot of one mutation
#[derive(Debug, Clone)]
pub struct Event {
    /// Kind of change
    pub event_type: EventType,
    /// Object state after the change (before it, for deletions)
    pub object: SharedObject,
}

impl Event {
    /// Create an event
    #[inline]
    #[must_use]
    pub fn new(event_type: EventType, object: SharedObject) -> Self {
        Self { event_type, object }
    }

    /// `Added` event
    #[inline]
    #[must_use]
    pub fn added(object: SharedObject) -> Self {
        Self::new(EventType::Added, object)
    }

    /// `Updated` event
    #[inline]
    #[must_use]
    pub fn updated(object: SharedObject) -> Self {
        Self::new(EventType::Updated, object)
    }

    /// `Deleted` event
    #[inline]
    #[must_use]
    pub fn deleted(object: SharedObject) -> Self {
        Self::new(EventType::Deleted, object)
    }
}
