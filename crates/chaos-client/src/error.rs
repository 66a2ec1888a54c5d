//! Client errors

use chaos_core::ObjectError;
use chaos_watch::WatchError;

/// Repository client error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Create on an ID that is already stored
    #[error("object {0} already exists")]
    AlreadyExists(String),

    /// Get/Update on an ID that is not stored
    #[error("object {0} not found")]
    NotFound(String),

    /// The stored object changed since the caller read it
    #[error("object {0} was modified concurrently")]
    Conflict(String),

    /// The stored object is not of the requested type
    #[error("object {full_id} is not a {expected}")]
    TypeMismatch {
        /// Full ID of the offending object
        full_id: String,
        /// Requested full type path
        expected: String,
    },

    /// Malformed object or ID
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// Watch registration failed
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Backend transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Check if the error reports a missing object
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the error reports a concurrent modification
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if the error is a validation failure of the submitted object
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Object(e) if e.is_validation())
    }

    /// Check if retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Watch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(ClientError::NotFound("x".into()).is_not_found());
        assert!(ClientError::Conflict("x".into()).is_conflict());
        assert!(!ClientError::Conflict("x".into()).is_retryable());
        assert!(ClientError::from(ObjectError::validation("bad")).is_validation());
        assert!(ClientError::Transport("reset".into()).is_retryable());
        assert!(!ClientError::AlreadyExists("x".into()).is_retryable());
    }
}
