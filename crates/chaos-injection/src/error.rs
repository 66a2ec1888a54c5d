//! Attack and injection errors

use chaos_core::FailureState;

/// Error raised by an attack or the attack registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttackError {
    /// Applying the attack failed
    #[error("attack {kind}: apply failed: {reason}")]
    Apply {
        /// Attack kind
        kind: String,
        /// Failure detail
        reason: String,
    },

    /// Reverting the attack failed
    #[error("attack {kind}: revert failed: {reason}")]
    Revert {
        /// Attack kind
        kind: String,
        /// Failure detail
        reason: String,
    },

    /// The attack worker panicked or was aborted
    #[error("attack {kind}: worker aborted")]
    Aborted {
        /// Attack kind
        kind: String,
    },

    /// Options rejected by the attack creator
    #[error("attack {kind}: invalid options: {reason}")]
    InvalidOptions {
        /// Attack kind
        kind: String,
        /// Validation detail
        reason: String,
    },

    /// No creator registered for the kind
    #[error("attack {0} is not registered")]
    NotRegistered(String),

    /// A creator is already registered for the kind
    #[error("attack {0} is already registered")]
    AlreadyRegistered(String),
}

impl AttackError {
    /// Apply failure
    #[inline]
    #[must_use]
    pub fn apply(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Apply {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    /// Revert failure
    #[inline]
    #[must_use]
    pub fn revert(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Revert {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised by an injection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectionError {
    /// `fail` called outside the enabled state
    #[error("invalid state. The only valid state for execution is: enabled")]
    InvalidState {
        /// State at the time of the call
        current: FailureState,
    },

    /// Some attacks failed to apply; the applied ones were reverted
    #[error("error aplying failure")]
    Apply {
        /// Apply errors
        errors: Vec<AttackError>,
    },

    /// Some attacks failed to apply and reverting the applied ones failed too
    #[error("error aplying failure & error when trying to revert the applied ones")]
    ApplyAndRevert {
        /// Apply errors
        apply_errors: Vec<AttackError>,
        /// Revert errors
        revert_errors: Vec<AttackError>,
    },

    /// Reverting failed; messages joined with `"; "`
    #[error("{0}")]
    Revert(String),

    /// An attack could not be built
    #[error(transparent)]
    Attack(#[from] AttackError),
}

impl InjectionError {
    /// Whether the error may have left side effects behind
    #[inline]
    #[must_use]
    pub fn needs_cleanup(&self) -> bool {
        matches!(self, Self::ApplyAndRevert { .. } | Self::Revert(_))
    }

    /// Join revert errors the way [`InjectionError::Revert`] reports them
    #[must_use]
    pub fn joined(errors: &[AttackError]) -> String {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
