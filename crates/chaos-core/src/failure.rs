//! Failure resource: the unit of schedulable work
//!
//! A failure targets one node and carries an ordered list of attacks plus a
//! timeout after which the applied attacks are reverted automatically.

use crate::attack::AttackList;
use crate::codec::{duration_nanos, int_enum_serde};
use crate::error::ObjectError;
use crate::impl_object;
use crate::labels::{EXPERIMENT_LABEL, NODE_LABEL};
use crate::meta::{ObjectMeta, TypeMeta};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Failure lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FailureState {
    /// Not set
    #[default]
    Unknown = 0,
    /// Ready to be executed
    Enabled = 1,
    /// Attacks applied, waiting for revert
    Executing = 2,
    /// Reverting applied attacks
    Reverting = 3,
    /// Reverted or never executed
    Disabled = 4,
    /// Target node vanished
    Stale = 5,
    /// Apply failed, applied attacks reverted cleanly
    Errored = 6,
    /// Revert failed, side effects may remain
    ErroredReverting = 7,
}

int_enum_serde!(FailureState {
    Unknown = 0,
    Enabled = 1,
    Executing = 2,
    Reverting = 3,
    Disabled = 4,
    Stale = 5,
    Errored = 6,
    ErroredReverting = 7,
});

impl FailureState {
    /// All states in declaration order
    pub const ALL: [FailureState; 8] = [
        Self::Unknown,
        Self::Enabled,
        Self::Executing,
        Self::Reverting,
        Self::Disabled,
        Self::Stale,
        Self::Errored,
        Self::ErroredReverting,
    ];

    /// Whether the state ends an injection
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Disabled | Self::Errored | Self::ErroredReverting
        )
    }
}

impl fmt::Display for FailureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Enabled => "enabled",
            Self::Executing => "executing",
            Self::Reverting => "reverting",
            Self::Disabled => "disabled",
            Self::Stale => "stale",
            Self::Errored => "errored",
            Self::ErroredReverting => "errored reverting",
        };
        f.write_str(name)
    }
}

/// What to inject and for how long
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSpec {
    /// Automatic revert timeout
    #[serde(default, with = "duration_nanos")]
    pub timeout: Duration,
    /// Ordered attacks
    #[serde(default)]
    pub attacks: AttackList,
}

impl FailureSpec {
    /// Create a spec
    #[inline]
    #[must_use]
    pub fn new(timeout: Duration, attacks: AttackList) -> Self {
        Self { timeout, attacks }
    }
}

/// Observed and desired failure state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureStatus {
    /// Observed state
    #[serde(default)]
    pub current_state: FailureState,
    /// Desired state
    #[serde(default)]
    pub expected_state: FailureState,
    /// When the failure object was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<DateTime<Utc>>,
    /// When the attacks were applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed: Option<DateTime<Utc>>,
    /// When the revert finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,
}

/// Node-scoped failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: FailureSpec,
    #[serde(default)]
    pub status: FailureStatus,
}

impl Failure {
    /// Create an empty failure
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::failure(),
            metadata: ObjectMeta::new(id),
            spec: FailureSpec::default(),
            status: FailureStatus::default(),
        }
    }

    /// With a spec
    #[inline]
    #[must_use]
    pub fn with_spec(mut self, spec: FailureSpec) -> Self {
        self.spec = spec;
        self
    }

    /// With a label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata = self.metadata.with_label(key, value);
        self
    }

    /// With observed and desired state
    #[inline]
    #[must_use]
    pub fn with_states(mut self, current: FailureState, expected: FailureState) -> Self {
        self.status.current_state = current;
        self.status.expected_state = expected;
        self
    }

    /// Failure ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Owning experiment, from the `experiment` label
    #[inline]
    #[must_use]
    pub fn experiment_id(&self) -> Option<&str> {
        self.metadata.labels.get(EXPERIMENT_LABEL).map(String::as_str)
    }

    /// Target node, from the `node` label
    #[inline]
    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        self.metadata.labels.get(NODE_LABEL).map(String::as_str)
    }

    /// Validate metadata
    ///
    /// # Errors
    /// Returns `ObjectError::Validation` for malformed metadata.
    pub fn validate(&self) -> Result<(), ObjectError> {
        self.metadata.validate()
    }
}

impl_object!(Failure);
