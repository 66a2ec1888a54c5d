//! Node resource: a fleet member that failures are scheduled onto

use crate::codec::int_enum_serde;
use crate::error::ObjectError;
use crate::impl_object;
use crate::labels::validate_label_value;
use crate::meta::{ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reported node state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum NodeState {
    /// Not reported yet
    #[default]
    Unknown = 0,
    /// Idle and reachable
    Ready = 1,
    /// Applying at least one failure
    Attacking = 2,
    /// Reverting a failure
    Reverting = 3,
    /// Last operation failed
    Errored = 4,
}

int_enum_serde!(NodeState {
    Unknown = 0,
    Ready = 1,
    Attacking = 2,
    Reverting = 3,
    Errored = 4,
});

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Ready => "ready",
            Self::Attacking => "attacking",
            Self::Reverting => "reverting",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Node specification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Address the node agent listens on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Node status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Reported state
    #[serde(default)]
    pub state: NodeState,
}

/// Fleet member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: NodeSpec,
    #[serde(default)]
    pub status: NodeStatus,
}

impl Node {
    /// Create a node in `Unknown` state
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::node(),
            metadata: ObjectMeta::new(id),
            spec: NodeSpec::default(),
            status: NodeStatus::default(),
        }
    }

    /// With a label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata = self.metadata.with_label(key, value);
        self
    }

    /// With a reported state
    #[inline]
    #[must_use]
    pub fn with_state(mut self, state: NodeState) -> Self {
        self.status.state = state;
        self
    }

    /// Node ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Validate metadata
    ///
    /// # Errors
    /// Returns `ObjectError::Validation` for malformed metadata.
    pub fn validate(&self) -> Result<(), ObjectError> {
        self.metadata.validate()?;
        // Failures carry the node ID as a label value.
        validate_label_value(&self.metadata.id)
    }
}

impl_object!(Node);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Object;

    #[test]
    fn node_state_encodes_as_integer() {
        let node = Node::new("node1").with_state(NodeState::Errored);
        let value = node.to_json().unwrap();
        assert_eq!(value["status"]["state"], 4);
        assert_eq!(value["kind"], "node");
        assert_eq!(value["version"], "chaos/v1");
    }

    #[test]
    fn node_state_rejects_out_of_range() {
        let result: Result<NodeState, _> = serde_json::from_str("9");
        assert!(result.is_err());
    }

    #[test]
    fn id_must_fit_a_label_value() {
        assert!(Node::new("node1").validate().is_ok());
        assert!(Node::new("node 1").validate().is_err());
        let long = Node::new("n".repeat(64));
        let err = Object::validate(&long).unwrap_err();
        assert!(err.is_validation());
    }
}
