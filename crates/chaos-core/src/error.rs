//! Error types for the resource model
//!
//! Covers:
//! - Malformed full IDs
//! - Attack list shape violations
//! - Label and metadata validation
//! - Encoding/decoding through the type registry

/// Error message for a decoded attack list element that is not a single-entry map
pub const ATTACKS_FORMAT_ERROR: &str = "attacks format error, tip: check identantion and '-' indicator";

/// Error message for a rendered attack map that is not a single-entry map
pub const ATTACK_MAP_SHAPE_ERROR: &str = "each attack map of the attack list needs to be a single map";

/// Resource model error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    /// Full ID does not have the `<version>/<kind>/<id>` shape
    #[error("invalid full id: {0}")]
    InvalidFullId(String),

    /// An attack list element decoded from the wire has zero or several keys
    #[error("attacks format error, tip: check identantion and '-' indicator")]
    AttacksFormat,

    /// An attack map in a failure definition has zero or several keys
    #[error("each attack map of the attack list needs to be a single map")]
    AttackMapShape,

    /// Object failed validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// No decoder registered for the type
    #[error("unknown type: {version}/{kind}")]
    UnknownType {
        /// Object version
        version: String,
        /// Object kind
        kind: String,
    },

    /// Serialization or deserialization failure
    #[error("codec error: {0}")]
    Codec(String),
}

impl ObjectError {
    /// Create a validation error
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if the error is a validation failure
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::AttacksFormat | Self::AttackMapShape
        )
    }
}

impl From<serde_json::Error> for ObjectError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value.to_string())
    }
}

impl From<serde_yaml::Error> for ObjectError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Codec(value.to_string())
    }
}
