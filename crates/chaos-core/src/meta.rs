//! Type and object metadata
//!
//! Every resource carries a [`TypeMeta`] (`version` + `kind`) and an
//! [`ObjectMeta`]. The triple `(version, kind, id)` is globally unique and
//! joined with `/` it forms the full ID used as storage and index key.

use crate::error::ObjectError;
use crate::labels::{validate_labels, Labels};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// API version shared by all built-in resources
pub const API_VERSION: &str = "chaos/v1";

/// Kind discriminator for [`crate::Node`]
pub const NODE_KIND: &str = "node";

/// Kind discriminator for [`crate::Failure`]
pub const FAILURE_KIND: &str = "failure";

/// Kind discriminator for [`crate::Experiment`]
pub const EXPERIMENT_KIND: &str = "experiment";

/// Kind and version of a resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeMeta {
    /// Kind discriminator, e.g. `failure`
    pub kind: String,
    /// API group/version, e.g. `chaos/v1`
    pub version: String,
}

impl TypeMeta {
    /// Create type metadata
    #[inline]
    #[must_use]
    pub fn new(version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: version.into(),
        }
    }

    /// `chaos/v1` node type
    #[must_use]
    pub fn node() -> Self {
        Self::new(API_VERSION, NODE_KIND)
    }

    /// `chaos/v1` failure type
    #[must_use]
    pub fn failure() -> Self {
        Self::new(API_VERSION, FAILURE_KIND)
    }

    /// `chaos/v1` experiment type
    #[must_use]
    pub fn experiment() -> Self {
        Self::new(API_VERSION, EXPERIMENT_KIND)
    }

    /// Full type path, `<version>/<kind>`
    #[inline]
    #[must_use]
    pub fn full_type(&self) -> String {
        format!("{}/{}", self.version, self.kind)
    }
}

impl fmt::Display for TypeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.version, self.kind)
    }
}

/// Object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Unique within a `(version, kind)` scope
    pub id: String,
    /// Label map used by selectors
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    /// Free-form annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Owning node for node-scoped resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl ObjectMeta {
    /// Create metadata with an ID and no labels
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// With a label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// With all labels replaced
    #[inline]
    #[must_use]
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// With an owning node
    #[inline]
    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Validate ID and labels
    ///
    /// # Errors
    /// Returns `ObjectError::Validation` for an empty ID, an ID with a
    /// character outside `[A-Za-z0-9._-]`, or invalid label keys/values.
    pub fn validate(&self) -> Result<(), ObjectError> {
        if self.id.is_empty() {
            return Err(ObjectError::validation("metadata id must not be empty"));
        }
        if self.id.contains('/') {
            return Err(ObjectError::validation(format!(
                "metadata id {:?} must not contain '/'",
                self.id
            )));
        }
        if let Some(c) = self
            .id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ObjectError::validation(format!(
                "metadata id {:?} contains invalid character {c:?}",
                self.id
            )));
        }
        validate_labels(&self.labels)
    }
}

/// Build a full ID from its parts
#[inline]
#[must_use]
pub fn get_full_id(version: &str, kind: &str, id: &str) -> String {
    format!("{version}/{kind}/{id}")
}

/// Build a full ID from type metadata and an object ID
#[inline]
#[must_use]
pub fn get_full_id_from_type(type_meta: &TypeMeta, id: &str) -> String {
    get_full_id(&type_meta.version, &type_meta.kind, id)
}

/// Split a full ID into type metadata and object ID
///
/// The version may itself contain `/` (`chaos/v1`), so the kind and ID are
/// taken from the right.
///
/// # Errors
/// Returns `ObjectError::InvalidFullId` if any of the three parts is missing
/// or empty.
pub fn split_full_id(full_id: &str) -> Result<(TypeMeta, String), ObjectError> {
    let mut parts = full_id.rsplitn(3, '/');
    let id = parts.next().unwrap_or_default();
    let kind = parts.next().unwrap_or_default();
    let version = parts.next().unwrap_or_default();

    if id.is_empty() || kind.is_empty() || version.is_empty() {
        return Err(ObjectError::InvalidFullId(full_id.to_string()));
    }

    Ok((TypeMeta::new(version, kind), id.to_string()))
}
