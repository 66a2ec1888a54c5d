//! Experiment resource: a failure template plus a node selector

use crate::error::ObjectError;
use crate::failure::FailureSpec;
use crate::impl_object;
use crate::labels::{validate_label_value, validate_labels, Labels};
use crate::meta::{ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};

/// Desired experiment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    /// Nodes whose labels match receive one failure each
    #[serde(default)]
    pub selector: Labels,
    /// Spec copied into every scheduled failure
    #[serde(default)]
    pub template: FailureSpec,
}

/// Derived experiment status
///
/// Not authoritative: the scheduler discovers failures by their
/// `experiment` label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentStatus {
    /// IDs of failures created for this experiment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_ids: Vec<String>,
}

/// Experiment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ExperimentSpec,
    #[serde(default)]
    pub status: ExperimentStatus,
}

impl Experiment {
    /// Create an experiment with an empty selector
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::experiment(),
            metadata: ObjectMeta::new(id),
            spec: ExperimentSpec::default(),
            status: ExperimentStatus::default(),
        }
    }

    /// With a selector entry
    #[inline]
    #[must_use]
    pub fn with_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.selector.insert(key.into(), value.into());
        self
    }

    /// With a failure template
    #[inline]
    #[must_use]
    pub fn with_template(mut self, template: FailureSpec) -> Self {
        self.spec.template = template;
        self
    }

    /// Experiment ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Validate metadata and selector
    ///
    /// # Errors
    /// Returns `ObjectError::Validation` for malformed metadata or selector.
    pub fn validate(&self) -> Result<(), ObjectError> {
        self.metadata.validate()?;
        // Failures carry the experiment ID as a label value.
        validate_label_value(&self.metadata.id)?;
        validate_labels(&self.spec.selector)
    }
}

impl_object!(Experiment);
