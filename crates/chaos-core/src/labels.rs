//! Labels and label selectors
//!
//! A selector is a plain label map: every key must be present in the target
//! labels with an equal value. An empty selector matches everything.

use crate::error::ObjectError;
use std::collections::BTreeMap;

/// Label map
pub type Labels = BTreeMap<String, String>;

/// Label linking a failure to its experiment
pub const EXPERIMENT_LABEL: &str = "experiment";

/// Label linking a failure to its target node
pub const NODE_LABEL: &str = "node";

/// Maximum length of a label key or value
pub const MAX_LABEL_LEN: usize = 63;

/// Check whether `labels` satisfies `selector`
#[must_use]
pub fn matches_selector(selector: &Labels, labels: &Labels) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Validate every key and value of a label map
///
/// # Errors
/// Returns `ObjectError::Validation` on the first empty, oversized or
/// invalid-character key or value.
pub fn validate_labels(labels: &Labels) -> Result<(), ObjectError> {
    for (key, value) in labels {
        validate_label_part("key", key)?;
        validate_label_part("value", value)?;
    }
    Ok(())
}

/// Validate a string that will be copied into a label value
///
/// # Errors
/// Returns `ObjectError::Validation` if `value` is not a valid label value.
pub fn validate_label_value(value: &str) -> Result<(), ObjectError> {
    validate_label_part("value", value)
}

fn validate_label_part(what: &str, part: &str) -> Result<(), ObjectError> {
    if part.is_empty() {
        return Err(ObjectError::validation(format!("label {what} must not be empty")));
    }
    if part.len() > MAX_LABEL_LEN {
        return Err(ObjectError::validation(format!(
            "label {what} {part:?} exceeds {MAX_LABEL_LEN} characters"
        )));
    }
    if let Some(c) = part
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ObjectError::validation(format!(
            "label {what} {part:?} contains invalid character {c:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::btree_map;
    use proptest::prelude::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn empty_selector_matches_everything() {
        assert!(matches_selector(&Labels::new(), &Labels::new()));
        assert!(matches_selector(&Labels::new(), &labels(&[("kind", "master")])));
    }

    #[test]
    fn selector_requires_equal_values() {
        let selector = labels(&[("kind", "master")]);
        assert!(matches_selector(&selector, &labels(&[("kind", "master"), ("zone", "a")])));
        assert!(!matches_selector(&selector, &labels(&[("kind", "worker")])));
        assert!(!matches_selector(&selector, &labels(&[("zone", "a")])));
    }

    #[test]
    fn label_validation() {
        assert!(validate_labels(&labels(&[("kind", "master")])).is_ok());
        assert!(validate_labels(&labels(&[("kind", "")])).is_err());
        assert!(validate_labels(&labels(&[("bad key", "x")])).is_err());
        let long = "a".repeat(MAX_LABEL_LEN + 1);
        assert!(validate_labels(&labels(&[("k", long.as_str())])).is_err());
    }

    proptest! {
        #[test]
        fn prop_selector_matches_iff_subset(
            selector in btree_map("[a-c]", "[x-z]", 0..3),
            target in btree_map("[a-c]", "[x-z]", 0..3),
        ) {
            let expected = selector.iter().all(|(k, v)| target.get(k) == Some(v));
            prop_assert_eq!(matches_selector(&selector, &target), expected);
        }
    }
}
