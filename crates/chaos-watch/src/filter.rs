//! Event filters
//!
//! A filter returns `true` when the event must be **discarded**.

use chaos_core::{matches_selector, Labels, Object, TypeMeta};
use std::fmt::Debug;
use std::sync::Arc;

/// Predicate deciding whether a watcher skips an object
pub trait ObjectFilter: Debug + Send + Sync {
    /// `true` discards the object
    fn filter(&self, object: &dyn Object) -> bool;
}

/// Shared filter handle
pub type SharedFilter = Arc<dyn ObjectFilter>;

/// Never discards
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl ObjectFilter for NoFilter {
    fn filter(&self, _object: &dyn Object) -> bool {
        false
    }
}

/// Discards objects of another `(version, kind)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFilter {
    type_meta: TypeMeta,
}

impl TypeFilter {
    /// Filter on an explicit type
    #[inline]
    #[must_use]
    pub fn new(type_meta: TypeMeta) -> Self {
        Self { type_meta }
    }

    /// Filter on the type of a reference object
    #[inline]
    #[must_use]
    pub fn from_object(reference: &dyn Object) -> Self {
        Self::new(reference.type_meta().clone())
    }
}

impl ObjectFilter for TypeFilter {
    fn filter(&self, object: &dyn Object) -> bool {
        object.type_meta() != &self.type_meta
    }
}

/// Discards objects whose labels do not satisfy the selector
///
/// An empty selector discards nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    selector: Labels,
}

impl LabelFilter {
    /// Filter on a selector
    #[inline]
    #[must_use]
    pub fn new(selector: Labels) -> Self {
        Self { selector }
    }
}

impl ObjectFilter for LabelFilter {
    fn filter(&self, object: &dyn Object) -> bool {
        !matches_selector(&self.selector, &object.metadata().labels)
    }
}

/// Discards when either the type or the label filter discards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptionsFilter {
    type_filter: TypeFilter,
    label_filter: LabelFilter,
}

impl ListOptionsFilter {
    /// Combine a type and a selector
    #[inline]
    #[must_use]
    pub fn new(type_meta: TypeMeta, selector: Labels) -> Self {
        Self {
            type_filter: TypeFilter::new(type_meta),
            label_filter: LabelFilter::new(selector),
        }
    }
}

impl ObjectFilter for ListOptionsFilter {
    fn filter(&self, object: &dyn Object) -> bool {
        self.type_filter.filter(object) || self.label_filter.filter(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_core::{Failure, Node};
    use proptest::collection::btree_map;
    use proptest::prelude::*;

    #[test]
    fn no_filter_keeps_everything() {
        assert!(!NoFilter.filter(&Node::new("n1")));
    }

    #[test]
    fn type_filter_discards_other_types() {
        let filter = TypeFilter::from_object(&Node::new("reference"));
        assert!(!filter.filter(&Node::new("n1")));
        assert!(filter.filter(&Failure::new("f1")));
    }

    #[test]
    fn label_filter_empty_selector_keeps_everything() {
        let filter = LabelFilter::default();
        assert!(!filter.filter(&Node::new("n1")));
        assert!(!filter.filter(&Node::new("n2").with_label("kind", "master")));
    }

    #[test]
    fn list_options_filter_is_or_of_both() {
        let mut selector = Labels::new();
        selector.insert("kind".into(), "master".into());
        let filter = ListOptionsFilter::new(TypeMeta::node(), selector);

        assert!(!filter.filter(&Node::new("n1").with_label("kind", "master")));
        assert!(filter.filter(&Node::new("n2").with_label("kind", "worker")));
        assert!(filter.filter(&Failure::new("f1").with_label("kind", "master")));
    }

    proptest! {
        #[test]
        fn prop_label_filter_discards_unless_subset(
            selector in btree_map("[a-c]", "[x-z]", 0..3),
            labels in btree_map("[a-c]", "[x-z]", 0..3),
        ) {
            let node = Node {
                metadata: chaos_core::ObjectMeta::new("n").with_labels(labels.clone()),
                ..Node::new("n")
            };
            let keep = selector.iter().all(|(k, v)| labels.get(k) == Some(v));
            prop_assert_eq!(LabelFilter::new(selector).filter(&node), !keep);
        }
    }
}
