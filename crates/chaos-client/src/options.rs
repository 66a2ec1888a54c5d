//! List and watch options

use chaos_core::{matches_selector, Labels, Object, TypeMeta};
use chaos_watch::ListOptionsFilter;

/// Type plus label selector scoping a list or watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Only objects of this type
    pub type_meta: TypeMeta,
    /// Only objects whose labels satisfy this selector; empty matches all
    pub label_selector: Labels,
}

impl ListOptions {
    /// All objects of a type
    #[inline]
    #[must_use]
    pub fn new(type_meta: TypeMeta) -> Self {
        Self {
            type_meta,
            label_selector: Labels::new(),
        }
    }

    /// With a selector entry
    #[inline]
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_selector.insert(key.into(), value.into());
        self
    }

    /// With the selector replaced
    #[inline]
    #[must_use]
    pub fn with_selector(mut self, selector: Labels) -> Self {
        self.label_selector = selector;
        self
    }

    /// Whether an object is in scope
    #[must_use]
    pub fn matches(&self, object: &dyn Object) -> bool {
        object.type_meta() == &self.type_meta
            && matches_selector(&self.label_selector, &object.metadata().labels)
    }

    /// Equivalent watch filter
    #[inline]
    #[must_use]
    pub fn filter(&self) -> ListOptionsFilter {
        ListOptionsFilter::new(self.type_meta.clone(), self.label_selector.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_core::{Failure, Node};
    use chaos_watch::ObjectFilter;

    #[test]
    fn matches_agrees_with_filter() {
        let options = ListOptions::new(TypeMeta::node()).with_label("kind", "master");
        let objects: Vec<Box<dyn Object>> = vec![
            Box::new(Node::new("a").with_label("kind", "master")),
            Box::new(Node::new("b").with_label("kind", "worker")),
            Box::new(Failure::new("c").with_label("kind", "master")),
        ];
        let filter = options.filter();
        for object in &objects {
            assert_eq!(options.matches(object.as_ref()), !filter.filter(object.as_ref()));
        }
    }
}
