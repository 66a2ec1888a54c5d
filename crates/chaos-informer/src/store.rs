//! Indexed object cache
//!
//! Maps an index key, computed by an injected [`ObjectIndexKeyer`], to the
//! latest known state of an object. `add` and `update` are the same
//! operation: both (re)insert under the computed key.

use crate::error::StoreError;
use chaos_core::{Object, SharedObject};
use dashmap::DashMap;
use std::sync::Arc;

/// Computes the index key of an object
pub type ObjectIndexKeyer = Arc<dyn Fn(&dyn Object) -> Result<String, StoreError> + Send + Sync>;

/// Keyer indexing objects by full ID
#[must_use]
pub fn full_id_keyer() -> ObjectIndexKeyer {
    Arc::new(|object: &dyn Object| Ok(object.full_id()))
}

/// Concurrent map from index key to latest object state
pub struct IndexedStore {
    objects: DashMap<String, SharedObject>,
    keyer: ObjectIndexKeyer,
}

impl Default for IndexedStore {
    fn default() -> Self {
        Self::with_keyer(full_id_keyer())
    }
}

impl std::fmt::Debug for IndexedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedStore")
            .field("len", &self.objects.len())
            .finish_non_exhaustive()
    }
}

impl IndexedStore {
    /// Create a store keyed by full ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a custom keyer
    #[inline]
    #[must_use]
    pub fn with_keyer(keyer: ObjectIndexKeyer) -> Self {
        Self {
            objects: DashMap::new(),
            keyer,
        }
    }

    /// Index key of an object
    ///
    /// # Errors
    /// Returns `StoreError::Key` if the keyer rejects the object.
    pub fn key_of(&self, object: &dyn Object) -> Result<String, StoreError> {
        (self.keyer)(object)
    }

    /// Insert an object under its key
    ///
    /// # Errors
    /// Returns `StoreError::Key` if the object cannot be keyed.
    pub fn add(&self, object: SharedObject) -> Result<String, StoreError> {
        let key = self.key_of(object.as_ref())?;
        self.objects.insert(key.clone(), object);
        Ok(key)
    }

    /// Replace an object under its key, inserting it if absent
    ///
    /// # Errors
    /// Returns `StoreError::Key` if the object cannot be keyed.
    #[inline]
    pub fn update(&self, object: SharedObject) -> Result<String, StoreError> {
        self.add(object)
    }

    /// Stored state of an object, by the object's own key
    ///
    /// `Ok(None)` is the normal not-found case.
    ///
    /// # Errors
    /// Returns `StoreError::Key` if the object cannot be keyed.
    pub fn get(&self, object: &dyn Object) -> Result<Option<SharedObject>, StoreError> {
        let key = self.key_of(object)?;
        Ok(self.get_by_key(&key))
    }

    /// Stored object under a key
    #[must_use]
    pub fn get_by_key(&self, key: &str) -> Option<SharedObject> {
        self.objects.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove an object; absent keys are ignored
    ///
    /// # Errors
    /// Returns `StoreError::Key` if the object cannot be keyed.
    pub fn delete(&self, object: &dyn Object) -> Result<String, StoreError> {
        let key = self.key_of(object)?;
        self.objects.remove(&key);
        Ok(key)
    }

    /// All keys currently stored
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
