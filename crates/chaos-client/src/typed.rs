//! Typed view over a repository

use crate::error::ClientError;
use crate::options::ListOptions;
use crate::repository::Repository;
use chaos_core::{downcast, get_full_id_from_type, Labels, Object, SharedObject, TypeMeta};
use chaos_watch::Watcher;
use std::marker::PhantomData;
use std::sync::Arc;

/// Repository client bound to one resource type
pub struct ResourceClient<T> {
    repository: Arc<dyn Repository>,
    type_meta: TypeMeta,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            type_meta: self.type_meta.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for ResourceClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("type_meta", &self.type_meta)
            .finish_non_exhaustive()
    }
}

impl<T: Object + Clone> ResourceClient<T> {
    /// Bind a repository to a type
    #[inline]
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>, type_meta: TypeMeta) -> Self {
        Self {
            repository,
            type_meta,
            _marker: PhantomData,
        }
    }

    /// Underlying repository
    #[inline]
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Bound type
    #[inline]
    #[must_use]
    pub fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    /// Full ID of an object of the bound type
    #[inline]
    #[must_use]
    pub fn full_id(&self, id: &str) -> String {
        get_full_id_from_type(&self.type_meta, id)
    }

    fn cast(&self, object: &SharedObject) -> Result<T, ClientError> {
        downcast::<T>(object.as_ref()).ok_or_else(|| ClientError::TypeMismatch {
            full_id: object.full_id(),
            expected: self.type_meta.full_type(),
        })
    }

    /// Create an object
    ///
    /// # Errors
    /// Propagates repository errors.
    pub async fn create(&self, object: T) -> Result<T, ClientError> {
        let stored = self.repository.create(Arc::new(object)).await?;
        self.cast(&stored)
    }

    /// Replace an object
    ///
    /// # Errors
    /// Propagates repository errors.
    pub async fn update(&self, object: T) -> Result<T, ClientError> {
        let stored = self.repository.update(Arc::new(object)).await?;
        self.cast(&stored)
    }

    /// Replace an object only while the stored copy still equals `current`
    ///
    /// # Errors
    /// Returns `ClientError::Conflict` when the stored object moved on.
    pub async fn update_if_unchanged(&self, current: T, object: T) -> Result<T, ClientError> {
        let stored = self
            .repository
            .update_if_unchanged(Arc::new(current), Arc::new(object))
            .await?;
        self.cast(&stored)
    }

    /// Delete an object by ID
    ///
    /// # Errors
    /// Propagates repository errors.
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.repository.delete(&self.full_id(id)).await
    }

    /// Fetch an object by ID
    ///
    /// # Errors
    /// Returns `ClientError::NotFound` if absent.
    pub async fn get(&self, id: &str) -> Result<T, ClientError> {
        let object = self.repository.get(&self.full_id(id)).await?;
        self.cast(&object)
    }

    /// List objects matching a selector
    ///
    /// # Errors
    /// Propagates repository errors.
    pub async fn list(&self, selector: &Labels) -> Result<Vec<T>, ClientError> {
        let options = ListOptions::new(self.type_meta.clone()).with_selector(selector.clone());
        let list = self.repository.list(&options).await?;
        list.items.iter().map(|item| self.cast(item)).collect()
    }

    /// Watch objects matching a selector
    ///
    /// # Errors
    /// Propagates repository errors.
    pub async fn watch(&self, selector: &Labels) -> Result<Watcher, ClientError> {
        let options = ListOptions::new(self.type_meta.clone()).with_selector(selector.clone());
        self.repository.watch(&options).await
    }
}
