//! Repository contract and list/watch adapter
//!
//! A [`Repository`] is CRUD plus watch over full-ID addressed objects:
//! - `create` fails if the ID already exists
//! - `update` fails if the ID does not exist and replaces the whole object
//! - `update_if_unchanged` also fails with a conflict once the stored object
//!   differs from the caller's copy
//! - `delete` of an absent object is not an error

use crate::error::ClientError;
use crate::options::ListOptions;
use chaos_core::{ObjectList, SharedObject};
use chaos_watch::Watcher;
use std::sync::Arc;

/// CRUD plus watch over resources
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Store a new object
    async fn create(&self, object: SharedObject) -> Result<SharedObject, ClientError>;

    /// Replace an existing object
    async fn update(&self, object: SharedObject) -> Result<SharedObject, ClientError>;

    /// Replace an existing object only while the stored one still equals `current`
    async fn update_if_unchanged(
        &self,
        current: SharedObject,
        object: SharedObject,
    ) -> Result<SharedObject, ClientError>;

    /// Remove an object by full ID; absent objects are ignored
    async fn delete(&self, full_id: &str) -> Result<(), ClientError>;

    /// Fetch an object by full ID
    async fn get(&self, full_id: &str) -> Result<SharedObject, ClientError>;

    /// List objects in scope of the options
    async fn list(&self, options: &ListOptions) -> Result<ObjectList, ClientError>;

    /// Watch mutations of objects in scope of the options
    async fn watch(&self, options: &ListOptions) -> Result<Watcher, ClientError>;
}

/// Source of initial state and deltas for an informer
#[async_trait::async_trait]
pub trait ListerWatcher: Send + Sync {
    /// Current objects in scope
    async fn list(&self, options: &ListOptions) -> Result<Vec<SharedObject>, ClientError>;

    /// Subsequent mutations of objects in scope
    async fn watch(&self, options: &ListOptions) -> Result<Watcher, ClientError>;
}

/// [`ListerWatcher`] backed by a repository
#[derive(Clone)]
pub struct RepositoryListerWatcher {
    repository: Arc<dyn Repository>,
}

impl RepositoryListerWatcher {
    /// Wrap a repository
    #[inline]
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }
}

impl std::fmt::Debug for RepositoryListerWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryListerWatcher").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ListerWatcher for RepositoryListerWatcher {
    async fn list(&self, options: &ListOptions) -> Result<Vec<SharedObject>, ClientError> {
        Ok(self.repository.list(options).await?.items)
    }

    async fn watch(&self, options: &ListOptions) -> Result<Watcher, ClientError> {
        self.repository.watch(options).await
    }
}
