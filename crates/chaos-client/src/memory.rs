//! In-memory repository
//!
//! Objects are kept in a full-ID ordered map. Every mutation is broadcast on
//! the multiplexer of the object's type while the map lock is held, so each
//! watcher observes mutations of one object in commit order.

use crate::error::ClientError;
use crate::options::ListOptions;
use crate::repository::Repository;
use chaos_core::{split_full_id, ObjectList, SharedObject};
use chaos_watch::{Event, MultiplexerFactory, Watcher};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Repository holding objects in process memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    objects: RwLock<BTreeMap<String, SharedObject>>,
    factory: MultiplexerFactory,
}

impl MemoryRepository {
    /// Create an empty repository with its own multiplexers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty repository broadcasting on a shared factory
    #[inline]
    #[must_use]
    pub fn with_factory(factory: MultiplexerFactory) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            factory,
        }
    }

    /// Multiplexer factory used for watches
    #[inline]
    #[must_use]
    pub fn factory(&self) -> &MultiplexerFactory {
        &self.factory
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the repository is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Insert objects without validation or events, for seeding
    pub fn seed(&self, objects: impl IntoIterator<Item = SharedObject>) {
        let mut map = self.objects.write();
        for object in objects {
            map.insert(object.full_id(), object);
        }
    }

    fn broadcast(&self, event: &Event) {
        self.factory
            .get_for(event.object.type_meta())
            .send_event(event);
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn create(&self, object: SharedObject) -> Result<SharedObject, ClientError> {
        object.validate()?;
        let full_id = object.full_id();

        let mut objects = self.objects.write();
        if objects.contains_key(&full_id) {
            return Err(ClientError::AlreadyExists(full_id));
        }
        objects.insert(full_id.clone(), Arc::clone(&object));
        self.broadcast(&Event::added(Arc::clone(&object)));
        drop(objects);

        debug!(id = %full_id, "object created");
        Ok(object)
    }

    async fn update(&self, object: SharedObject) -> Result<SharedObject, ClientError> {
        object.validate()?;
        let full_id = object.full_id();

        let mut objects = self.objects.write();
        let Some(slot) = objects.get_mut(&full_id) else {
            return Err(ClientError::NotFound(full_id));
        };
        *slot = Arc::clone(&object);
        self.broadcast(&Event::updated(Arc::clone(&object)));
        drop(objects);

        debug!(id = %full_id, "object updated");
        Ok(object)
    }

    async fn update_if_unchanged(
        &self,
        current: SharedObject,
        object: SharedObject,
    ) -> Result<SharedObject, ClientError> {
        object.validate()?;
        let full_id = object.full_id();
        let expected = current.to_json()?;

        let mut objects = self.objects.write();
        let Some(slot) = objects.get_mut(&full_id) else {
            return Err(ClientError::NotFound(full_id));
        };
        if slot.to_json()? != expected {
            return Err(ClientError::Conflict(full_id));
        }
        *slot = Arc::clone(&object);
        self.broadcast(&Event::updated(Arc::clone(&object)));
        drop(objects);

        debug!(id = %full_id, "object updated");
        Ok(object)
    }

    async fn delete(&self, full_id: &str) -> Result<(), ClientError> {
        split_full_id(full_id)?;

        let mut objects = self.objects.write();
        if let Some(removed) = objects.remove(full_id) {
            self.broadcast(&Event::deleted(removed));
            debug!(id = %full_id, "object deleted");
        }
        Ok(())
    }

    async fn get(&self, full_id: &str) -> Result<SharedObject, ClientError> {
        split_full_id(full_id)?;
        self.objects
            .read()
            .get(full_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(full_id.to_string()))
    }

    async fn list(&self, options: &ListOptions) -> Result<ObjectList, ClientError> {
        let items = self
            .objects
            .read()
            .values()
            .filter(|object| options.matches(object.as_ref()))
            .cloned()
            .collect();
        Ok(ObjectList::new(Some(options.type_meta.clone()), items))
    }

    async fn watch(&self, options: &ListOptions) -> Result<Watcher, ClientError> {
        let watcher = self
            .factory
            .get_for(&options.type_meta)
            .start_watcher(Arc::new(options.filter()))?;
        Ok(watcher)
    }
}
