//! List/watch informer feeding a work queue
//!
//! The informer keeps an [`IndexedStore`] in sync with a [`ListerWatcher`]
//! and pushes the index key of every touched object onto a [`WorkQueue`].
//! Consumers re-read the store when they pop a key, so a stale key simply
//! reconciles against the newest state.
//!
//! # Example
//!
//! ```rust,ignore
//! let informer = Arc::new(WorkQueueInformer::new(lister_watcher, ListOptions::new(TypeMeta::experiment())));
//! let (stop_tx, stop_rx) = oneshot::channel();
//! tokio::spawn({
//!     let informer = Arc::clone(&informer);
//!     async move { informer.run(stop_rx).await }
//! });
//! while let (Some(key), false) = informer.queue().pop().await {
//!     let current = informer.store().get_by_key(&key);
//! }
//! ```

use crate::error::InformerError;
use crate::queue::WorkQueue;
use crate::store::IndexedStore;
use chaos_client::{ListOptions, ListerWatcher};
use chaos_core::SharedObject;
use chaos_watch::{Event, EventType};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Shuts the queue down when dropped
struct ShutdownGuard<'a>(&'a WorkQueue);

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        if self.0.shut_down().is_err() {
            debug!("work queue already shut down");
        }
    }
}

/// Informer pushing index keys onto a work queue
pub struct WorkQueueInformer {
    lister_watcher: Arc<dyn ListerWatcher>,
    options: ListOptions,
    store: Arc<IndexedStore>,
    queue: Arc<WorkQueue>,
}

impl std::fmt::Debug for WorkQueueInformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueueInformer")
            .field("options", &self.options)
            .field("store", &self.store)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl WorkQueueInformer {
    /// Create an informer with a full-ID keyed store and an empty queue
    #[must_use]
    pub fn new(lister_watcher: Arc<dyn ListerWatcher>, options: ListOptions) -> Self {
        Self {
            lister_watcher,
            options,
            store: Arc::new(IndexedStore::new()),
            queue: Arc::new(WorkQueue::new()),
        }
    }

    /// Use a custom store
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: Arc<IndexedStore>) -> Self {
        self.store = store;
        self
    }

    /// Store kept in sync by this informer
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<IndexedStore> {
        &self.store
    }

    /// Queue receiving index keys
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Scope of the list and watch calls
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ListOptions {
        &self.options
    }

    /// Seed the store and queue from a full list
    ///
    /// # Errors
    /// Propagates list, keying and queue errors.
    pub async fn set_initial_state(&self) -> Result<(), InformerError> {
        let objects = self.lister_watcher.list(&self.options).await?;
        info!(
            kind = %self.options.type_meta,
            count = objects.len(),
            "informer initial state"
        );
        for object in objects {
            self.on_add(object)?;
        }
        Ok(())
    }

    /// Apply watch events until `stop` fires
    ///
    /// A dropped stop sender counts as a stop signal.
    ///
    /// # Errors
    /// Returns `InformerError::WatchClosed` if the watch ends first, and
    /// `InformerError::UnexpectedEvent` on an `Error` event.
    pub async fn start_watcher(
        &self,
        stop: &mut oneshot::Receiver<()>,
    ) -> Result<(), InformerError> {
        let mut watcher = self.lister_watcher.watch(&self.options).await?;
        debug!(kind = %self.options.type_meta, "informer watching");

        loop {
            tokio::select! {
                biased;
                _ = &mut *stop => {
                    debug!(kind = %self.options.type_meta, "informer stopped");
                    return Ok(());
                }
                event = watcher.recv() => match event {
                    Some(event) => self.handle_event(event)?,
                    None => return Err(InformerError::WatchClosed),
                },
            }
        }
    }

    /// Seed, then watch until `stop` fires
    ///
    /// The queue is shut down on every exit path.
    ///
    /// # Errors
    /// Propagates errors from [`Self::set_initial_state`] and
    /// [`Self::start_watcher`].
    pub async fn run(&self, mut stop: oneshot::Receiver<()>) -> Result<(), InformerError> {
        let _guard = ShutdownGuard(&self.queue);
        self.set_initial_state().await?;
        let result = self.start_watcher(&mut stop).await;
        if let Err(e) = &result {
            warn!(kind = %self.options.type_meta, error = %e, "informer exited");
        }
        result
    }

    fn handle_event(&self, event: Event) -> Result<(), InformerError> {
        match event.event_type {
            EventType::Added => self.on_add(event.object),
            EventType::Updated => match self.store.get(event.object.as_ref())? {
                Some(old) => self.on_update(&old, event.object),
                // Update for an object never seen: treat as a creation
                None => self.on_add(event.object),
            },
            EventType::Deleted => self.on_delete(&event.object),
            EventType::Error => Err(InformerError::UnexpectedEvent {
                event_type: event.event_type,
                full_id: event.object.full_id(),
            }),
        }
    }

    /// Store a new object and enqueue its key
    ///
    /// # Errors
    /// Propagates keying and queue errors.
    pub fn on_add(&self, object: SharedObject) -> Result<(), InformerError> {
        let key = self.store.add(object)?;
        debug!(key = %key, "informer add");
        self.queue.push(key)?;
        Ok(())
    }

    /// Replace an object and enqueue its key
    ///
    /// # Errors
    /// Propagates keying and queue errors.
    pub fn on_update(&self, old: &SharedObject, new: SharedObject) -> Result<(), InformerError> {
        let key = self.store.update(new)?;
        debug!(key = %key, previous = %old.full_id(), "informer update");
        self.queue.push(key)?;
        Ok(())
    }

    /// Drop an object and enqueue its key
    ///
    /// # Errors
    /// Propagates keying and queue errors.
    pub fn on_delete(&self, object: &SharedObject) -> Result<(), InformerError> {
        let key = self.store.delete(object.as_ref())?;
        debug!(key = %key, "informer delete");
        self.queue.push(key)?;
        Ok(())
    }
}
