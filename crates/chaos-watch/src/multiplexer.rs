//! Event multiplexer
//!
//! One [`Multiplexer`] fans every event of a resource type out to all
//! registered watchers whose filter keeps it. Watchers receive through an
//! unbounded channel, so a slow watcher never blocks `send_event` or the
//! other watchers; per-watcher delivery order is the broadcast order.
//!
//! [`MultiplexerFactory`] memoizes one multiplexer per full type path so every
//! watcher of a type shares the same stream.

use crate::error::WatchError;
use crate::event::Event;
use crate::filter::SharedFilter;
use chaos_core::TypeMeta;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Default maximum number of watchers per multiplexer
pub const DEFAULT_MAX_WATCHERS: usize = 1024;

/// Watcher identifier, unique within its multiplexer
pub type WatcherId = u64;

struct WatcherEntry {
    filter: SharedFilter,
    sender: mpsc::UnboundedSender<Event>,
}

struct MultiplexerInner {
    name: String,
    max_watchers: usize,
    next_id: AtomicU64,
    watchers: RwLock<HashMap<WatcherId, WatcherEntry>>,
}

/// Broadcaster for one resource type
///
/// Cloning yields another handle to the same broadcaster.
#[derive(Clone)]
pub struct Multiplexer {
    inner: Arc<MultiplexerInner>,
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("name", &self.inner.name)
            .field("watchers", &self.watcher_count())
            .finish()
    }
}

impl Multiplexer {
    /// Create a multiplexer
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_max_watchers(name, DEFAULT_MAX_WATCHERS)
    }

    /// Create a multiplexer with a watcher limit
    #[must_use]
    pub fn with_max_watchers(name: impl Into<String>, max_watchers: usize) -> Self {
        Self {
            inner: Arc::new(MultiplexerInner {
                name: name.into(),
                max_watchers,
                next_id: AtomicU64::new(1),
                watchers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Multiplexer name, usually the full type path
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register a watcher
    ///
    /// # Errors
    /// Returns `WatchError::TooManyWatchers` when the limit is reached.
    pub fn start_watcher(&self, filter: SharedFilter) -> Result<Watcher, WatchError> {
        let mut watchers = self.inner.watchers.write();
        if watchers.len() >= self.inner.max_watchers {
            return Err(WatchError::TooManyWatchers(self.inner.max_watchers));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        watchers.insert(id, WatcherEntry { filter, sender });
        drop(watchers);

        debug!(multiplexer = %self.inner.name, watcher = id, "watcher started");
        Ok(Watcher {
            id,
            receiver,
            multiplexer: self.clone(),
        })
    }

    /// Unregister a watcher and close its channel
    ///
    /// Stopping an unknown or already stopped watcher is a no-op.
    pub fn stop_watcher(&self, id: WatcherId) {
        if self.inner.watchers.write().remove(&id).is_some() {
            debug!(multiplexer = %self.inner.name, watcher = id, "watcher stopped");
        }
    }

    /// Broadcast an event to every watcher whose filter keeps it
    pub fn send_event(&self, event: &Event) {
        let mut closed = Vec::new();
        {
            let watchers = self.inner.watchers.read();
            for (id, entry) in watchers.iter() {
                if entry.filter.filter(event.object.as_ref()) {
                    continue;
                }
                if entry.sender.send(event.clone()).is_err() {
                    closed.push(*id);
                }
            }
        }

        trace!(
            multiplexer = %self.inner.name,
            event = %event.event_type,
            object = %event.object.full_id(),
            "event sent"
        );

        for id in closed {
            self.stop_watcher(id);
        }
    }

    /// Unregister every watcher
    pub fn stop_all(&self) {
        let drained = std::mem::take(&mut *self.inner.watchers.write());
        debug!(multiplexer = %self.inner.name, count = drained.len(), "all watchers stopped");
    }

    /// Number of registered watchers
    #[inline]
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.read().len()
    }
}

/// Handle to a registered watcher
///
/// Dropping the handle unregisters the watcher.
#[derive(Debug)]
pub struct Watcher {
    id: WatcherId,
    receiver: mpsc::UnboundedReceiver<Event>,
    multiplexer: Multiplexer,
}

impl Watcher {
    /// Watcher ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> WatcherId {
        self.id
    }

    /// Receive the next event
    ///
    /// Returns `None` once the watcher has been stopped and drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Receive without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Unregister this watcher
    pub fn stop(&self) {
        self.multiplexer.stop_watcher(self.id);
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Hands out one shared multiplexer per full type path
#[derive(Debug, Clone, Default)]
pub struct MultiplexerFactory {
    multiplexers: Arc<DashMap<String, Multiplexer>>,
}

impl MultiplexerFactory {
    /// Create an empty factory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the multiplexer for a full type path
    #[must_use]
    pub fn get(&self, full_type: &str) -> Multiplexer {
        self.multiplexers
            .entry(full_type.to_string())
            .or_insert_with(|| Multiplexer::new(full_type))
            .clone()
    }

    /// Get or create the multiplexer for a type
    #[inline]
    #[must_use]
    pub fn get_for(&self, type_meta: &TypeMeta) -> Multiplexer {
        self.get(&type_meta.full_type())
    }

    /// Stop every watcher of every multiplexer
    pub fn stop_all(&self) {
        for entry in self.multiplexers.iter() {
            entry.value().stop_all();
        }
    }

    /// Number of multiplexers created so far
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.multiplexers.len()
    }

    /// Whether no multiplexer has been created yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.multiplexers.is_empty()
    }
}
