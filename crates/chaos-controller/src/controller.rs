//! Generic work-queue controller
//!
//! A [`Controller`] runs a [`WorkQueueInformer`] in the background and pops
//! index keys from its queue. Each key is resolved against the informer
//! store and handed to a [`Reconciler`]:
//! - key present: the object is downcast and reconciled
//! - key absent: the object was deleted, [`Reconciler::on_missing`] runs
//! - reconcile error: the key is pushed back immediately, without limit
//! - a key is never reconciled by two workers at once
//!
//! Lifecycle: `NotRunning -> Running -> Stopping -> Stopped`.
//!
//! # Example
//!
//! ```rust,ignore
//! let controller = Arc::new(Controller::new(informer, Arc::new(reconciler)));
//! let handle = tokio::spawn({
//!     let controller = Arc::clone(&controller);
//!     async move { controller.run().await }
//! });
//! controller.stop()?;
//! handle.await??;
//! ```

use crate::error::ControllerError;
use chaos_core::{downcast, Object};
use chaos_informer::WorkQueueInformer;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControllerState {
    /// Created, `run` not called yet
    #[default]
    NotRunning,
    /// Processing jobs
    Running,
    /// `stop` called, draining workers
    Stopping,
    /// `run` returned
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotRunning => "not running",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Domain logic run for every popped key
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Type the informer store holds
    type Object: Object + Clone;

    /// Name used in logs
    fn name(&self) -> &str;

    /// Converge towards the desired state of `object`
    async fn reconcile(&self, object: Self::Object) -> Result<(), ControllerError>;

    /// Handle a key whose object is no longer in the store
    async fn on_missing(&self, key: &str) -> Result<(), ControllerError> {
        debug!(reconciler = self.name(), key, "object gone, skipping");
        Ok(())
    }
}

/// Work-queue controller driving one reconciler
pub struct Controller<R: Reconciler> {
    informer: Arc<WorkQueueInformer>,
    reconciler: Arc<R>,
    workers: usize,
    state: Mutex<ControllerState>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    in_flight: Mutex<InFlight>,
}

/// Keys being reconciled, and keys popped again meanwhile
///
/// A key is reconciled by at most one worker at a time; a duplicate popped
/// while it is busy is pushed back once the running pass ends.
#[derive(Debug, Default)]
struct InFlight {
    processing: HashSet<String>,
    dirty: HashSet<String>,
}

impl InFlight {
    /// Claim `key`; false if another worker holds it
    fn begin(&mut self, key: &str) -> bool {
        if self.processing.contains(key) {
            self.dirty.insert(key.to_string());
            return false;
        }
        self.processing.insert(key.to_string());
        true
    }

    /// Release `key`; true if it was popped again while busy
    fn finish(&mut self, key: &str) -> bool {
        self.processing.remove(key);
        self.dirty.remove(key)
    }
}

impl<R: Reconciler> fmt::Debug for Controller<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("reconciler", &self.reconciler.name())
            .field("workers", &self.workers)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<R: Reconciler> Controller<R> {
    /// Create a single-worker controller
    #[must_use]
    pub fn new(informer: WorkQueueInformer, reconciler: Arc<R>) -> Self {
        Self {
            informer: Arc::new(informer),
            reconciler,
            workers: 1,
            state: Mutex::new(ControllerState::NotRunning),
            stop_tx: Mutex::new(None),
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    /// With a number of concurrent workers; zero is treated as one
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Current lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    /// Informer feeding this controller
    #[inline]
    #[must_use]
    pub fn informer(&self) -> &Arc<WorkQueueInformer> {
        &self.informer
    }

    /// Reconciler driven by this controller
    #[inline]
    #[must_use]
    pub fn reconciler(&self) -> &Arc<R> {
        &self.reconciler
    }

    /// Start the informer and process jobs until the queue shuts down
    ///
    /// # Errors
    /// - `ControllerError::InvalidState` unless the controller is not running
    /// - `ControllerError::Informer` if the informer stopped with an error
    pub async fn run(&self) -> Result<(), ControllerError> {
        let stop_rx = {
            let mut state = self.state.lock();
            if *state != ControllerState::NotRunning {
                return Err(ControllerError::InvalidState(*state));
            }
            *state = ControllerState::Running;
            let (stop_tx, stop_rx) = oneshot::channel();
            *self.stop_tx.lock() = Some(stop_tx);
            stop_rx
        };
        info!(reconciler = self.reconciler.name(), workers = self.workers, "controller running");

        let informer = Arc::clone(&self.informer);
        let informer_task = tokio::spawn(async move { informer.run(stop_rx).await });

        join_all((0..self.workers).map(|worker| self.process_loop(worker))).await;

        let result = match informer_task.await {
            Ok(result) => result.map_err(ControllerError::from),
            Err(e) => Err(ControllerError::Task(e.to_string())),
        };

        *self.state.lock() = ControllerState::Stopped;
        info!(reconciler = self.reconciler.name(), "controller stopped");
        result
    }

    /// Signal the informer to stop; `run` returns once workers drain
    ///
    /// # Errors
    /// Returns `ControllerError::NotRunning` unless the controller is running.
    pub fn stop(&self) -> Result<(), ControllerError> {
        let mut state = self.state.lock();
        if *state != ControllerState::Running {
            return Err(ControllerError::NotRunning);
        }
        *state = ControllerState::Stopping;
        drop(state);

        if let Some(stop_tx) = self.stop_tx.lock().take() {
            // The informer may already have exited on its own.
            let _ = stop_tx.send(());
        }
        Ok(())
    }

    async fn process_loop(&self, worker: usize) {
        let queue = self.informer.queue();
        loop {
            let (key, shut_down) = queue.pop().await;
            if shut_down {
                debug!(reconciler = self.reconciler.name(), worker, "queue shut down");
                return;
            }
            let Some(key) = key else { continue };
            if !self.in_flight.lock().begin(&key) {
                debug!(reconciler = self.reconciler.name(), worker, key = %key, "key busy, deferred");
                continue;
            }

            let result = self.process(&key).await;
            let deferred = self.in_flight.lock().finish(&key);
            if let Err(e) = &result {
                warn!(
                    reconciler = self.reconciler.name(),
                    key = %key,
                    error = %e,
                    retryable = e.is_retryable(),
                    "reconcile failed, requeueing"
                );
            }
            if (result.is_err() || deferred) && queue.push(key).is_err() {
                debug!(reconciler = self.reconciler.name(), "queue shut down, job dropped");
            }
            if result.is_err() {
                // Let other tasks run before the retry is popped.
                tokio::task::yield_now().await;
            }
        }
    }

    async fn process(&self, key: &str) -> Result<(), ControllerError> {
        let Some(object) = self.informer.store().get_by_key(key) else {
            return self.reconciler.on_missing(key).await;
        };
        let typed = downcast::<R::Object>(object.as_ref()).ok_or_else(|| {
            ControllerError::TypeMismatch {
                key: key.to_string(),
                found: object.type_meta().full_type(),
            }
        })?;
        self.reconciler.reconcile(typed).await
    }
}
