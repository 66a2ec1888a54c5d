//! Blocking FIFO work queue
//!
//! - `push` appends and wakes one waiting popper
//! - `pop` waits while the queue is empty
//! - `shut_down` wakes every popper; pending items are abandoned
//!
//! Each item is handed to exactly one popper. `len` and `is_shut_down` are
//! point-in-time reads; a following `pop` may observe a different state.

use crate::error::QueueError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<String>,
    shut_down: bool,
}

/// FIFO of index keys shared by an informer and its consumers
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    /// Create an empty queue
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item
    ///
    /// # Errors
    /// Returns `QueueError::ShutDown` once the queue has been shut down.
    pub fn push(&self, item: impl Into<String>) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(QueueError::ShutDown);
        }
        state.items.push_back(item.into());
        drop(state);

        self.notify.notify_one();
        Ok(())
    }

    /// Take the oldest item, waiting while the queue is empty
    ///
    /// Returns `(None, true)` as soon as the queue is shut down, even if
    /// items remain.
    pub async fn pop(&self) -> (Option<String>, bool) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent push or shutdown
            // between the check and the await is not lost.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.shut_down {
                    return (None, true);
                }
                if let Some(item) = state.items.pop_front() {
                    return (Some(item), false);
                }
            }

            notified.await;
        }
    }

    /// Stop the queue and wake every popper
    ///
    /// # Errors
    /// Returns `QueueError::AlreadyShutDown` on a second call.
    pub fn shut_down(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(QueueError::AlreadyShutDown);
        }
        state.shut_down = true;
        drop(state);

        self.notify.notify_waiters();
        Ok(())
    }

    /// Number of pending items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no items are pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Whether `shut_down` has been called
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}
