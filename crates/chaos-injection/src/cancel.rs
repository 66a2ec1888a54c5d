//! Cancellation token

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable one-way cancellation signal
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a live token
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Cancel; later calls are no-ops
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether `cancel` has been called
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
