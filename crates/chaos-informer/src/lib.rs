//! Chaos Informer - cache and work distribution
//!
//! - [`IndexedStore`]: latest known state per index key
//! - [`WorkQueue`]: blocking FIFO of index keys with hard shutdown
//! - [`WorkQueueInformer`]: list-then-watch loop keeping both in sync
//!
//! The queue carries keys only; consumers always read the object back
//! from the store.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod informer;
pub mod queue;
pub mod store;

pub use error::{InformerError, QueueError, StoreError};
pub use informer::WorkQueueInformer;
pub use queue::WorkQueue;
pub use store::{full_id_keyer, IndexedStore, ObjectIndexKeyer};
