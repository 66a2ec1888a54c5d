//! Chaos Watch - event bus for resource mutations
//!
//! - [`Event`]: immutable `(EventType, object)` snapshot
//! - [`ObjectFilter`]: composable discard predicates
//! - [`Multiplexer`]: per-type fan-out to [`Watcher`]s
//! - [`MultiplexerFactory`]: one shared multiplexer per full type path
//!
//! # Example
//!
//! ```rust,ignore
//! use chaos_watch::{Event, MultiplexerFactory, NoFilter};
//!
//! let factory = MultiplexerFactory::new();
//! let mux = factory.get_for(&TypeMeta::node());
//! let mut watcher = mux.start_watcher(Arc::new(NoFilter))?;
//! mux.send_event(&Event::added(node));
//! let event = watcher.recv().await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod event;
pub mod filter;
pub mod multiplexer;

pub use error::WatchError;
pub use event::{Event, EventType};
pub use filter::{
    LabelFilter, ListOptionsFilter, NoFilter, ObjectFilter, SharedFilter, TypeFilter,
};
pub use multiplexer::{
    Multiplexer, MultiplexerFactory, Watcher, WatcherId, DEFAULT_MAX_WATCHERS,
};
