//! Chaos Client - repository contract
//!
//! - [`Repository`]: CRUD plus watch over full-ID addressed resources
//! - [`ListerWatcher`]: list-then-watch source consumed by informers
//! - [`MemoryRepository`]: in-process implementation broadcasting on a
//!   [`chaos_watch::MultiplexerFactory`]
//! - [`ResourceClient`]: typed view bound to one resource type

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod memory;
pub mod options;
pub mod repository;
pub mod typed;

pub use error::ClientError;
pub use memory::MemoryRepository;
pub use options::ListOptions;
pub use repository::{ListerWatcher, Repository, RepositoryListerWatcher};
pub use typed::ResourceClient;
