//! Chaos Injection - failure execution engine
//!
//! - [`Attack`]: reversible side effect with async apply/revert
//! - [`Registry`]: attack kind to creator, injected by the caller
//! - [`Clock`]: time source for timestamps and the revert timer
//! - [`Injection`]: at-most-once execution of a failure with rollback of
//!   partial applies and timeout-driven revert
//!
//! # Example
//!
//! ```rust,ignore
//! use chaos_injection::{Injection, MemoryRegistry, SystemClock};
//!
//! let registry = MemoryRegistry::with_defaults();
//! let injection = Arc::new(Injection::new(failure, &registry, Arc::new(SystemClock))?);
//! injection.fail().await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod attack;
pub mod cancel;
pub mod clock;
pub mod error;
pub mod injection;
pub mod registry;

pub use attack::{Attack, AttackCreator, NoopAttack, SharedAttack, NOOP_ATTACK};
pub use cancel::CancelToken;
pub use clock::{Clock, SystemClock};
pub use error::{AttackError, InjectionError};
pub use injection::Injection;
pub use registry::{MemoryRegistry, Registry};
