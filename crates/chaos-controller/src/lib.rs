//! Chaos Controller - reconciliation and execution
//!
//! Control loops of the chaos control plane:
//! - [`Controller`]: informer-fed work queue driving a [`Reconciler`]
//! - [`ExperimentReconciler`]: schedules one failure per selected node
//! - [`FailureAgent`]: executes and reverts the failures of one node
//! - [`Master`]: in-process wiring of all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use chaos_controller::{Master, MasterConfig};
//!
//! let master = Master::new(MasterConfig::new().with_workers(2));
//! master.seed(objects).await?;
//! master.run(tokio::signal::ctrl_c().map(|_| ())).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod agent;
pub mod config;
pub mod controller;
pub mod error;
pub mod master;
pub mod scheduler;
pub mod telemetry;

pub use agent::FailureAgent;
pub use config::{load_seed, ControllerConfig, LogConfig, LogFormat, MasterConfig};
pub use controller::{Controller, ControllerState, Reconciler};
pub use error::ControllerError;
pub use master::Master;
pub use scheduler::{ExperimentReconciler, SchedulePlan};
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
