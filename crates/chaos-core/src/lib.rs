//! Chaos Core - resource model
//!
//! Typed resources shared by every layer of the control plane:
//! - [`Node`]: fleet member with a reported [`NodeState`]
//! - [`Experiment`]: node selector plus failure template
//! - [`Failure`]: node-scoped attack list with a [`FailureState`] lifecycle
//!
//! Resources are handled dynamically through the [`Object`] trait and
//! addressed by full ID, `<version>/<kind>/<id>`.
//!
//! # Example
//!
//! ```rust,ignore
//! use chaos_core::{get_full_id_from_type, split_full_id, TypeMeta};
//!
//! let full = get_full_id_from_type(&TypeMeta::failure(), "flr-001");
//! assert_eq!(full, "chaos/v1/failure/flr-001");
//! let (type_meta, id) = split_full_id(&full)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod codec;

pub mod attack;
pub mod error;
pub mod experiment;
pub mod failure;
pub mod labels;
pub mod meta;
pub mod node;
pub mod object;

pub use attack::{AttackEntry, AttackList, AttackOpts, FailureDefinition};
pub use error::{ObjectError, ATTACKS_FORMAT_ERROR, ATTACK_MAP_SHAPE_ERROR};
pub use experiment::{Experiment, ExperimentSpec, ExperimentStatus};
pub use failure::{Failure, FailureSpec, FailureState, FailureStatus};
pub use labels::{
    matches_selector, validate_label_value, validate_labels, Labels, EXPERIMENT_LABEL, NODE_LABEL,
};
pub use meta::{
    get_full_id, get_full_id_from_type, split_full_id, ObjectMeta, TypeMeta, API_VERSION,
    EXPERIMENT_KIND, FAILURE_KIND, NODE_KIND,
};
pub use node::{Node, NodeSpec, NodeState, NodeStatus};
pub use object::{downcast, Object, ObjectList, SharedObject, TypeRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
