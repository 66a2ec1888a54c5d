//! Attack contract
//!
//! An attack is one reversible side effect on the local node. Attacks of an
//! injection are applied in parallel, so an implementation must not rely on
//! running before or after any other attack.

use crate::cancel::CancelToken;
use crate::error::AttackError;
use chaos_core::AttackOpts;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Shared attack handle
pub type SharedAttack = Arc<dyn Attack>;

/// Builds an attack from its options
pub type AttackCreator = Arc<dyn Fn(&AttackOpts) -> Result<SharedAttack, AttackError> + Send + Sync>;

/// Reversible side effect
#[async_trait::async_trait]
pub trait Attack: Debug + Send + Sync {
    /// Attack kind, as registered
    fn kind(&self) -> &str;

    /// Apply the side effect
    ///
    /// `cancel` fires when the owning injection is cancelled or reverted.
    async fn apply(&self, cancel: &CancelToken) -> Result<(), AttackError>;

    /// Undo the side effect
    async fn revert(&self, cancel: &CancelToken) -> Result<(), AttackError>;
}

/// Kind of the built-in attack that does nothing
pub const NOOP_ATTACK: &str = "noop";

/// Attack with no side effect
#[derive(Debug, Clone, Default)]
pub struct NoopAttack {
    opts: AttackOpts,
}

impl NoopAttack {
    /// Create from options; any options are accepted
    #[inline]
    #[must_use]
    pub fn new(opts: AttackOpts) -> Self {
        Self { opts }
    }

    /// Creator for registries
    #[must_use]
    pub fn creator() -> AttackCreator {
        Arc::new(|opts: &AttackOpts| Ok(Arc::new(NoopAttack::new(opts.clone())) as SharedAttack))
    }
}

#[async_trait::async_trait]
impl Attack for NoopAttack {
    fn kind(&self) -> &str {
        NOOP_ATTACK
    }

    async fn apply(&self, _cancel: &CancelToken) -> Result<(), AttackError> {
        debug!(options = self.opts.len(), "noop attack applied");
        Ok(())
    }

    async fn revert(&self, _cancel: &CancelToken) -> Result<(), AttackError> {
        debug!("noop attack reverted");
        Ok(())
    }
}
