//! Attack registry
//!
//! Maps an attack kind to the creator building it. Registries are plain
//! values handed to whoever builds injections; there is no global table.

use crate::attack::{AttackCreator, NoopAttack, SharedAttack, NOOP_ATTACK};
use crate::error::AttackError;
use chaos_core::AttackOpts;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Source of attack creators
pub trait Registry: Send + Sync {
    /// Add a creator for a kind
    ///
    /// # Errors
    /// Returns `AttackError::AlreadyRegistered` if the kind is taken.
    fn register(&self, kind: &str, creator: AttackCreator) -> Result<(), AttackError>;

    /// Remove the creator for a kind
    ///
    /// # Errors
    /// Returns `AttackError::NotRegistered` if the kind is unknown.
    fn deregister(&self, kind: &str) -> Result<(), AttackError>;

    /// Whether a kind has a creator
    fn exists(&self, kind: &str) -> bool;

    /// Build an attack
    ///
    /// # Errors
    /// Returns `AttackError::NotRegistered` for unknown kinds and whatever
    /// the creator returns for bad options.
    fn new_attack(&self, kind: &str, opts: &AttackOpts) -> Result<SharedAttack, AttackError>;
}

/// In-process registry
#[derive(Default)]
pub struct MemoryRegistry {
    creators: RwLock<HashMap<String, AttackCreator>>,
}

impl std::fmt::Debug for MemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl MemoryRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in attacks
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry
            .creators
            .write()
            .insert(NOOP_ATTACK.to_string(), NoopAttack::creator());
        registry
    }

    /// Registered kinds, sorted
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.creators.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Number of registered kinds
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.creators.read().len()
    }

    /// Whether no kind is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creators.read().is_empty()
    }
}

impl Registry for MemoryRegistry {
    fn register(&self, kind: &str, creator: AttackCreator) -> Result<(), AttackError> {
        let mut creators = self.creators.write();
        if creators.contains_key(kind) {
            return Err(AttackError::AlreadyRegistered(kind.to_string()));
        }
        creators.insert(kind.to_string(), creator);
        Ok(())
    }

    fn deregister(&self, kind: &str) -> Result<(), AttackError> {
        self.creators
            .write()
            .remove(kind)
            .map(|_| ())
            .ok_or_else(|| AttackError::NotRegistered(kind.to_string()))
    }

    fn exists(&self, kind: &str) -> bool {
        self.creators.read().contains_key(kind)
    }

    fn new_attack(&self, kind: &str, opts: &AttackOpts) -> Result<SharedAttack, AttackError> {
        // Clone the creator out so it runs without the lock held.
        let creator = self
            .creators
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| AttackError::NotRegistered(kind.to_string()))?;
        creator(opts)
    }
}
