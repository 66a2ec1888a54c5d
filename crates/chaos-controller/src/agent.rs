//! Node-side failure agent
//!
//! Runs under a [`Controller`](crate::Controller) whose informer watches the
//! failures labelled with the agent's node. For each failure:
//! - expected enabled, currently disabled, never run here: execute it
//! - expected disabled while executing: revert it
//! - injection state differs from the stored state: write it back
//!
//! A failure removed from the store reverts its live injection.

use crate::controller::Reconciler;
use crate::error::ControllerError;
use chaos_client::{ClientError, ListOptions, Repository, ResourceClient};
use chaos_core::{split_full_id, Failure, FailureState, TypeMeta, NODE_LABEL};
use chaos_injection::{Clock, Injection, Registry};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Executes the failures scheduled on one node
pub struct FailureAgent {
    node_id: String,
    failures: ResourceClient<Failure>,
    registry: Arc<dyn Registry>,
    clock: Arc<dyn Clock>,
    injections: DashMap<String, Arc<Injection>>,
}

impl std::fmt::Debug for FailureAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureAgent")
            .field("node_id", &self.node_id)
            .field("injections", &self.injections.len())
            .finish_non_exhaustive()
    }
}

impl FailureAgent {
    /// Create an agent for a node
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        repository: Arc<dyn Repository>,
        registry: Arc<dyn Registry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            failures: ResourceClient::new(repository, TypeMeta::failure()),
            registry,
            clock,
            injections: DashMap::new(),
        }
    }

    /// Node served by this agent
    #[inline]
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Informer scope: failures targeting this node
    #[must_use]
    pub fn list_options(&self) -> ListOptions {
        ListOptions::new(TypeMeta::failure()).with_label(NODE_LABEL, self.node_id.clone())
    }

    /// Injection started for a failure, if any
    #[must_use]
    pub fn injection(&self, failure_id: &str) -> Option<Arc<Injection>> {
        self.injections.get(failure_id).map(|entry| Arc::clone(entry.value()))
    }

    async fn start(&self, mut failure: Failure) -> Result<(), ControllerError> {
        let id = failure.id().to_string();
        failure.status.current_state = FailureState::Enabled;

        let injection = match self.injections.entry(id.clone()) {
            Entry::Occupied(_) => return Ok(()),
            Entry::Vacant(slot) => {
                let injection = Arc::new(Injection::new(
                    failure,
                    self.registry.as_ref(),
                    Arc::clone(&self.clock),
                )?);
                slot.insert(Arc::clone(&injection));
                injection
            }
        };

        info!(node = %self.node_id, failure = %id, "executing failure");
        if let Err(e) = injection.fail().await {
            // The outcome is recorded in the failure status below.
            warn!(node = %self.node_id, failure = %id, error = %e, "failure execution failed");
        } else {
            self.watch_completion(Arc::clone(&injection));
        }
        write_status(&self.failures, &injection).await
    }

    /// Write the status back once the injection reaches a terminal state
    fn watch_completion(&self, injection: Arc<Injection>) {
        let failures = self.failures.clone();
        let mut states = injection.subscribe();
        tokio::spawn(async move {
            if states.wait_for(|state| state.is_terminal()).await.is_err() {
                return;
            }
            if let Err(e) = write_status(&failures, &injection).await {
                warn!(failure = %injection.id(), error = %e, "failure status write-back failed");
            }
        });
    }
}

/// Attempts at writing a status before giving up to the controller's requeue
const STATUS_WRITE_ATTEMPTS: usize = 5;

/// Copy the observed state of an injection onto the stored failure
///
/// The write is conditional on the failure being unchanged since it was read,
/// so a concurrent `expected_state` change is kept and reconciled next.
async fn write_status(
    failures: &ResourceClient<Failure>,
    injection: &Injection,
) -> Result<(), ControllerError> {
    let snapshot = injection.failure();
    for _ in 0..STATUS_WRITE_ATTEMPTS {
        let stored = match failures.get(snapshot.id()).await {
            Ok(stored) => stored,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if stored.status.current_state == snapshot.status.current_state
            && stored.status.finished == snapshot.status.finished
        {
            return Ok(());
        }

        let mut next = stored.clone();
        next.status.current_state = snapshot.status.current_state;
        next.status.executed = snapshot.status.executed;
        next.status.finished = snapshot.status.finished;
        match failures.update_if_unchanged(stored, next).await {
            Ok(_) => {
                debug!(failure = snapshot.id(), state = %snapshot.status.current_state, "failure status written");
                return Ok(());
            }
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) if e.is_conflict() => {
                debug!(failure = snapshot.id(), "failure changed while writing status, rereading");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ClientError::Conflict(failures.full_id(snapshot.id())).into())
}

#[async_trait::async_trait]
impl Reconciler for FailureAgent {
    type Object = Failure;

    fn name(&self) -> &str {
        "failure-agent"
    }

    async fn reconcile(&self, failure: Failure) -> Result<(), ControllerError> {
        if failure.node_id() != Some(self.node_id.as_str()) {
            return Ok(());
        }

        let existing = self.injection(failure.id());
        match (failure.status.expected_state, existing) {
            (FailureState::Enabled, None)
                if failure.status.current_state == FailureState::Disabled =>
            {
                self.start(failure).await
            }
            (FailureState::Disabled, Some(injection))
                if injection.current_state() == FailureState::Executing =>
            {
                injection.set_expected_state(FailureState::Disabled);
                if let Err(e) = injection.revert().await {
                    warn!(node = %self.node_id, failure = failure.id(), error = %e, "failure revert failed");
                }
                write_status(&self.failures, &injection).await
            }
            (_, Some(injection)) => write_status(&self.failures, &injection).await,
            (_, None) => Ok(()),
        }
    }

    async fn on_missing(&self, key: &str) -> Result<(), ControllerError> {
        let (_, id) = split_full_id(key)?;
        let Some((_, injection)) = self.injections.remove(&id) else {
            return Ok(());
        };
        if injection.current_state() == FailureState::Executing {
            info!(node = %self.node_id, failure = %id, "failure deleted, reverting");
            injection.revert().await?;
        }
        Ok(())
    }
}
