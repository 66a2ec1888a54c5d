//! Experiment scheduler
//!
//! Converges the failures of an experiment towards one failure per node
//! matching the experiment selector:
//! 1. list matching nodes
//! 2. list failures labelled with the experiment, grouped by `node` label
//! 3. delete failures whose node no longer matches, and all but the oldest
//!    failure of a matching node
//! 4. create a failure for every matching node without one
//!
//! Failures without a `node` label are not indexed and therefore neither
//! collected nor counted. Delete errors are logged and skipped while create
//! errors abort the pass; the next pass picks up whatever is left.

use crate::controller::Reconciler;
use crate::error::ControllerError;
use chaos_client::{Repository, ResourceClient};
use chaos_core::{
    Experiment, Failure, FailureState, Labels, Node, TypeMeta, EXPERIMENT_LABEL, NODE_LABEL,
};
use chaos_injection::Clock;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound (exclusive) of the random failure ID suffix
const FAILURE_SUFFIX_MAX: u32 = 999_999_999;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePlan {
    /// IDs of failures created
    pub created: Vec<String>,
    /// IDs of failures deleted
    pub deleted: Vec<String>,
}

impl SchedulePlan {
    /// Whether the pass changed nothing
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// Reconciles experiments into per-node failures
#[derive(Debug)]
pub struct ExperimentReconciler {
    nodes: ResourceClient<Node>,
    failures: ResourceClient<Failure>,
    clock: Arc<dyn Clock>,
}

impl ExperimentReconciler {
    /// Create a reconciler over a repository
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            nodes: ResourceClient::new(Arc::clone(&repository), TypeMeta::node()),
            failures: ResourceClient::new(repository, TypeMeta::failure()),
            clock,
        }
    }

    /// Make the failures of `experiment` match its selected nodes
    ///
    /// # Errors
    /// Returns `ControllerError::Client` if listing fails or a create fails.
    /// Delete failures are logged only.
    pub async fn ensure_failures(
        &self,
        experiment: &Experiment,
    ) -> Result<SchedulePlan, ControllerError> {
        let mut plan = SchedulePlan::default();

        let matched: BTreeSet<String> = self
            .nodes
            .list(&experiment.spec.selector)
            .await?
            .iter()
            .map(|node| node.id().to_string())
            .collect();

        let mut owned = Labels::new();
        owned.insert(EXPERIMENT_LABEL.to_string(), experiment.id().to_string());
        let mut by_node: BTreeMap<String, Vec<Failure>> = BTreeMap::new();
        for failure in self.failures.list(&owned).await? {
            if let Some(node_id) = failure.node_id() {
                by_node.entry(node_id.to_string()).or_default().push(failure);
            }
        }

        for (node_id, failures) in &mut by_node {
            // Oldest first; a matched node keeps only that one.
            failures.sort_by(|a, b| {
                (a.status.creation, a.id()).cmp(&(b.status.creation, b.id()))
            });
            let keep = usize::from(matched.contains(node_id));
            for failure in failures.iter().skip(keep) {
                match self.failures.delete(failure.id()).await {
                    Ok(()) => {
                        info!(experiment = experiment.id(), node = %node_id, failure = failure.id(), "failure collected");
                        plan.deleted.push(failure.id().to_string());
                    }
                    Err(e) => {
                        warn!(experiment = experiment.id(), failure = failure.id(), error = %e, "failure delete failed");
                    }
                }
            }
        }

        for node_id in matched.iter().filter(|id| !by_node.contains_key(*id)) {
            let failure = self.new_failure(experiment, node_id);
            let id = failure.id().to_string();
            self.failures.create(failure).await?;
            info!(experiment = experiment.id(), node = %node_id, failure = %id, "failure scheduled");
            plan.created.push(id);
        }

        debug!(
            experiment = experiment.id(),
            matched = matched.len(),
            created = plan.created.len(),
            deleted = plan.deleted.len(),
            "experiment reconciled"
        );
        Ok(plan)
    }

    fn new_failure(&self, experiment: &Experiment, node_id: &str) -> Failure {
        let mut failure = Failure::new(failure_id(experiment.id(), node_id))
            .with_label(EXPERIMENT_LABEL, experiment.id())
            .with_label(NODE_LABEL, node_id)
            .with_spec(experiment.spec.template.clone())
            .with_states(FailureState::Disabled, FailureState::Enabled);
        failure.status.creation = Some(self.clock.now());
        failure
    }
}

/// `<experiment>-<node>-<9 random digits>`
fn failure_id(experiment_id: &str, node_id: &str) -> String {
    let suffix = rand::rng().random_range(0..FAILURE_SUFFIX_MAX);
    format!("{experiment_id}-{node_id}-{suffix:09}")
}

#[async_trait::async_trait]
impl Reconciler for ExperimentReconciler {
    type Object = Experiment;

    fn name(&self) -> &str {
        "experiment"
    }

    async fn reconcile(&self, experiment: Experiment) -> Result<(), ControllerError> {
        self.ensure_failures(&experiment).await.map(|_| ())
    }
}
