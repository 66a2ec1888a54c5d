//! Experiment scheduling against an in-memory repository

use chaos_client::{ListOptions, MemoryRepository, Repository};
use chaos_controller::{ControllerError, ExperimentReconciler};
use chaos_core::{Failure, FailureState, TypeMeta, EXPERIMENT_LABEL};
use chaos_test_utils::{experiment, node, shared, ImmediateClock, RecordingRepository};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Arc;

struct Fixture {
    memory: Arc<MemoryRepository>,
    recording: Arc<RecordingRepository>,
    scheduler: ExperimentReconciler,
}

impl Fixture {
    fn new(nodes: &[(&str, &str)]) -> Self {
        let memory = Arc::new(MemoryRepository::new());
        memory.seed(
            nodes
                .iter()
                .map(|(id, zone)| shared(node(id, &[("zone", zone)]))),
        );
        let inner: Arc<dyn Repository> = memory.clone();
        let recording = Arc::new(RecordingRepository::new(inner));
        let repository: Arc<dyn Repository> = recording.clone();
        let scheduler = ExperimentReconciler::new(repository, Arc::new(ImmediateClock));
        Self {
            memory,
            recording,
            scheduler,
        }
    }

    /// Stored failures keyed by node label
    async fn failures_by_node(&self) -> BTreeMap<String, Failure> {
        self.memory
            .list(&ListOptions::new(TypeMeta::failure()))
            .await
            .unwrap()
            .typed::<Failure>()
            .into_iter()
            .filter_map(|f| Some((f.node_id()?.to_string(), f)))
            .collect()
    }

    async fn failure_ids(&self) -> Vec<String> {
        self.memory
            .list(&ListOptions::new(TypeMeta::failure()))
            .await
            .unwrap()
            .typed::<Failure>()
            .iter()
            .map(|f| f.id().to_string())
            .collect()
    }

    async fn relabel(&self, id: &str, zone: &str) {
        self.memory
            .update(shared(node(id, &[("zone", zone)])))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn schedules_one_failure_per_selected_node() {
    let fixture = Fixture::new(&[("node1", "a"), ("node2", "a"), ("node3", "b")]);
    let exp = experiment("exp", &[("zone", "a")]);

    let plan = fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert_eq!(plan.created.len(), 2);
    assert!(plan.deleted.is_empty());

    let failures = fixture.failures_by_node().await;
    assert_eq!(
        failures.keys().cloned().collect::<Vec<_>>(),
        vec!["node1".to_string(), "node2".to_string()]
    );
    for (node_id, failure) in &failures {
        assert!(failure.id().starts_with(&format!("exp-{node_id}-")));
        assert_eq!(failure.experiment_id(), Some("exp"));
        assert_eq!(failure.spec, exp.spec.template);
        assert_eq!(failure.status.current_state, FailureState::Disabled);
        assert_eq!(failure.status.expected_state, FailureState::Enabled);
        assert!(failure.status.creation.is_some());
    }
}

#[tokio::test]
async fn second_pass_changes_nothing() {
    let fixture = Fixture::new(&[("node1", "a"), ("node2", "a")]);
    let exp = experiment("exp", &[("zone", "a")]);

    fixture.scheduler.ensure_failures(&exp).await.unwrap();
    fixture.recording.reset_counts();

    let plan = fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert!(plan.is_noop());
    assert_eq!(fixture.recording.create_count(), 0);
    assert_eq!(fixture.recording.delete_count(), 0);
}

#[tokio::test]
async fn follows_selector_changes() {
    let fixture = Fixture::new(&[("node1", "a"), ("node2", "a"), ("node3", "b")]);
    let exp = experiment("exp", &[("zone", "a")]);
    fixture.scheduler.ensure_failures(&exp).await.unwrap();
    let before = fixture.failures_by_node().await;

    fixture.relabel("node2", "b").await;
    fixture.relabel("node3", "a").await;

    let plan = fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert_eq!(plan.deleted, vec![before["node2"].id().to_string()]);
    assert_eq!(plan.created.len(), 1);

    let after = fixture.failures_by_node().await;
    assert_eq!(
        after.keys().cloned().collect::<Vec<_>>(),
        vec!["node1".to_string(), "node3".to_string()]
    );
    assert_eq!(after["node1"].id(), before["node1"].id());
}

#[tokio::test]
async fn delete_errors_are_skipped() {
    let fixture = Fixture::new(&[("node1", "a")]);
    let exp = experiment("exp", &[("zone", "a")]);
    fixture.scheduler.ensure_failures(&exp).await.unwrap();

    fixture.relabel("node1", "b").await;
    fixture.recording.set_fail_delete(true);

    let plan = fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert!(plan.is_noop());
    assert_eq!(fixture.recording.delete_count(), 1);
    assert_eq!(fixture.failures_by_node().await.len(), 1);

    fixture.recording.set_fail_delete(false);
    let plan = fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert_eq!(plan.deleted.len(), 1);
    assert!(fixture.failures_by_node().await.is_empty());
}

#[tokio::test]
async fn create_errors_abort_the_pass() {
    let fixture = Fixture::new(&[("node1", "a"), ("node2", "a")]);
    let exp = experiment("exp", &[("zone", "a")]);
    fixture.recording.set_fail_create(true);

    let err = fixture.scheduler.ensure_failures(&exp).await.unwrap_err();
    assert!(matches!(err, ControllerError::Client(_)));
    assert!(err.is_retryable());
    assert_eq!(fixture.recording.create_count(), 1);

    fixture.recording.set_fail_create(false);
    let plan = fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert_eq!(plan.created.len(), 2);
}

#[tokio::test]
async fn unlabelled_failures_are_left_alone() {
    let fixture = Fixture::new(&[("node1", "a")]);
    let stray = Failure::new("stray").with_label(EXPERIMENT_LABEL, "exp");
    fixture.memory.seed([shared(stray)]);

    let plan = fixture
        .scheduler
        .ensure_failures(&experiment("exp", &[("zone", "a")]))
        .await
        .unwrap();

    assert_eq!(plan.created.len(), 1);
    assert!(plan.deleted.is_empty());
    let all = fixture
        .memory
        .list(&ListOptions::new(TypeMeta::failure()))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn other_experiments_are_not_touched() {
    let fixture = Fixture::new(&[("node1", "a"), ("node2", "b")]);
    fixture
        .scheduler
        .ensure_failures(&experiment("a", &[("zone", "a")]))
        .await
        .unwrap();

    let plan = fixture
        .scheduler
        .ensure_failures(&experiment("b", &[("zone", "b")]))
        .await
        .unwrap();

    assert_eq!(plan.created.len(), 1);
    assert!(plan.deleted.is_empty());
    assert_eq!(fixture.failures_by_node().await.len(), 2);
}

#[tokio::test]
async fn node_deletion_collects_its_failure() {
    let fixture = Fixture::new(&[("node1", "a"), ("node2", "b")]);
    let exp = experiment("exp", &[("zone", "a")]);
    fixture.scheduler.ensure_failures(&exp).await.unwrap();
    let before = fixture.failures_by_node().await;

    fixture.memory.delete("chaos/v1/node/node1").await.unwrap();
    fixture
        .memory
        .create(shared(node("node3", &[("zone", "a")])))
        .await
        .unwrap();
    fixture.recording.reset_counts();

    let plan = fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert_eq!(fixture.recording.delete_count(), 1);
    assert_eq!(fixture.recording.create_count(), 1);
    assert_eq!(plan.deleted, vec![before["node1"].id().to_string()]);

    let after = fixture.failures_by_node().await;
    assert_eq!(after.keys().cloned().collect::<Vec<_>>(), vec!["node3".to_string()]);
}

#[tokio::test]
async fn overlapping_passes_converge_to_one_failure_per_node() {
    let fixture = Fixture::new(&[("node1", "a")]);
    let exp = experiment("exp", &[("zone", "a")]);
    fixture.recording.set_yield(true);

    let (first, second) = tokio::join!(
        fixture.scheduler.ensure_failures(&exp),
        fixture.scheduler.ensure_failures(&exp)
    );
    first.unwrap();
    second.unwrap();
    let racing = fixture.failure_ids().await;
    assert!(!racing.is_empty());

    let plan = fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert_eq!(plan.deleted.len(), racing.len() - 1);
    assert!(plan.created.is_empty());
    let survivors = fixture.failure_ids().await;
    assert_eq!(survivors.len(), 1);
    assert!(racing.contains(&survivors[0]));

    fixture.relabel("node1", "b").await;
    fixture.scheduler.ensure_failures(&exp).await.unwrap();
    assert!(fixture.failure_ids().await.is_empty());
}

#[tokio::test]
async fn ids_unfit_for_labels_are_rejected_on_create() {
    let fixture = Fixture::new(&[("node1", "a")]);

    let err = fixture
        .memory
        .create(shared(experiment("exp:1", &[("zone", "a")])))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let long_node = "n".repeat(64);
    let err = fixture
        .memory
        .create(shared(node(&long_node, &[("zone", "a")])))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
