//! Failure agent driven by a controller

use chaos_client::{
    ClientError, ListOptions, MemoryRepository, Repository, RepositoryListerWatcher, ResourceClient,
};
use chaos_controller::{Controller, ControllerError, FailureAgent, Reconciler};
use chaos_core::{Failure, FailureState, ObjectList, SharedObject, TypeMeta};
use chaos_informer::WorkQueueInformer;
use chaos_injection::{Clock, MemoryRegistry};
use chaos_test_utils::{node, scheduled_failure, shared, ImmediateClock, ManualClock};
use chaos_watch::Watcher;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

const LIMIT: Duration = Duration::from_secs(2);

struct Fixture {
    memory: Arc<MemoryRepository>,
    failures: ResourceClient<Failure>,
    controller: Arc<Controller<FailureAgent>>,
    handle: JoinHandle<Result<(), ControllerError>>,
}

impl Fixture {
    async fn start(clock: Arc<dyn Clock>) -> Self {
        let memory = Arc::new(MemoryRepository::new());
        memory.seed([shared(node("node1", &[])), shared(node("node2", &[]))]);
        let repository: Arc<dyn Repository> = memory.clone();

        let agent = FailureAgent::new(
            "node1",
            Arc::clone(&repository),
            Arc::new(MemoryRegistry::with_defaults()),
            clock,
        );
        let informer = WorkQueueInformer::new(
            Arc::new(RepositoryListerWatcher::new(Arc::clone(&repository))),
            agent.list_options(),
        );
        let controller = Arc::new(Controller::new(informer, Arc::new(agent)));
        let handle = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.run().await }
        });

        let mux = memory.factory().get_for(&TypeMeta::failure());
        chaos_test_utils::wait_until(LIMIT, || mux.watcher_count() == 1).await;

        Self {
            memory,
            failures: ResourceClient::new(repository, TypeMeta::failure()),
            controller,
            handle,
        }
    }

    fn agent(&self) -> &FailureAgent {
        self.controller.reconciler()
    }

    async fn stored(&self, id: &str) -> Option<Failure> {
        self.failures.get(id).await.ok()
    }

    /// Poll the stored failure until `condition` holds
    async fn wait_stored(&self, id: &str, condition: impl Fn(&Failure) -> bool) -> Failure {
        let deadline = tokio::time::Instant::now() + LIMIT;
        loop {
            if let Some(failure) = self.stored(id).await {
                if condition(&failure) {
                    return failure;
                }
            }
            assert!(tokio::time::Instant::now() < deadline, "failure {id} never converged");
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn shutdown(self) {
        self.controller.stop().unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn executes_and_records_auto_revert() {
    let fixture = Fixture::start(Arc::new(ImmediateClock)).await;
    fixture
        .failures
        .create(scheduled_failure("f1", "exp", "node1"))
        .await
        .unwrap();

    let stored = fixture
        .wait_stored("f1", |f| {
            f.status.current_state == FailureState::Disabled && f.status.finished.is_some()
        })
        .await;
    assert!(stored.status.executed.is_some());
    assert_eq!(stored.status.expected_state, FailureState::Enabled);

    let injection = fixture.agent().injection("f1").unwrap();
    assert_eq!(injection.current_state(), FailureState::Disabled);
    fixture.shutdown().await;
}

#[tokio::test]
async fn executes_once_and_stays_executing() {
    let fixture = Fixture::start(Arc::new(ManualClock::new())).await;
    fixture
        .failures
        .create(scheduled_failure("f1", "exp", "node1"))
        .await
        .unwrap();

    fixture
        .wait_stored("f1", |f| f.status.current_state == FailureState::Executing)
        .await;
    let first = fixture.agent().injection("f1").unwrap();

    // Touch the object; the agent must not start a second injection.
    let mut stored = fixture.stored("f1").await.unwrap();
    stored.metadata.annotations.insert("touched".into(), "yes".into());
    fixture.failures.update(stored).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = fixture.agent().injection("f1").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.current_state(), FailureState::Executing);
    fixture.shutdown().await;
}

#[tokio::test]
async fn ignores_failures_of_other_nodes() {
    let fixture = Fixture::start(Arc::new(ManualClock::new())).await;
    fixture
        .failures
        .create(scheduled_failure("f2", "exp", "node2"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(fixture.agent().injection("f2").is_none());
    let stored = fixture.stored("f2").await.unwrap();
    assert_eq!(stored.status.current_state, FailureState::Disabled);
    fixture.shutdown().await;
}

#[tokio::test]
async fn expected_disabled_reverts() {
    let fixture = Fixture::start(Arc::new(ManualClock::new())).await;
    fixture
        .failures
        .create(scheduled_failure("f1", "exp", "node1"))
        .await
        .unwrap();
    let mut stored = fixture
        .wait_stored("f1", |f| f.status.current_state == FailureState::Executing)
        .await;

    stored.status.expected_state = FailureState::Disabled;
    fixture.failures.update(stored).await.unwrap();

    let stored = fixture
        .wait_stored("f1", |f| f.status.current_state == FailureState::Disabled)
        .await;
    assert_eq!(stored.status.expected_state, FailureState::Disabled);
    assert!(stored.status.finished.is_some());
    fixture.shutdown().await;
}

#[tokio::test]
async fn deletion_reverts_live_injection() {
    let fixture = Fixture::start(Arc::new(ManualClock::new())).await;
    fixture
        .failures
        .create(scheduled_failure("f1", "exp", "node1"))
        .await
        .unwrap();
    fixture
        .wait_stored("f1", |f| f.status.current_state == FailureState::Executing)
        .await;
    let injection = fixture.agent().injection("f1").unwrap();

    fixture.failures.delete("f1").await.unwrap();

    chaos_test_utils::wait_until(LIMIT, || {
        injection.current_state() == FailureState::Disabled
    })
    .await;
    chaos_test_utils::wait_until(LIMIT, || fixture.agent().injection("f1").is_none()).await;
    assert_eq!(fixture.memory.list(&ListOptions::new(TypeMeta::failure())).await.unwrap().len(), 0);
    fixture.shutdown().await;
}

/// Lands one queued write right after the next read, as an operator racing the agent would
struct InterleavedWrites {
    inner: Arc<MemoryRepository>,
    queued: Mutex<Option<SharedObject>>,
}

#[async_trait::async_trait]
impl Repository for InterleavedWrites {
    async fn create(&self, object: SharedObject) -> Result<SharedObject, ClientError> {
        self.inner.create(object).await
    }

    async fn update(&self, object: SharedObject) -> Result<SharedObject, ClientError> {
        self.inner.update(object).await
    }

    async fn update_if_unchanged(
        &self,
        current: SharedObject,
        object: SharedObject,
    ) -> Result<SharedObject, ClientError> {
        self.inner.update_if_unchanged(current, object).await
    }

    async fn delete(&self, full_id: &str) -> Result<(), ClientError> {
        self.inner.delete(full_id).await
    }

    async fn get(&self, full_id: &str) -> Result<SharedObject, ClientError> {
        let object = self.inner.get(full_id).await?;
        let queued = self.queued.lock().unwrap().take();
        if let Some(write) = queued {
            self.inner.update(write).await?;
        }
        Ok(object)
    }

    async fn list(&self, options: &ListOptions) -> Result<ObjectList, ClientError> {
        self.inner.list(options).await
    }

    async fn watch(&self, options: &ListOptions) -> Result<Watcher, ClientError> {
        self.inner.watch(options).await
    }
}

#[tokio::test]
async fn status_write_keeps_a_concurrent_disable() {
    let memory = Arc::new(MemoryRepository::new());
    memory.seed([shared(scheduled_failure("f1", "exp", "node1"))]);

    let mut disabled = scheduled_failure("f1", "exp", "node1");
    disabled.status.expected_state = FailureState::Disabled;
    let repository = Arc::new(InterleavedWrites {
        inner: Arc::clone(&memory),
        queued: Mutex::new(Some(shared(disabled))),
    });
    let repository: Arc<dyn Repository> = repository;
    let failures = ResourceClient::<Failure>::new(Arc::clone(&repository), TypeMeta::failure());

    let agent = FailureAgent::new(
        "node1",
        Arc::clone(&repository),
        Arc::new(MemoryRegistry::with_defaults()),
        Arc::new(ManualClock::new()),
    );
    agent
        .reconcile(scheduled_failure("f1", "exp", "node1"))
        .await
        .unwrap();

    // The disable landed between the agent's read and write; it must survive.
    let stored = failures.get("f1").await.unwrap();
    assert_eq!(stored.status.expected_state, FailureState::Disabled);
    assert_eq!(stored.status.current_state, FailureState::Executing);

    agent.reconcile(stored).await.unwrap();
    let stored = failures.get("f1").await.unwrap();
    assert_eq!(stored.status.expected_state, FailureState::Disabled);
    assert_eq!(stored.status.current_state, FailureState::Disabled);
    assert_eq!(agent.injection("f1").unwrap().current_state(), FailureState::Disabled);
}
