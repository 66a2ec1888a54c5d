//! Testing utilities for the chaos workspace
//!
//! Shared builders, scripted attacks, controllable clocks and a
//! repository wrapper that counts and fails calls on demand.

#![allow(missing_docs)]

use chaos_client::{ClientError, ListOptions, Repository};
use chaos_core::{
    AttackEntry, AttackList, Experiment, Failure, FailureSpec, FailureState, Node, ObjectList,
    SharedObject, EXPERIMENT_LABEL, NODE_LABEL,
};
use chaos_injection::{Attack, AttackError, CancelToken, Clock};
use chaos_watch::Watcher;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn node(id: &str, labels: &[(&str, &str)]) -> Node {
    labels
        .iter()
        .fold(Node::new(id), |node, (key, value)| node.with_label(*key, *value))
}

pub fn noop_template(timeout: Duration) -> FailureSpec {
    FailureSpec::new(timeout, AttackList::new(vec![AttackEntry::bare("noop")]))
}

pub fn experiment(id: &str, selector: &[(&str, &str)]) -> Experiment {
    selector
        .iter()
        .fold(Experiment::new(id), |exp, (key, value)| exp.with_selector(*key, *value))
        .with_template(noop_template(Duration::from_secs(60)))
}

/// Failure as the scheduler would create it
pub fn scheduled_failure(id: &str, experiment_id: &str, node_id: &str) -> Failure {
    Failure::new(id)
        .with_label(EXPERIMENT_LABEL, experiment_id)
        .with_label(NODE_LABEL, node_id)
        .with_spec(noop_template(Duration::from_secs(60)))
        .with_states(FailureState::Disabled, FailureState::Enabled)
}

pub fn shared<T: chaos_core::Object>(object: T) -> SharedObject {
    Arc::new(object)
}

// ---------------------------------------------------------------------------
// Attacks
// ---------------------------------------------------------------------------

/// Attack with scripted outcomes and call counters
#[derive(Debug, Default)]
pub struct ScriptedAttack {
    kind: String,
    fail_apply: bool,
    fail_revert: bool,
    apply_delay: Duration,
    applies: AtomicUsize,
    reverts: AtomicUsize,
}

impl ScriptedAttack {
    pub fn ok(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    pub fn failing_apply(kind: &str) -> Self {
        Self {
            fail_apply: true,
            ..Self::ok(kind)
        }
    }

    pub fn failing_revert(kind: &str) -> Self {
        Self {
            fail_revert: true,
            ..Self::ok(kind)
        }
    }

    #[must_use]
    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = delay;
        self
    }

    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn revert_count(&self) -> usize {
        self.reverts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Attack for ScriptedAttack {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn apply(&self, _cancel: &CancelToken) -> Result<(), AttackError> {
        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }
        self.applies.fetch_add(1, Ordering::SeqCst);
        if self.fail_apply {
            return Err(AttackError::apply(&self.kind, "scripted"));
        }
        Ok(())
    }

    async fn revert(&self, _cancel: &CancelToken) -> Result<(), AttackError> {
        self.reverts.fetch_add(1, Ordering::SeqCst);
        if self.fail_revert {
            return Err(AttackError::revert(&self.kind, "scripted"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Clock whose timers fire immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateClock;

impl Clock for ImmediateClock {
    fn now(&self) -> DateTime<Utc> {
        fixed_now()
    }

    fn after(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        futures::future::ready(()).boxed()
    }
}

/// Clock whose timers fire only when [`ManualClock::fire`] is called
#[derive(Debug, Clone)]
pub struct ManualClock {
    fired: Arc<watch::Sender<bool>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self {
            fired: Arc::new(fired),
        }
    }

    /// Fire every pending and future timer
    pub fn fire(&self) {
        self.fired.send_replace(true);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        fixed_now()
    }

    fn after(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        let fired = Arc::clone(&self.fired);
        async move {
            let mut receiver = fired.subscribe();
            let _ = receiver.wait_for(|fired| *fired).await;
        }
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Repository wrapper counting mutations and failing them on demand
pub struct RecordingRepository {
    inner: Arc<dyn Repository>,
    creates: AtomicUsize,
    deletes: AtomicUsize,
    updates: AtomicUsize,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    yield_calls: AtomicBool,
}

impl std::fmt::Debug for RecordingRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingRepository")
            .field("creates", &self.create_count())
            .field("deletes", &self.delete_count())
            .field("updates", &self.update_count())
            .finish_non_exhaustive()
    }
}

impl RecordingRepository {
    pub fn new(inner: Arc<dyn Repository>) -> Self {
        Self {
            inner,
            creates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            yield_calls: AtomicBool::new(false),
        }
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.creates.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
        self.updates.store(0, Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Yield to the runtime before list and create, so concurrent callers interleave
    pub fn set_yield(&self, enabled: bool) {
        self.yield_calls.store(enabled, Ordering::SeqCst);
    }

    async fn maybe_yield(&self) {
        if self.yield_calls.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait::async_trait]
impl Repository for RecordingRepository {
    async fn create(&self, object: SharedObject) -> Result<SharedObject, ClientError> {
        self.maybe_yield().await;
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("scripted create failure".into()));
        }
        self.inner.create(object).await
    }

    async fn update(&self, object: SharedObject) -> Result<SharedObject, ClientError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(object).await
    }

    async fn update_if_unchanged(
        &self,
        current: SharedObject,
        object: SharedObject,
    ) -> Result<SharedObject, ClientError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_if_unchanged(current, object).await
    }

    async fn delete(&self, full_id: &str) -> Result<(), ClientError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("scripted delete failure".into()));
        }
        self.inner.delete(full_id).await
    }

    async fn get(&self, full_id: &str) -> Result<SharedObject, ClientError> {
        self.inner.get(full_id).await
    }

    async fn list(&self, options: &ListOptions) -> Result<ObjectList, ClientError> {
        self.maybe_yield().await;
        self.inner.list(options).await
    }

    async fn watch(&self, options: &ListOptions) -> Result<Watcher, ClientError> {
        self.inner.watch(options).await
    }
}

// ---------------------------------------------------------------------------
// Waiting
// ---------------------------------------------------------------------------

/// Poll `condition` every millisecond until it holds; panics after `limit`
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {limit:?}"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
