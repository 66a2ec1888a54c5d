//! Failure execution
//!
//! An [`Injection`] runs the attacks of one [`Failure`]:
//! - `fail` applies every attack concurrently, once, from the enabled state
//! - a partial apply reverts the attacks that did apply and ends errored
//! - a full apply arms a timer that reverts after the failure timeout
//! - `revert` undoes the applied attacks and cancels the timer
//!
//! State transitions happen under one mutex; attacks run without it. A
//! separate async phase lock spans whole `fail` and `revert` calls, so a
//! revert requested mid-apply waits for the apply to settle and then undoes
//! it.
//!
//! # Example
//!
//! ```rust,ignore
//! let injection = Arc::new(Injection::new(failure, &registry, Arc::new(SystemClock))?);
//! injection.fail().await?;
//! // ...reverted automatically after `failure.spec.timeout`, or:
//! injection.revert().await?;
//! ```

use crate::attack::SharedAttack;
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::error::{AttackError, InjectionError};
use crate::registry::Registry;
use chaos_core::{Failure, FailureState};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
enum Phase {
    Apply,
    Revert,
}

#[derive(Debug)]
struct InjectionState {
    failure: Failure,
    applied: Vec<SharedAttack>,
    errored: Vec<SharedAttack>,
}

/// Cancels the token when dropped
struct CancelOnDrop<'a>(&'a CancelToken);

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Running instance of a failure on the local node
#[derive(Debug)]
pub struct Injection {
    state: Mutex<InjectionState>,
    phase: tokio::sync::Mutex<()>,
    attacks: Vec<SharedAttack>,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
    state_tx: watch::Sender<FailureState>,
}

impl Injection {
    /// Build the attacks of a failure from a registry
    ///
    /// # Errors
    /// Returns `InjectionError::Attack` if any attack kind is unknown or its
    /// options are rejected.
    pub fn new(
        failure: Failure,
        registry: &dyn Registry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, InjectionError> {
        let attacks = failure
            .spec
            .attacks
            .iter()
            .map(|entry| registry.new_attack(&entry.kind, &entry.opts))
            .collect::<Result<Vec<_>, AttackError>>()?;
        Ok(Self::with_attacks(failure, attacks, clock))
    }

    /// Use prebuilt attacks
    #[must_use]
    pub fn with_attacks(failure: Failure, attacks: Vec<SharedAttack>, clock: Arc<dyn Clock>) -> Self {
        let (state_tx, _) = watch::channel(failure.status.current_state);
        Self {
            state: Mutex::new(InjectionState {
                failure,
                applied: Vec::new(),
                errored: Vec::new(),
            }),
            phase: tokio::sync::Mutex::new(()),
            attacks,
            clock,
            cancel: CancelToken::new(),
            state_tx,
        }
    }

    /// Failure ID
    #[must_use]
    pub fn id(&self) -> String {
        self.state.lock().failure.id().to_string()
    }

    /// Snapshot of the failure with its current status
    #[must_use]
    pub fn failure(&self) -> Failure {
        self.state.lock().failure.clone()
    }

    /// Observed state
    #[must_use]
    pub fn current_state(&self) -> FailureState {
        self.state.lock().failure.status.current_state
    }

    /// Receiver following every change of the observed state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FailureState> {
        self.state_tx.subscribe()
    }

    /// Desired state
    #[must_use]
    pub fn expected_state(&self) -> FailureState {
        self.state.lock().failure.status.expected_state
    }

    /// Change the desired state
    pub fn set_expected_state(&self, expected: FailureState) {
        self.state.lock().failure.status.expected_state = expected;
    }

    /// Number of attacks currently applied
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.state.lock().applied.len()
    }

    /// Number of attacks that failed to apply
    #[must_use]
    pub fn errored_count(&self) -> usize {
        self.state.lock().errored.len()
    }

    /// Cancellation token of this injection
    #[inline]
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Cancel the injection, reverting it if it is executing
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Apply every attack
    ///
    /// # Errors
    /// - `InjectionError::InvalidState` unless the state is enabled; the
    ///   state is left unchanged
    /// - `InjectionError::Apply` if some attacks failed and the rest were
    ///   reverted (state errored)
    /// - `InjectionError::ApplyAndRevert` if reverting those failed too
    ///   (state errored reverting)
    pub async fn fail(self: &Arc<Self>) -> Result<(), InjectionError> {
        let _phase = self.phase.lock().await;
        {
            let mut state = self.state.lock();
            let current = state.failure.status.current_state;
            if current != FailureState::Enabled {
                return Err(InjectionError::InvalidState { current });
            }
            state.failure.status.executed = Some(self.clock.now());
            self.transition(&mut state, FailureState::Executing);
        }
        info!(failure = %self.id(), attacks = self.attacks.len(), "applying failure");

        let results = self.run_phase(Phase::Apply, &self.attacks).await;
        let mut applied = Vec::new();
        let mut errored = Vec::new();
        let mut apply_errors = Vec::new();
        for (attack, result) in self.attacks.iter().zip(results) {
            match result {
                Ok(()) => applied.push(Arc::clone(attack)),
                Err(e) => {
                    errored.push(Arc::clone(attack));
                    apply_errors.push(e);
                }
            }
        }

        if apply_errors.is_empty() {
            self.state.lock().applied = applied;
            self.arm_timeout();
            return Ok(());
        }

        warn!(
            failure = %self.id(),
            failed = apply_errors.len(),
            applied = applied.len(),
            "failure partially applied, rolling back"
        );
        let revert_results = self.run_phase(Phase::Revert, &applied).await;
        let mut leftovers = Vec::new();
        let mut revert_errors = Vec::new();
        for (attack, result) in applied.iter().zip(revert_results) {
            if let Err(e) = result {
                leftovers.push(Arc::clone(attack));
                revert_errors.push(e);
            }
        }

        {
            let mut state = self.state.lock();
            state.errored = errored;
            state.applied = leftovers;
            state.failure.status.finished = Some(self.clock.now());
            let end = if revert_errors.is_empty() {
                FailureState::Errored
            } else {
                FailureState::ErroredReverting
            };
            self.transition(&mut state, end);
        }
        self.cancel.cancel();

        if revert_errors.is_empty() {
            Err(InjectionError::Apply {
                errors: apply_errors,
            })
        } else {
            Err(InjectionError::ApplyAndRevert {
                apply_errors,
                revert_errors,
            })
        }
    }

    /// Revert every applied attack
    ///
    /// Waits for an in-flight `fail` to settle first. Ends disabled, or
    /// errored reverting if any revert failed. Always cancels the injection.
    ///
    /// # Errors
    /// Returns `InjectionError::Revert` with the revert errors joined by
    /// `"; "`.
    pub async fn revert(&self) -> Result<(), InjectionError> {
        let _phase = self.phase.lock().await;
        let applied = {
            let mut state = self.state.lock();
            self.transition(&mut state, FailureState::Reverting);
            state.applied.clone()
        };
        self.revert_applied(applied).await
    }

    /// Revert only if still executing; used by the timeout task
    async fn revert_if_executing(&self) -> Option<Result<(), InjectionError>> {
        let _phase = self.phase.lock().await;
        let applied = {
            let mut state = self.state.lock();
            if state.failure.status.current_state != FailureState::Executing {
                return None;
            }
            self.transition(&mut state, FailureState::Reverting);
            state.applied.clone()
        };
        Some(self.revert_applied(applied).await)
    }

    async fn revert_applied(&self, applied: Vec<SharedAttack>) -> Result<(), InjectionError> {
        let _cancel = CancelOnDrop(&self.cancel);
        info!(failure = %self.id(), attacks = applied.len(), "reverting failure");

        let results = self.run_phase(Phase::Revert, &applied).await;
        let mut leftovers = Vec::new();
        let mut errors = Vec::new();
        for (attack, result) in applied.iter().zip(results) {
            if let Err(e) = result {
                leftovers.push(Arc::clone(attack));
                errors.push(e);
            }
        }

        let mut state = self.state.lock();
        state.applied = leftovers;
        state.failure.status.finished = Some(self.clock.now());
        if errors.is_empty() {
            self.transition(&mut state, FailureState::Disabled);
            Ok(())
        } else {
            self.transition(&mut state, FailureState::ErroredReverting);
            Err(InjectionError::Revert(InjectionError::joined(&errors)))
        }
    }

    fn transition(&self, state: &mut InjectionState, to: FailureState) {
        state.failure.status.current_state = to;
        self.state_tx.send_replace(to);
    }

    fn arm_timeout(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let timeout = self.state.lock().failure.spec.timeout;
        let timer = self.clock.after(timeout);

        tokio::spawn(async move {
            tokio::select! {
                () = timer => debug!(failure = %this.id(), "failure timed out"),
                () = this.cancel.cancelled() => debug!(failure = %this.id(), "failure cancelled"),
            }
            match this.revert_if_executing().await {
                Some(Err(e)) => warn!(failure = %this.id(), error = %e, "automatic revert failed"),
                Some(Ok(())) => info!(failure = %this.id(), "failure reverted automatically"),
                None => {}
            }
        });
    }

    /// Run one phase over `attacks` concurrently, one task per attack
    ///
    /// Results come back in the order of `attacks`.
    async fn run_phase(
        &self,
        phase: Phase,
        attacks: &[SharedAttack],
    ) -> Vec<Result<(), AttackError>> {
        let handles = attacks.iter().map(|attack| {
            let attack = Arc::clone(attack);
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                match phase {
                    Phase::Apply => attack.apply(&cancel).await,
                    Phase::Revert => attack.revert(&cancel).await,
                }
            })
        });
        let joined = join_all(handles.collect::<Vec<_>>()).await;

        attacks
            .iter()
            .zip(joined)
            .map(|(attack, result)| {
                result.unwrap_or_else(|_| {
                    Err(AttackError::Aborted {
                        kind: attack.kind().to_string(),
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::{Attack, NoopAttack};
    use crate::clock::SystemClock;
    use crate::registry::MemoryRegistry;
    use chaos_core::{AttackEntry, AttackList, FailureSpec};
    use std::time::Duration;

    fn failure(state: FailureState) -> Failure {
        Failure::new("f1")
            .with_spec(FailureSpec::new(
                Duration::from_secs(3600),
                AttackList::new(vec![AttackEntry::bare("noop"), AttackEntry::bare("noop")]),
            ))
            .with_states(state, FailureState::Enabled)
    }

    #[test]
    fn unknown_attack_kind_fails_construction() {
        let failure = Failure::new("f1").with_spec(FailureSpec::new(
            Duration::from_secs(1),
            AttackList::new(vec![AttackEntry::bare("disk")]),
        ));
        let err = Injection::new(failure, &MemoryRegistry::with_defaults(), Arc::new(SystemClock))
            .unwrap_err();
        assert_eq!(err, InjectionError::Attack(AttackError::NotRegistered("disk".into())));
    }

    #[tokio::test]
    async fn fail_then_manual_revert() {
        let injection = Arc::new(
            Injection::new(
                failure(FailureState::Enabled),
                &MemoryRegistry::with_defaults(),
                Arc::new(SystemClock),
            )
            .unwrap(),
        );

        injection.fail().await.unwrap();
        assert_eq!(injection.current_state(), FailureState::Executing);
        assert_eq!(injection.applied_count(), 2);
        assert!(injection.failure().status.executed.is_some());

        injection.revert().await.unwrap();
        assert_eq!(injection.current_state(), FailureState::Disabled);
        assert_eq!(injection.applied_count(), 0);
        assert!(injection.failure().status.finished.is_some());
        assert!(injection.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn second_fail_is_rejected() {
        let attack: SharedAttack = Arc::new(NoopAttack::default());
        assert_eq!(attack.kind(), "noop");
        let injection = Arc::new(Injection::with_attacks(
            failure(FailureState::Enabled),
            vec![attack],
            Arc::new(SystemClock),
        ));

        injection.fail().await.unwrap();
        let err = injection.fail().await.unwrap_err();
        assert_eq!(
            err,
            InjectionError::InvalidState {
                current: FailureState::Executing
            }
        );
        assert_eq!(injection.current_state(), FailureState::Executing);
    }
}
