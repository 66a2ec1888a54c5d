//! Injection lifecycle with scripted attacks

use chaos_core::{Failure, FailureSpec, FailureState};
use chaos_injection::{Clock, Injection, InjectionError, SharedAttack, SystemClock};
use chaos_test_utils::{wait_until, ImmediateClock, ManualClock, ScriptedAttack};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn failure(state: FailureState) -> Failure {
    Failure::new("flr-001")
        .with_spec(FailureSpec {
            timeout: Duration::from_secs(30),
            ..FailureSpec::default()
        })
        .with_states(state, FailureState::Enabled)
}

fn injection(attacks: &[Arc<ScriptedAttack>], clock: Arc<dyn Clock>) -> Arc<Injection> {
    let attacks: Vec<SharedAttack> = attacks
        .iter()
        .map(|a| Arc::clone(a) as SharedAttack)
        .collect();
    Arc::new(Injection::with_attacks(
        failure(FailureState::Enabled),
        attacks,
        clock,
    ))
}

#[tokio::test]
async fn fail_is_rejected_outside_enabled() {
    for state in [
        FailureState::Unknown,
        FailureState::Executing,
        FailureState::Reverting,
        FailureState::Disabled,
        FailureState::Stale,
        FailureState::Errored,
        FailureState::ErroredReverting,
    ] {
        let attack = Arc::new(ScriptedAttack::ok("a"));
        let injection = Arc::new(Injection::with_attacks(
            failure(state),
            vec![Arc::clone(&attack) as SharedAttack],
            Arc::new(SystemClock),
        ));

        let err = injection.fail().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid state. The only valid state for execution is: enabled"
        );
        assert_eq!(injection.current_state(), state);
        assert_eq!(attack.apply_count(), 0);
    }
}

#[tokio::test]
async fn partial_apply_reverts_only_applied_attacks() {
    let attacks = [
        Arc::new(ScriptedAttack::failing_apply("one")),
        Arc::new(ScriptedAttack::ok("two")),
        Arc::new(ScriptedAttack::failing_apply("three")),
    ];
    let injection = injection(&attacks, Arc::new(ManualClock::new()));

    let err = injection.fail().await.unwrap_err();
    assert_eq!(err.to_string(), "error aplying failure");
    assert!(!err.needs_cleanup());
    assert_eq!(injection.current_state(), FailureState::Errored);

    assert_eq!(attacks[0].revert_count(), 0);
    assert_eq!(attacks[1].revert_count(), 1);
    assert_eq!(attacks[2].revert_count(), 0);
    assert_eq!(injection.errored_count(), 2);
    assert_eq!(injection.applied_count(), 0);
}

#[tokio::test]
async fn failed_rollback_is_reported_as_dirty_abort() {
    let attacks = [
        Arc::new(ScriptedAttack::ok("one")),
        Arc::new(ScriptedAttack::failing_apply("two")),
        Arc::new(ScriptedAttack::failing_revert("three")),
    ];
    let injection = injection(&attacks, Arc::new(ManualClock::new()));

    let err = injection.fail().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "error aplying failure & error when trying to revert the applied ones"
    );
    assert!(err.needs_cleanup());
    assert_eq!(injection.current_state(), FailureState::ErroredReverting);

    assert_eq!(attacks[0].revert_count(), 1);
    assert_eq!(attacks[1].revert_count(), 0);
    assert_eq!(attacks[2].revert_count(), 1);
    // The attack whose revert failed is still considered applied
    assert_eq!(injection.applied_count(), 1);
}

#[tokio::test]
async fn timeout_reverts_without_manual_call() {
    let attack = Arc::new(ScriptedAttack::ok("only"));
    let injection = injection(&[Arc::clone(&attack)], Arc::new(ImmediateClock));

    injection.fail().await.unwrap();

    wait_until(Duration::from_secs(1), || attack.revert_count() == 1).await;
    wait_until(Duration::from_secs(1), || {
        injection.current_state() == FailureState::Disabled
    })
    .await;
    assert!(injection.failure().status.finished.is_some());
}

#[tokio::test]
async fn manual_revert_disarms_timer() {
    let clock = Arc::new(ManualClock::new());
    let attack = Arc::new(ScriptedAttack::ok("only"));
    let injection = injection(&[Arc::clone(&attack)], clock.clone());

    injection.fail().await.unwrap();
    assert_eq!(injection.current_state(), FailureState::Executing);

    injection.revert().await.unwrap();
    assert_eq!(injection.current_state(), FailureState::Disabled);

    clock.fire();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(attack.revert_count(), 1);
}

#[tokio::test]
async fn cancel_triggers_revert() {
    let attack = Arc::new(ScriptedAttack::ok("only"));
    let injection = injection(&[Arc::clone(&attack)], Arc::new(ManualClock::new()));

    injection.fail().await.unwrap();
    injection.cancel();

    wait_until(Duration::from_secs(1), || {
        injection.current_state() == FailureState::Disabled
    })
    .await;
    assert_eq!(attack.revert_count(), 1);
}

#[tokio::test]
async fn revert_errors_are_joined() {
    let attacks = [
        Arc::new(ScriptedAttack::failing_revert("cpu")),
        Arc::new(ScriptedAttack::failing_revert("net")),
    ];
    let injection = injection(&attacks, Arc::new(ManualClock::new()));
    injection.fail().await.unwrap();

    let err = injection.revert().await.unwrap_err();
    let InjectionError::Revert(message) = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(
        message,
        "attack cpu: revert failed: scripted; attack net: revert failed: scripted"
    );
    assert_eq!(injection.current_state(), FailureState::ErroredReverting);
    assert!(injection.cancel_token().is_cancelled());
}

#[tokio::test]
async fn concurrent_fail_executes_once() {
    let attack = Arc::new(ScriptedAttack::ok("slow").with_apply_delay(Duration::from_millis(20)));
    let injection = injection(&[Arc::clone(&attack)], Arc::new(ManualClock::new()));

    let (first, second) = tokio::join!(injection.fail(), injection.fail());
    assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
    assert_eq!(attack.apply_count(), 1);
}

#[tokio::test]
async fn subscribers_observe_terminal_state() {
    let attack = Arc::new(ScriptedAttack::ok("only"));
    let injection = injection(&[Arc::clone(&attack)], Arc::new(ImmediateClock));
    let mut states = injection.subscribe();
    assert_eq!(*states.borrow(), FailureState::Enabled);

    injection.fail().await.unwrap();
    let end = tokio::time::timeout(
        Duration::from_secs(1),
        states.wait_for(|state| state.is_terminal()),
    )
    .await
    .unwrap()
    .map(|state| *state)
    .unwrap();
    assert_eq!(end, FailureState::Disabled);
}

#[tokio::test]
async fn revert_during_apply_waits_and_undoes_it() {
    let clock = Arc::new(ManualClock::new());
    let attack = Arc::new(ScriptedAttack::ok("slow").with_apply_delay(Duration::from_millis(50)));
    let injection = injection(&[Arc::clone(&attack)], clock.clone());

    let applying = tokio::spawn({
        let injection = Arc::clone(&injection);
        async move { injection.fail().await }
    });
    wait_until(Duration::from_secs(1), || {
        injection.current_state() == FailureState::Executing
    })
    .await;
    assert_eq!(attack.apply_count(), 0);

    injection.revert().await.unwrap();
    assert_eq!(attack.apply_count(), 1);
    assert_eq!(attack.revert_count(), 1);
    assert_eq!(injection.applied_count(), 0);
    assert_eq!(injection.current_state(), FailureState::Disabled);

    applying.await.unwrap().unwrap();
    clock.fire();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(attack.revert_count(), 1);
    assert_eq!(injection.current_state(), FailureState::Disabled);
}
