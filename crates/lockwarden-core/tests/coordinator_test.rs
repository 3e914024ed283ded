// Integration tests for change log lock recovery
//
// Exercises the recovering coordinator end to end against the in-memory store
// with scripted liveness verdicts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lockwarden_common::{CancelSignal, Identity, LockError, Result};
use lockwarden_core::{
    CoordinatorRegistry, CoordinatorState, LockCoordinator, LockOutcome, ProbeStep, ReclaimReason,
    RecoveringCoordinator, StandardCoordinator, WaitReason,
};
use lockwarden_oracle::{LivenessOracle, LivenessVerdict};
use lockwarden_store::{LockRecord, LockStore, MemoryLockStore};

const SELF_REALM: &str = "teamA";
const SELF_INSTANCE: &str = "worker-9";

/// Oracle returning a fixed verdict and counting queries
struct ScriptedOracle {
    verdict: LivenessVerdict,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    fn new(verdict: LivenessVerdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessOracle for ScriptedOracle {
    async fn is_alive(&self, _realm: &str, _instance: &str) -> LivenessVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
    }
}

/// Oracle whose request never completes
struct HangingOracle;

#[async_trait]
impl LivenessOracle for HangingOracle {
    async fn is_alive(&self, _realm: &str, _instance: &str) -> LivenessVerdict {
        std::future::pending::<LivenessVerdict>().await
    }
}

/// Store whose reads always fail
struct UnreachableStore;

#[async_trait]
impl LockStore for UnreachableStore {
    async fn read(&self) -> Result<LockRecord> {
        Err(LockError::StoreRead("connection refused".to_string()))
    }

    async fn try_acquire(&self, _holder: &str) -> Result<bool> {
        Err(LockError::StoreWrite("connection refused".to_string()))
    }

    async fn release(&self, _holder: &str) -> Result<bool> {
        Err(LockError::StoreWrite("connection refused".to_string()))
    }

    async fn force_release(&self) -> Result<()> {
        Err(LockError::StoreWrite("connection refused".to_string()))
    }
}

fn self_identity() -> Identity {
    Identity::new(SELF_REALM, SELF_INSTANCE).unwrap()
}

fn held_by(holder: &str) -> Arc<MemoryLockStore> {
    Arc::new(MemoryLockStore::with_record(LockRecord::locked_by(
        holder,
        Utc::now(),
    )))
}

fn recovering(
    store: Arc<dyn LockStore>,
    oracle: Arc<dyn LivenessOracle>,
    backoff: Duration,
) -> RecoveringCoordinator {
    RecoveringCoordinator::new(&self_identity(), store, oracle, backoff)
}

// ============================================================================
// Single probe cycles
// ============================================================================

#[tokio::test]
async fn test_free_lock_is_acquired_under_own_identity() {
    let store = Arc::new(MemoryLockStore::new());
    let oracle = ScriptedOracle::new(LivenessVerdict::Alive);
    let coordinator = recovering(store.clone(), oracle.clone(), Duration::from_millis(10));

    let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

    assert_eq!(step, ProbeStep::Acquired);
    let record = store.snapshot();
    assert!(record.is_held_by("teamA:worker-9"));
    assert!(record.granted_at.is_some());
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_dead_holder_is_released() {
    let store = held_by("teamA:worker-7");
    let oracle = ScriptedOracle::new(LivenessVerdict::Dead);
    let coordinator = recovering(store.clone(), oracle.clone(), Duration::from_millis(10));

    let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

    assert_eq!(step, ProbeStep::Reclaimed(ReclaimReason::HolderDead));
    assert!(!store.snapshot().locked);
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn test_alive_holder_is_left_alone() {
    let store = held_by("teamA:worker-7");
    let oracle = ScriptedOracle::new(LivenessVerdict::Alive);
    let coordinator = recovering(store.clone(), oracle.clone(), Duration::from_millis(10));

    let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

    assert_eq!(step, ProbeStep::Wait(WaitReason::HolderAlive));
    assert_eq!(coordinator.state(), CoordinatorState::Waiting);
    assert!(store.snapshot().is_held_by("teamA:worker-7"));
}

#[tokio::test]
async fn test_unknown_holder_is_treated_as_alive() {
    let store = held_by("teamA:worker-7");
    let oracle = ScriptedOracle::new(LivenessVerdict::Unknown);
    let coordinator = recovering(store.clone(), oracle.clone(), Duration::from_millis(10));

    let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

    assert_eq!(step, ProbeStep::Wait(WaitReason::HolderUnknown));
    assert!(store.snapshot().is_held_by("teamA:worker-7"));
}

#[tokio::test]
async fn test_self_held_lock_is_released_without_oracle() {
    let store = held_by("teamA:worker-9");
    // The oracle is never consulted about ourselves
    let oracle = ScriptedOracle::new(LivenessVerdict::Alive);
    let coordinator = recovering(store.clone(), oracle.clone(), Duration::from_millis(10));

    let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

    assert_eq!(step, ProbeStep::Reclaimed(ReclaimReason::SelfHeld));
    assert!(!store.snapshot().locked);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_padded_identity_recognises_its_own_lock() {
    let identity = Identity::new(" teamA", "worker-9 ").unwrap();
    let store = held_by(&identity.holder());
    let oracle = ScriptedOracle::new(LivenessVerdict::Alive);
    let coordinator = RecoveringCoordinator::new(
        &identity,
        store.clone(),
        oracle.clone(),
        Duration::from_millis(10),
    );

    let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

    assert_eq!(step, ProbeStep::Reclaimed(ReclaimReason::SelfHeld));
    assert!(!store.snapshot().locked);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_malformed_holders_are_never_released() {
    for holder in ["garbage-no-delimiter", "a:b:c", "build-host (42)", ":worker-7"] {
        let store = held_by(holder);
        let oracle = ScriptedOracle::new(LivenessVerdict::Dead);
        let coordinator = recovering(store.clone(), oracle.clone(), Duration::from_millis(10));

        let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

        assert_eq!(step, ProbeStep::Wait(WaitReason::MalformedHolder), "holder {holder:?}");
        assert!(store.snapshot().is_held_by(holder), "holder {holder:?}");
        assert_eq!(oracle.calls(), 0);
    }
}

#[tokio::test]
async fn test_locked_without_holder_waits() {
    let store = Arc::new(MemoryLockStore::with_record(LockRecord {
        locked: true,
        granted_at: Some(Utc::now()),
        holder: None,
    }));
    let oracle = ScriptedOracle::new(LivenessVerdict::Dead);
    let coordinator = recovering(store.clone(), oracle, Duration::from_millis(10));

    let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

    assert_eq!(step, ProbeStep::Wait(WaitReason::MalformedHolder));
    assert!(store.snapshot().locked);
}

/// Oracle that hands the lock to a third instance while it is being consulted
struct RacingOracle {
    store: Arc<MemoryLockStore>,
}

#[async_trait]
impl LivenessOracle for RacingOracle {
    async fn is_alive(&self, _realm: &str, _instance: &str) -> LivenessVerdict {
        self.store.force_release().await.unwrap();
        self.store.try_acquire("teamA:worker-3").await.unwrap();
        LivenessVerdict::Dead
    }
}

#[tokio::test]
async fn test_reclaim_never_clears_a_new_holder() {
    let store = held_by("teamA:worker-7");
    let oracle = Arc::new(RacingOracle {
        store: store.clone(),
    });
    let coordinator = recovering(store.clone(), oracle, Duration::from_millis(10));

    let step = coordinator.probe_once(&CancelSignal::new()).await.unwrap();

    assert_eq!(step, ProbeStep::LostRace);
    assert!(store.snapshot().is_held_by("teamA:worker-3"));
}

// ============================================================================
// Full wait loop
// ============================================================================

#[tokio::test]
async fn test_dead_holder_scenario_ends_with_self_holding() {
    let store = held_by("teamA:worker-7");
    let oracle = ScriptedOracle::new(LivenessVerdict::Dead);
    let coordinator = recovering(store.clone(), oracle, Duration::from_secs(30));

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        coordinator.wait_for_lock(&CancelSignal::new()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome, LockOutcome::Acquired);
    assert!(coordinator.has_lock());
    assert_eq!(coordinator.state(), CoordinatorState::Acquired);
    assert!(store.snapshot().is_held_by("teamA:worker-9"));
}

#[tokio::test]
async fn test_self_held_scenario_reacquires_immediately() {
    let store = held_by("teamA:worker-9");
    let coordinator = recovering(
        store.clone(),
        ScriptedOracle::new(LivenessVerdict::Unknown),
        Duration::from_secs(30),
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        coordinator.wait_for_lock(&CancelSignal::new()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome, LockOutcome::Acquired);
    assert!(store.snapshot().is_held_by("teamA:worker-9"));
}

#[tokio::test]
async fn test_waits_for_alive_holder_then_acquires() {
    let store = held_by("teamA:worker-7");
    let oracle = ScriptedOracle::new(LivenessVerdict::Alive);
    let coordinator = recovering(store.clone(), oracle.clone(), Duration::from_millis(20));

    let releaser = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        releaser.release("teamA:worker-7").await.unwrap();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.wait_for_lock(&CancelSignal::new()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome, LockOutcome::Acquired);
    assert!(oracle.calls() >= 1);
    assert!(store.snapshot().is_held_by("teamA:worker-9"));
}

#[tokio::test]
async fn test_cancel_during_backoff() {
    let store = held_by("teamA:worker-7");
    let coordinator = recovering(
        store.clone(),
        ScriptedOracle::new(LivenessVerdict::Alive),
        Duration::from_secs(60),
    );

    let cancel = CancelSignal::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(2), coordinator.wait_for_lock(&cancel))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome, LockOutcome::Cancelled);
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
    assert!(store.snapshot().is_held_by("teamA:worker-7"));
}

#[tokio::test]
async fn test_cancel_during_oracle_call() {
    let store = held_by("teamA:worker-7");
    let coordinator = recovering(store.clone(), Arc::new(HangingOracle), Duration::from_secs(60));

    let cancel = CancelSignal::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(2), coordinator.wait_for_lock(&cancel))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome, LockOutcome::Cancelled);
    assert!(store.snapshot().is_held_by("teamA:worker-7"));
}

#[tokio::test]
async fn test_already_cancelled_never_touches_store() {
    let coordinator = recovering(
        Arc::new(UnreachableStore),
        ScriptedOracle::new(LivenessVerdict::Alive),
        Duration::from_millis(10),
    );
    let cancel = CancelSignal::new();
    cancel.cancel();

    let outcome = coordinator.wait_for_lock(&cancel).await.unwrap();
    assert_eq!(outcome, LockOutcome::Cancelled);
}

#[tokio::test]
async fn test_store_errors_abort_the_wait() {
    let coordinator = recovering(
        Arc::new(UnreachableStore),
        ScriptedOracle::new(LivenessVerdict::Alive),
        Duration::from_millis(10),
    );

    let err = coordinator
        .wait_for_lock(&CancelSignal::new())
        .await
        .unwrap_err();

    assert!(err.is_store_error());
    assert!(matches!(err, LockError::StoreRead(_)));
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn test_racing_coordinators_one_winner() {
    let store = Arc::new(MemoryLockStore::new());
    let oracle = ScriptedOracle::new(LivenessVerdict::Alive);

    let mut handles = Vec::new();
    for i in 0..8 {
        let coordinator = RecoveringCoordinator::new(
            &Identity::new(SELF_REALM, format!("worker-{i}")).unwrap(),
            store.clone(),
            oracle.clone(),
            Duration::from_millis(10),
        );
        handles.push(tokio::spawn(async move {
            coordinator.probe_once(&CancelSignal::new()).await.unwrap()
        }));
    }

    let mut acquired = 0;
    for handle in handles {
        if handle.await.unwrap() == ProbeStep::Acquired {
            acquired += 1;
        }
    }
    assert_eq!(acquired, 1);
}

// ============================================================================
// Operator surface and selection
// ============================================================================

#[tokio::test]
async fn test_list_and_force_release() {
    let store = held_by("teamA:worker-7");
    let coordinator = recovering(
        store.clone(),
        ScriptedOracle::new(LivenessVerdict::Alive),
        Duration::from_millis(10),
    );

    let locks = coordinator.list_locks().await.unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].current_holder(), Some("teamA:worker-7"));

    coordinator.force_release_lock().await.unwrap();
    assert!(coordinator.list_locks().await.unwrap().is_empty());
    assert!(!store.snapshot().locked);
}

#[tokio::test]
async fn test_release_only_clears_own_lock() {
    let store = held_by("teamA:worker-7");
    let coordinator = recovering(
        store.clone(),
        ScriptedOracle::new(LivenessVerdict::Alive),
        Duration::from_millis(10),
    );

    assert!(!coordinator.release_lock().await.unwrap());
    assert!(store.snapshot().is_held_by("teamA:worker-7"));
}

#[tokio::test]
async fn test_registry_prefers_recovery_when_identity_resolves() {
    let store: Arc<dyn LockStore> = Arc::new(MemoryLockStore::new());
    let standard = Arc::new(StandardCoordinator::new(
        store.clone(),
        "build-host (42)",
        Duration::from_millis(10),
        Duration::from_secs(1),
    ));
    let mut registry = CoordinatorRegistry::new(standard);
    registry.register(Arc::new(recovering(
        store.clone(),
        ScriptedOracle::new(LivenessVerdict::Alive),
        Duration::from_millis(10),
    )));

    let selected = registry.select();
    assert_eq!(selected.name(), "recovering");
    assert!(selected.priority() > registry.fallback().priority());

    assert_eq!(
        selected.wait_for_lock(&CancelSignal::new()).await.unwrap(),
        LockOutcome::Acquired
    );
    assert!(store.read().await.unwrap().is_held_by("teamA:worker-9"));
}
