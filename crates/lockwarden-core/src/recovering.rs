//! Coordinator that reclaims locks left behind by dead instances
//!
//! Each probe cycle reads the lock record and decides between acquiring,
//! reclaiming and waiting:
//!
//! - free: try to acquire under our own identity
//! - held by our own identity: a previous run of this instance died holding
//!   it, so release it without asking the oracle
//! - held by another identity: ask the oracle; only a confirmed `Dead`
//!   holder is released, `Alive` and `Unknown` both mean wait
//! - held by a token that is not an identity: wait, never release
//!
//! A reclaim only clears the lock if it is still held by the exact holder
//! that was judged stale.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lockwarden_common::{CancelSignal, Identity, IdentityProvider, LockError, Result};
use lockwarden_oracle::{LivenessOracle, LivenessVerdict};
use lockwarden_store::{LockRecord, LockStore};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::traits::{LockCoordinator, LockOutcome, held_records};

pub const RECOVERING_PRIORITY: i32 = 1000;

const NAME: &str = "recovering";

/// Where the coordinator is in its acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Probing,
    Reclaiming,
    Waiting,
    Acquired,
}

/// Why a stale lock was released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimReason {
    SelfHeld,
    HolderDead,
}

/// Why a probe cycle decided to back off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    HolderAlive,
    HolderUnknown,
    MalformedHolder,
}

/// Result of a single probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStep {
    Acquired,
    /// Another writer changed the record between our read and our write
    LostRace,
    Reclaimed(ReclaimReason),
    Wait(WaitReason),
    Cancelled,
}

pub struct RecoveringCoordinator {
    identity: Option<Identity>,
    store: Arc<dyn LockStore>,
    oracle: Arc<dyn LivenessOracle>,
    backoff: Duration,
    has_lock: AtomicBool,
    state: Mutex<CoordinatorState>,
}

impl RecoveringCoordinator {
    /// Build the coordinator; it disables itself if the identity cannot be resolved
    pub fn new(
        identity_provider: &dyn IdentityProvider,
        store: Arc<dyn LockStore>,
        oracle: Arc<dyn LivenessOracle>,
        backoff: Duration,
    ) -> Self {
        let identity = match identity_provider.resolve() {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "Cannot resolve process identity, lock recovery disabled");
                None
            }
        };

        Self {
            identity,
            store,
            oracle,
            backoff,
            has_lock: AtomicBool::new(false),
            state: Mutex::new(CoordinatorState::Idle),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock()
    }

    fn set_state(&self, state: CoordinatorState) {
        *self.state.lock() = state;
    }

    fn require_identity(&self) -> Result<&Identity> {
        self.identity.as_ref().ok_or_else(|| {
            LockError::Configuration(
                "process identity is not resolved, lock recovery is disabled".to_string(),
            )
        })
    }

    /// Ask the oracle about this process itself.
    ///
    /// Anything but `Alive` means the oracle cannot be trusted to judge other holders.
    pub async fn self_check(&self) -> LivenessVerdict {
        let Some(identity) = &self.identity else {
            return LivenessVerdict::Unknown;
        };

        let verdict = self
            .oracle
            .is_alive(identity.realm(), identity.instance())
            .await;
        if verdict == LivenessVerdict::Alive {
            info!(identity = %identity, "Liveness oracle self-check passed");
        } else {
            warn!(identity = %identity, verdict = %verdict, "Liveness oracle self-check failed");
        }
        verdict
    }

    /// Run one probe cycle against the store
    pub async fn probe_once(&self, cancel: &CancelSignal) -> Result<ProbeStep> {
        let identity = self.require_identity()?;
        let me = identity.holder();

        self.set_state(CoordinatorState::Probing);
        let record = self.store.read().await?;

        if !record.locked {
            return if self.store.try_acquire(&me).await? {
                self.has_lock.store(true, Ordering::SeqCst);
                self.set_state(CoordinatorState::Acquired);
                info!(holder = %me, "Acquired change log lock");
                Ok(ProbeStep::Acquired)
            } else {
                debug!(holder = %me, "Lost change log lock race, probing again");
                Ok(ProbeStep::LostRace)
            };
        }

        let Some(holder) = record.current_holder() else {
            warn!("Change log lock is held without a holder, waiting");
            return Ok(self.wait(WaitReason::MalformedHolder));
        };

        let owner = match Identity::parse_holder(holder) {
            Ok(owner) => owner,
            Err(e) => {
                warn!(error = %e, "Change log lock holder is not an instance identity, waiting");
                return Ok(self.wait(WaitReason::MalformedHolder));
            }
        };

        if owner == *identity {
            info!(
                holder = %holder,
                "Change log lock is held by this instance from an earlier run, releasing"
            );
            return self.reclaim(holder, ReclaimReason::SelfHeld).await;
        }

        let query = self.oracle.is_alive(owner.realm(), owner.instance());
        let Some(verdict) = cancel.run_until_cancelled(query).await else {
            self.set_state(CoordinatorState::Idle);
            return Ok(ProbeStep::Cancelled);
        };

        match verdict {
            LivenessVerdict::Alive => {
                debug!(
                    holder = %holder,
                    granted_at = %record.granted_at_display(),
                    "Change log lock holder is alive"
                );
                Ok(self.wait(WaitReason::HolderAlive))
            }
            LivenessVerdict::Unknown => {
                warn!(
                    holder = %holder,
                    "Cannot determine whether change log lock holder is alive, waiting"
                );
                Ok(self.wait(WaitReason::HolderUnknown))
            }
            LivenessVerdict::Dead => {
                warn!(
                    holder = %holder,
                    granted_at = %record.granted_at_display(),
                    "Change log lock holder is dead, reclaiming"
                );
                self.reclaim(holder, ReclaimReason::HolderDead).await
            }
        }
    }

    fn wait(&self, reason: WaitReason) -> ProbeStep {
        self.set_state(CoordinatorState::Waiting);
        ProbeStep::Wait(reason)
    }

    async fn reclaim(&self, holder: &str, reason: ReclaimReason) -> Result<ProbeStep> {
        self.set_state(CoordinatorState::Reclaiming);
        if self.store.release(holder).await? {
            info!(holder = %holder, reason = ?reason, "Released stale change log lock");
            Ok(ProbeStep::Reclaimed(reason))
        } else {
            debug!(holder = %holder, "Change log lock changed hands before it could be reclaimed");
            Ok(ProbeStep::LostRace)
        }
    }

    fn cancelled(&self) -> LockOutcome {
        self.set_state(CoordinatorState::Idle);
        info!("Stopped waiting for change log lock");
        LockOutcome::Cancelled
    }
}

#[async_trait]
impl LockCoordinator for RecoveringCoordinator {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        RECOVERING_PRIORITY
    }

    fn is_eligible(&self) -> bool {
        self.identity.is_some()
    }

    async fn wait_for_lock(&self, cancel: &CancelSignal) -> Result<LockOutcome> {
        let identity = self.require_identity()?;
        if self.has_lock() {
            return Ok(LockOutcome::Acquired);
        }

        info!(holder = %identity, "Waiting for change log lock");
        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancelled());
            }

            let step = match self.probe_once(cancel).await {
                Ok(step) => step,
                Err(e) => {
                    self.set_state(CoordinatorState::Idle);
                    return Err(e);
                }
            };

            match step {
                ProbeStep::Acquired => return Ok(LockOutcome::Acquired),
                ProbeStep::Cancelled => return Ok(self.cancelled()),
                ProbeStep::LostRace | ProbeStep::Reclaimed(_) => continue,
                ProbeStep::Wait(reason) => {
                    if cancel.is_cancelled() {
                        return Ok(self.cancelled());
                    }
                    debug!(
                        reason = ?reason,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Change log lock is busy, backing off"
                    );
                    if cancel
                        .run_until_cancelled(tokio::time::sleep(self.backoff))
                        .await
                        .is_none()
                    {
                        return Ok(self.cancelled());
                    }
                }
            }
        }
    }

    async fn release_lock(&self) -> Result<bool> {
        let Some(identity) = &self.identity else {
            return Ok(false);
        };

        let released = self.store.release(&identity.holder()).await?;
        self.has_lock.store(false, Ordering::SeqCst);
        self.set_state(CoordinatorState::Idle);
        if released {
            info!(holder = %identity, "Released change log lock");
        } else {
            debug!(holder = %identity, "Change log lock was not held by this instance");
        }
        Ok(released)
    }

    fn has_lock(&self) -> bool {
        self.has_lock.load(Ordering::SeqCst)
    }

    async fn list_locks(&self) -> Result<Vec<LockRecord>> {
        held_records(self.store.as_ref()).await
    }

    async fn force_release_lock(&self) -> Result<()> {
        self.store.force_release().await?;
        self.has_lock.store(false, Ordering::SeqCst);
        self.set_state(CoordinatorState::Idle);
        warn!("Change log lock force-released");
        Ok(())
    }
}
