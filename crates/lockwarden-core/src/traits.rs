//! Coordinator trait

use async_trait::async_trait;
use lockwarden_common::{CancelSignal, Result};
use lockwarden_store::{LockRecord, LockStore};

/// How a wait for the lock ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// The cancel signal fired before the lock was obtained
    Cancelled,
}

/// A strategy for obtaining the shared change log lock
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    fn name(&self) -> &str;

    /// Higher wins when several coordinators are eligible
    fn priority(&self) -> i32;

    /// Readiness predicate checked by the registry
    fn is_eligible(&self) -> bool;

    /// Block until the lock is held or `cancel` fires.
    ///
    /// Returns `Acquired` at once when this coordinator already holds the lock.
    async fn wait_for_lock(&self, cancel: &CancelSignal) -> Result<LockOutcome>;

    /// Release the lock if this process holds it; `false` when it did not
    async fn release_lock(&self) -> Result<bool>;

    fn has_lock(&self) -> bool;

    /// Current holder records, empty when the lock is free
    async fn list_locks(&self) -> Result<Vec<LockRecord>>;

    /// Clear the lock regardless of who holds it
    async fn force_release_lock(&self) -> Result<()>;
}

/// Records to show an operator for the current lock state
pub(crate) async fn held_records(store: &dyn LockStore) -> Result<Vec<LockRecord>> {
    let record = store.read().await?;
    if record.locked {
        Ok(vec![record])
    } else {
        Ok(Vec::new())
    }
}
