//! Lock store trait
//!
//! The store owns the atomicity guarantee: `try_acquire` and `release` are
//! single conditional statements, so two racing writers can never both win.

use async_trait::async_trait;
use lockwarden_common::Result;

use crate::model::LockRecord;

/// Shared change log lock record operations
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Read the current lock record
    async fn read(&self) -> Result<LockRecord>;

    /// Atomically transition unlocked -> locked(holder).
    ///
    /// Returns `false` when another writer holds the lock or won the race.
    async fn try_acquire(&self, holder: &str) -> Result<bool>;

    /// Release the lock only if `holder` currently holds it.
    ///
    /// Returns `false` when the lock is free or held by someone else.
    async fn release(&self, holder: &str) -> Result<bool>;

    /// Unconditionally clear the lock
    async fn force_release(&self) -> Result<()>;
}
