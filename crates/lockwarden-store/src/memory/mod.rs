//! In-memory lock store
//!
//! A mutex-guarded record with the same compare-and-swap semantics as the SQL
//! store. Only serializes callers within one process.

use async_trait::async_trait;
use chrono::Utc;
use lockwarden_common::Result;
use parking_lot::Mutex;
use tracing::debug;

use crate::model::LockRecord;
use crate::traits::LockStore;

#[derive(Debug, Default)]
pub struct MemoryLockStore {
    record: Mutex<LockRecord>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record, e.g. a lock left behind by a crashed holder
    pub fn with_record(record: LockRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }

    /// Snapshot of the current record without going through the async trait
    pub fn snapshot(&self) -> LockRecord {
        self.record.lock().clone()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn read(&self) -> Result<LockRecord> {
        Ok(self.snapshot())
    }

    async fn try_acquire(&self, holder: &str) -> Result<bool> {
        let mut record = self.record.lock();
        if record.locked {
            return Ok(false);
        }
        *record = LockRecord::locked_by(holder, Utc::now());
        debug!(holder = %holder, "Lock acquired");
        Ok(true)
    }

    async fn release(&self, holder: &str) -> Result<bool> {
        let mut record = self.record.lock();
        if !record.is_held_by(holder) {
            return Ok(false);
        }
        *record = LockRecord::unlocked();
        debug!(holder = %holder, "Lock released");
        Ok(true)
    }

    async fn force_release(&self) -> Result<()> {
        *self.record.lock() = LockRecord::unlocked();
        debug!("Lock force-released");
        Ok(())
    }
}
