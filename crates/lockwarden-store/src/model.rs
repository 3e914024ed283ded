//! Lock record model, decoupled from the storage backend

use chrono::{DateTime, Utc};

use crate::entity::database_change_log_lock;

/// State of the shared change log lock
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockRecord {
    pub locked: bool,
    pub granted_at: Option<DateTime<Utc>>,
    pub holder: Option<String>,
}

impl LockRecord {
    /// The "not held" sentinel
    pub fn unlocked() -> Self {
        Self::default()
    }

    pub fn locked_by(holder: impl Into<String>, granted_at: DateTime<Utc>) -> Self {
        Self {
            locked: true,
            granted_at: Some(granted_at),
            holder: Some(holder.into()),
        }
    }

    /// Holder token if the lock is currently held by someone
    pub fn current_holder(&self) -> Option<&str> {
        if !self.locked {
            return None;
        }
        self.holder.as_deref().filter(|h| !h.trim().is_empty())
    }

    pub fn is_held_by(&self, holder: &str) -> bool {
        self.current_holder() == Some(holder)
    }

    /// Grant time rendered for diagnostics
    pub fn granted_at_display(&self) -> String {
        self.granted_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl From<database_change_log_lock::Model> for LockRecord {
    fn from(model: database_change_log_lock::Model) -> Self {
        Self {
            locked: model.locked,
            granted_at: model.lockgranted.map(|t| t.and_utc()),
            holder: model.lockedby,
        }
    }
}
