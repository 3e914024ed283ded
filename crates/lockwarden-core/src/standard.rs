// Standard change log lock coordinator
// Polls until the lock is free or the wait timeout elapses; never releases another holder

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lockwarden_common::{CancelSignal, Configuration, LockError, Result};
use lockwarden_store::{LockRecord, LockStore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::traits::{LockCoordinator, LockOutcome, held_records};

pub const STANDARD_PRIORITY: i32 = 1;

const NAME: &str = "standard";

pub struct StandardCoordinator {
    holder: String,
    store: Arc<dyn LockStore>,
    recheck_interval: Duration,
    wait_timeout: Duration,
    has_lock: AtomicBool,
}

impl StandardCoordinator {
    pub fn new(
        store: Arc<dyn LockStore>,
        holder: impl Into<String>,
        recheck_interval: Duration,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            holder: holder.into(),
            store,
            recheck_interval,
            wait_timeout,
            has_lock: AtomicBool::new(false),
        }
    }

    pub fn from_configuration(store: Arc<dyn LockStore>, configuration: &Configuration) -> Self {
        let holder = configuration
            .lock_holder()
            .unwrap_or_else(Self::default_holder);
        Self::new(
            store,
            holder,
            configuration.recheck_interval(),
            configuration.wait_timeout(),
        )
    }

    /// `"<hostname> (<pid>)"`; never parses as an instance identity
    pub fn default_holder() -> String {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        format!("{} ({})", host, std::process::id())
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    async fn timed_out(&self) -> LockError {
        match self.store.read().await {
            Ok(record) => LockError::LockTimeout {
                granted_at: record.granted_at_display(),
                holder: record.holder.unwrap_or_else(|| "unknown".to_string()),
            },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl LockCoordinator for StandardCoordinator {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        STANDARD_PRIORITY
    }

    fn is_eligible(&self) -> bool {
        true
    }

    async fn wait_for_lock(&self, cancel: &CancelSignal) -> Result<LockOutcome> {
        if self.has_lock() {
            return Ok(LockOutcome::Acquired);
        }

        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if cancel.is_cancelled() {
                info!("Stopped waiting for change log lock");
                return Ok(LockOutcome::Cancelled);
            }

            if self.store.try_acquire(&self.holder).await? {
                self.has_lock.store(true, Ordering::SeqCst);
                info!(holder = %self.holder, "Acquired change log lock");
                return Ok(LockOutcome::Acquired);
            }

            let now = Instant::now();
            if now >= deadline {
                let error = self.timed_out().await;
                warn!(error = %error, "Gave up waiting for change log lock");
                return Err(error);
            }

            let pause = self.recheck_interval.min(deadline - now);
            debug!(pause_ms = pause.as_millis() as u64, "Waiting for change log lock");
            if cancel
                .run_until_cancelled(tokio::time::sleep(pause))
                .await
                .is_none()
            {
                info!("Stopped waiting for change log lock");
                return Ok(LockOutcome::Cancelled);
            }
        }
    }

    async fn release_lock(&self) -> Result<bool> {
        let released = self.store.release(&self.holder).await?;
        self.has_lock.store(false, Ordering::SeqCst);
        if released {
            info!(holder = %self.holder, "Released change log lock");
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
        warn!("Change log lock force-released");
        Ok(())
    }
}
