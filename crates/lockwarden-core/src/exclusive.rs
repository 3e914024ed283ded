// Run a unit of work while holding the change log lock

use std::future::Future;

use lockwarden_common::{CancelSignal, Result};
use tracing::{debug, warn};

use crate::traits::{LockCoordinator, LockOutcome};

/// Wait for the lock, run `work`, then release the lock.
///
/// Returns `Ok(None)` if `cancel` fired before the lock was obtained. The lock
/// is released after `work` finishes, whatever it returned; a failed release
/// is reported as the error. When the coordinator already held the lock on
/// entry, the enclosing holder keeps it and nothing is released here.
pub async fn run_exclusive<F, T>(
    coordinator: &dyn LockCoordinator,
    cancel: &CancelSignal,
    work: F,
) -> Result<Option<T>>
where
    F: Future<Output = T>,
{
    let nested = coordinator.has_lock();

    match coordinator.wait_for_lock(cancel).await? {
        LockOutcome::Cancelled => return Ok(None),
        LockOutcome::Acquired => {}
    }

    let output = work.await;
    if nested {
        debug!(coordinator = %coordinator.name(), "Nested exclusive section done, lock kept");
        return Ok(Some(output));
    }

    if let Err(e) = coordinator.release_lock().await {
        warn!(
            coordinator = %coordinator.name(),
            error = %e,
            "Failed to release change log lock after work"
        );
        return Err(e);
    }
    Ok(Some(output))
}
