//! Cancellation signal for the lock wait loop
//!
//! Unlike a broadcast channel, the flag is sticky: a waiter that subscribes
//! after `cancel()` was called still observes the cancellation.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{LockError, Result};

/// Cloneable cancellation flag shared between the caller and the wait loop
#[derive(Clone, Debug)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trigger cancellation; idempotent
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal has been cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so `changed` cannot fail here.
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run a future unless cancellation arrives first
    pub async fn run_until_cancelled<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            result = future => Some(result),
            _ = self.cancelled() => {
                warn!("Cancellation received, abandoning operation");
                None
            }
        }
    }

    /// Cancel this signal on Ctrl+C or SIGTERM.
    ///
    /// The listener runs as a task on the current Tokio runtime; calling this
    /// outside a runtime returns a configuration error.
    pub fn cancel_on_shutdown(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|e| {
            LockError::Configuration(format!("shutdown listener needs a Tokio runtime: {}", e))
        })?;
        let signal = self.clone();

        handle.spawn(async move {
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received Ctrl+C, cancelling lock wait");
                }
                _ = terminate => {
                    info!("Received SIGTERM, cancelling lock wait");
                }
            }

            signal.cancel();
        });
        Ok(())
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
