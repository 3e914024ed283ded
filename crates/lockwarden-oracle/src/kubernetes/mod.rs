//! Kubernetes-backed liveness oracle
//!
//! The realm is the pod namespace and the instance is the pod name. A pod in
//! phase `Pending` or `Running` is alive; a missing pod or any other phase is
//! dead; everything that goes wrong while asking is unknown.

mod client;
mod reader;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

pub use client::{KubeClientSettings, build_client};
pub use reader::{KubePodReader, PodLookup, PodStatusReader};

use crate::{LivenessOracle, LivenessVerdict};

pub const POD_PHASE_PENDING: &str = "Pending";
pub const POD_PHASE_RUNNING: &str = "Running";

/// Why a query could not produce a verdict
#[derive(thiserror::Error, Debug)]
enum OracleError {
    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("pod status request failed: {0:#}")]
    Request(anyhow::Error),

    #[error("pod has no reported phase")]
    MissingPhase,
}

/// Map a reported pod phase to a verdict
pub fn verdict_for_phase(phase: &str) -> LivenessVerdict {
    match phase {
        POD_PHASE_PENDING | POD_PHASE_RUNNING => LivenessVerdict::Alive,
        _ => LivenessVerdict::Dead,
    }
}

/// Liveness oracle that reads pod phases from the Kubernetes API
pub struct KubernetesOracle {
    reader: Arc<dyn PodStatusReader>,
    request_timeout: Duration,
}

impl KubernetesOracle {
    pub fn new(reader: Arc<dyn PodStatusReader>, request_timeout: Duration) -> Self {
        Self {
            reader,
            request_timeout,
        }
    }

    /// Connect using in-cluster service account credentials (or their overrides)
    pub async fn connect(settings: &KubeClientSettings) -> anyhow::Result<Self> {
        let client = build_client(settings).await?;
        info!("Kubernetes liveness oracle connected");
        Ok(Self::new(
            Arc::new(KubePodReader::new(client)),
            settings.request_timeout,
        ))
    }

    async fn query(&self, namespace: &str, name: &str) -> Result<LivenessVerdict, OracleError> {
        let read = self.reader.read_pod(namespace, name);
        let lookup = tokio::time::timeout(self.request_timeout, read)
            .await
            .map_err(|_| OracleError::Timeout(self.request_timeout))?
            .map_err(OracleError::Request)?;

        match lookup {
            PodLookup::NotFound => {
                info!(namespace = %namespace, pod = %name, "Pod not found");
                Ok(LivenessVerdict::Dead)
            }
            PodLookup::Found { phase: None } => Err(OracleError::MissingPhase),
            PodLookup::Found { phase: Some(phase) } => {
                let verdict = verdict_for_phase(&phase);
                info!(
                    namespace = %namespace,
                    pod = %name,
                    phase = %phase,
                    verdict = %verdict,
                    "Pod phase read"
                );
                Ok(verdict)
            }
        }
    }
}

#[async_trait]
impl LivenessOracle for KubernetesOracle {
    async fn is_alive(&self, realm: &str, instance: &str) -> LivenessVerdict {
        debug!(namespace = %realm, pod = %instance, "Reading pod status");
        match self.query(realm, instance).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(namespace = %realm, pod = %instance, error = %e, "Can't read pod status");
                LivenessVerdict::Unknown
            }
        }
    }
}
