//! Pod status lookups

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};

/// Result of looking up a pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodLookup {
    /// The pod exists; `phase` is `None` when the status carries no phase
    Found { phase: Option<String> },
    NotFound,
}

/// Reads a pod's reported phase.
///
/// Not-found is a successful lookup; every other failure is an error.
#[async_trait]
pub trait PodStatusReader: Send + Sync {
    async fn read_pod(&self, namespace: &str, name: &str) -> anyhow::Result<PodLookup>;
}

/// Pod reader backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubePodReader {
    client: Client,
}

impl KubePodReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodStatusReader for KubePodReader {
    async fn read_pod(&self, namespace: &str, name: &str) -> anyhow::Result<PodLookup> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lookup = match api.get_opt(name).await? {
            Some(pod) => PodLookup::Found {
                phase: pod.status.and_then(|s| s.phase),
            },
            None => PodLookup::NotFound,
        };
        Ok(lookup)
    }
}
