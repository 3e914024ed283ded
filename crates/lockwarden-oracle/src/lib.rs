//! Lockwarden Oracle - Liveness checks for lock holders
//!
//! This crate provides:
//! - The `LivenessOracle` capability and its three-valued verdict
//! - A Kubernetes-backed oracle that reads the holder pod's phase
//!
//! An oracle never fails: transport, authorization and timeout problems all
//! collapse into [`LivenessVerdict::Unknown`], which the coordinator must not
//! confuse with a confirmed [`LivenessVerdict::Dead`].

use std::fmt::{Display, Formatter};

use async_trait::async_trait;

pub mod kubernetes;

pub use kubernetes::{
    KubeClientSettings, KubePodReader, KubernetesOracle, PodLookup, PodStatusReader,
};

/// Outcome of a liveness query; computed on demand, never cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LivenessVerdict {
    /// Target exists and has not terminated
    Alive,
    /// Target confirmed absent or in a terminal phase
    Dead,
    /// Query failed; nothing is known about the target
    Unknown,
}

impl LivenessVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            LivenessVerdict::Alive => "alive",
            LivenessVerdict::Dead => "dead",
            LivenessVerdict::Unknown => "unknown",
        }
    }
}

impl Display for LivenessVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Answers "is the instance identified by `(realm, instance)` still running?"
#[async_trait]
pub trait LivenessOracle: Send + Sync {
    /// Must not mutate shared state and must not fail; errors become `Unknown`
    async fn is_alive(&self, realm: &str, instance: &str) -> LivenessVerdict;
}
