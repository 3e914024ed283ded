//! Priority-ranked coordinator selection

use std::cmp::Reverse;
use std::sync::Arc;

use tracing::info;

use crate::traits::LockCoordinator;

/// Registered coordinators, highest priority first, plus the fallback
pub struct CoordinatorRegistry {
    candidates: Vec<Arc<dyn LockCoordinator>>,
    fallback: Arc<dyn LockCoordinator>,
}

impl CoordinatorRegistry {
    pub fn new(fallback: Arc<dyn LockCoordinator>) -> Self {
        Self {
            candidates: Vec::new(),
            fallback,
        }
    }

    /// Register a candidate; equal priorities keep registration order
    pub fn register(&mut self, coordinator: Arc<dyn LockCoordinator>) {
        info!(
            name = %coordinator.name(),
            priority = coordinator.priority(),
            "Coordinator registered"
        );
        self.candidates.push(coordinator);
        self.candidates.sort_by_key(|c| Reverse(c.priority()));
    }

    /// Highest-priority eligible candidate, else the fallback
    pub fn select(&self) -> Arc<dyn LockCoordinator> {
        let selected = self
            .candidates
            .iter()
            .find(|c| c.is_eligible())
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        info!(name = %selected.name(), "Selected change log lock coordinator");
        selected
    }

    pub fn fallback(&self) -> &Arc<dyn LockCoordinator> {
        &self.fallback
    }

    /// Candidate names in selection order
    pub fn list(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
