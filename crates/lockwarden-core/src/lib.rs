//! Lockwarden Core - Change log lock coordination
//!
//! This crate provides:
//! - The `LockCoordinator` trait shared by all acquisition strategies
//! - `StandardCoordinator`: poll until a timeout, never touch another holder
//! - `RecoveringCoordinator`: reclaim locks left behind by dead instances
//! - `CoordinatorRegistry`: priority-ranked selection with a fallback
//! - `run_exclusive`: acquire, run, release

pub mod exclusive;
pub mod recovering;
pub mod registry;
pub mod standard;
pub mod traits;

pub use exclusive::run_exclusive;
pub use recovering::{
    CoordinatorState, ProbeStep, RECOVERING_PRIORITY, ReclaimReason, RecoveringCoordinator,
    WaitReason,
};
pub use registry::CoordinatorRegistry;
pub use standard::{STANDARD_PRIORITY, StandardCoordinator};
pub use traits::{LockCoordinator, LockOutcome};
