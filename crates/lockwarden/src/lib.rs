//! Lockwarden - Change log lock with dead-holder recovery
//!
//! Guards schema migrations with the conventional `databasechangeloglock`
//! record. When the record is held by a pod that no longer runs, the
//! recovering coordinator asks Kubernetes about the holder and releases the
//! stale lock instead of waiting for an operator.
//!
//! ```ignore
//! let configuration = lockwarden::Configuration::new()?;
//! let setup = lockwarden::bootstrap(&configuration).await?;
//! let cancel = lockwarden::CancelSignal::new();
//! cancel.cancel_on_shutdown()?;
//! lockwarden::run_exclusive(setup.coordinator.as_ref(), &cancel, migrate()).await?;
//! ```

pub mod bootstrap;
pub mod startup;

pub use bootstrap::{
    LockSetup, bootstrap, build_registry, connect_oracle, connect_store, verified_recovery,
};

pub use lockwarden_common::{
    CancelSignal, Configuration, EnvIdentityProvider, Identity, IdentityProvider, LockError, Result,
};
pub use lockwarden_core::{
    CoordinatorRegistry, CoordinatorState, LockCoordinator, LockOutcome, RecoveringCoordinator,
    StandardCoordinator, run_exclusive,
};
pub use lockwarden_oracle::{KubernetesOracle, LivenessOracle, LivenessVerdict};
pub use lockwarden_store::{LockRecord, LockStore, MemoryLockStore, SqlLockStore};
