//! Wiring from configuration to a ready-to-use coordinator
//!
//! [`bootstrap`] performs all I/O: it connects the database, creates the lock
//! table, connects the Kubernetes oracle and runs its self-check.
//! [`build_registry`] only assembles already-built parts.

use std::sync::Arc;

use lockwarden_common::{Configuration, EnvIdentityProvider, IdentityProvider, LockError, Result};
use lockwarden_core::{
    CoordinatorRegistry, LockCoordinator, RecoveringCoordinator, StandardCoordinator,
};
use lockwarden_oracle::{KubeClientSettings, KubernetesOracle, LivenessOracle, LivenessVerdict};
use lockwarden_store::{LockStore, SqlLockStore};
use sea_orm::{ConnectOptions, Database};
use tracing::{info, warn};

/// Coordinators built from configuration
pub struct LockSetup {
    pub registry: CoordinatorRegistry,
    /// The registry's current pick
    pub coordinator: Arc<dyn LockCoordinator>,
}

/// Connect to the lock database and make sure the lock table exists
pub async fn connect_store(configuration: &Configuration) -> Result<SqlLockStore> {
    let url = configuration.database_url()?;
    let max_connections = configuration.db_max_connections();
    let connect_timeout = configuration.db_connect_timeout();

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(connect_timeout)
        .sqlx_logging(false);

    info!(
        max_connections = max_connections,
        connect_timeout_ms = connect_timeout.as_millis() as u64,
        "Database connection pool configured"
    );

    let db = Database::connect(options)
        .await
        .map_err(|e| LockError::StoreRead(format!("failed to connect to lock database: {}", e)))?;

    let store = SqlLockStore::new(db);
    store.init().await?;
    Ok(store)
}

/// Connect the Kubernetes oracle; `None` when no client can be built
pub async fn connect_oracle(configuration: &Configuration) -> Option<Arc<dyn LivenessOracle>> {
    let settings = KubeClientSettings::from_configuration(configuration);
    match KubernetesOracle::connect(&settings).await {
        Ok(oracle) => Some(Arc::new(oracle)),
        Err(e) => {
            warn!(
                error = %format!("{:#}", e),
                "Kubernetes liveness oracle unavailable, lock recovery disabled"
            );
            None
        }
    }
}

/// Build the recovering coordinator and, if configured, verify the oracle
/// recognises this process as alive.
///
/// Returns `None` when the self-check fails, so recovery is never attempted
/// with an oracle that cannot see its own pod.
pub async fn verified_recovery(
    identity_provider: &dyn IdentityProvider,
    store: Arc<dyn LockStore>,
    oracle: Arc<dyn LivenessOracle>,
    configuration: &Configuration,
) -> Option<Arc<RecoveringCoordinator>> {
    let coordinator = RecoveringCoordinator::new(
        identity_provider,
        store,
        oracle,
        configuration.recheck_interval(),
    );

    if coordinator.is_eligible()
        && configuration.oracle_verify_on_startup()
        && coordinator.self_check().await != LivenessVerdict::Alive
    {
        warn!("Liveness oracle does not report this instance as alive, lock recovery disabled");
        return None;
    }

    Some(Arc::new(coordinator))
}

/// Register the available coordinators over `store`, with the standard
/// coordinator as fallback.
pub fn build_registry(
    store: Arc<dyn LockStore>,
    recovering: Option<Arc<RecoveringCoordinator>>,
    configuration: &Configuration,
) -> CoordinatorRegistry {
    let standard = Arc::new(StandardCoordinator::from_configuration(store, configuration));
    let mut registry = CoordinatorRegistry::new(standard);
    if let Some(recovering) = recovering {
        registry.register(recovering);
    }
    registry
}

/// Build everything from configuration and select a coordinator
pub async fn bootstrap(configuration: &Configuration) -> Result<LockSetup> {
    let store: Arc<dyn LockStore> = Arc::new(connect_store(configuration).await?);

    let recovering = match connect_oracle(configuration).await {
        Some(oracle) => {
            let identity = EnvIdentityProvider::new();
            verified_recovery(&identity, store.clone(), oracle, configuration).await
        }
        None => None,
    };

    let registry = build_registry(store, recovering, configuration);
    let coordinator = registry.select();
    Ok(LockSetup {
        registry,
        coordinator,
    })
}
