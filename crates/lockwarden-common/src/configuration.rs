//! Configuration management for lockwarden
//!
//! Settings come from an optional `conf/lockwarden.yml` file overlaid with
//! `LOCKWARDEN_*` environment variables, `__` separating key segments
//! (e.g. `LOCKWARDEN_LOCK__RECHECK_INTERVAL_MS`).

use std::time::Duration;

use config::{Config, Environment, File};

use crate::error::{LockError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "conf/lockwarden.yml";

pub const LOCK_RECHECK_INTERVAL_MS: &str = "lock.recheck_interval_ms";
pub const LOCK_WAIT_TIMEOUT_MS: &str = "lock.wait_timeout_ms";
pub const LOCK_HOLDER: &str = "lock.holder";
pub const ORACLE_REQUEST_TIMEOUT_MS: &str = "oracle.request_timeout_ms";
pub const ORACLE_API_SERVER: &str = "oracle.api_server";
pub const ORACLE_CA_PATH: &str = "oracle.ca_path";
pub const ORACLE_TOKEN_PATH: &str = "oracle.token_path";
pub const ORACLE_VERIFY_ON_STARTUP: &str = "oracle.verify_on_startup";
pub const DB_URL: &str = "db.url";
pub const DB_POOL_MAX_CONNECTIONS: &str = "db.pool.max_connections";
pub const DB_POOL_CONNECT_TIMEOUT_MS: &str = "db.pool.connect_timeout_ms";

pub const DEFAULT_RECHECK_INTERVAL_MS: i64 = 10_000;
pub const DEFAULT_WAIT_TIMEOUT_MS: i64 = 300_000;
pub const DEFAULT_ORACLE_REQUEST_TIMEOUT_MS: i64 = 5_000;
pub const DEFAULT_DB_MAX_CONNECTIONS: i64 = 5;
pub const DEFAULT_DB_CONNECT_TIMEOUT_MS: i64 = 5_000;

/// In-cluster service account credentials
pub const SERVICEACCOUNT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
pub const SERVICEACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load from the default config file (if present) and the environment
    pub fn new() -> Result<Self> {
        Self::load(DEFAULT_CONFIG_FILE)
    }

    pub fn load(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("LOCKWARDEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| LockError::Configuration(format!("failed to load {}: {}", path, e)))?;

        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    fn millis(&self, key: &str, default: i64) -> Duration {
        let ms = self.config.get_int(key).unwrap_or(default).max(0);
        Duration::from_millis(ms as u64)
    }

    fn non_blank(&self, key: &str) -> Option<String> {
        self.config
            .get_string(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    /// Pause between probe cycles while the lock is held elsewhere
    pub fn recheck_interval(&self) -> Duration {
        self.millis(LOCK_RECHECK_INTERVAL_MS, DEFAULT_RECHECK_INTERVAL_MS)
    }

    /// How long the standard coordinator waits before giving up
    pub fn wait_timeout(&self) -> Duration {
        self.millis(LOCK_WAIT_TIMEOUT_MS, DEFAULT_WAIT_TIMEOUT_MS)
    }

    /// Holder token override for the standard coordinator
    pub fn lock_holder(&self) -> Option<String> {
        self.non_blank(LOCK_HOLDER)
    }

    // ========================================================================
    // Oracle Configuration
    // ========================================================================

    pub fn oracle_request_timeout(&self) -> Duration {
        self.millis(ORACLE_REQUEST_TIMEOUT_MS, DEFAULT_ORACLE_REQUEST_TIMEOUT_MS)
    }

    /// Explicit API server URL; `None` means derive it from the in-cluster environment
    pub fn oracle_api_server(&self) -> Option<String> {
        self.non_blank(ORACLE_API_SERVER)
    }

    pub fn oracle_ca_path(&self) -> String {
        self.non_blank(ORACLE_CA_PATH)
            .or_else(|| std::env::var("SERVICEACCOUNT_CA_PATH").ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| SERVICEACCOUNT_CA_PATH.to_string())
    }

    pub fn oracle_token_path(&self) -> String {
        self.non_blank(ORACLE_TOKEN_PATH)
            .or_else(|| std::env::var("SERVICEACCOUNT_TOKEN_PATH").ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| SERVICEACCOUNT_TOKEN_PATH.to_string())
    }

    pub fn oracle_verify_on_startup(&self) -> bool {
        self.config
            .get_bool(ORACLE_VERIFY_ON_STARTUP)
            .unwrap_or(true)
    }

    // ========================================================================
    // Database Configuration
    // ========================================================================

    pub fn database_url(&self) -> Result<String> {
        self.non_blank(DB_URL)
            .ok_or_else(|| LockError::Configuration(format!("'{}' is not configured", DB_URL)))
    }

    pub fn db_max_connections(&self) -> u32 {
        self.config
            .get_int(DB_POOL_MAX_CONNECTIONS)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .clamp(1, u32::MAX as i64) as u32
    }

    pub fn db_connect_timeout(&self) -> Duration {
        self.millis(DB_POOL_CONNECT_TIMEOUT_MS, DEFAULT_DB_CONNECT_TIMEOUT_MS)
    }
}
