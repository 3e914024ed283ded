//! Error types for lockwarden
//!
//! Only configuration and store failures cross the coordinator boundary.
//! Oracle failures are absorbed into the `Unknown` verdict and never show up here.

/// Lock coordination errors
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    /// Identity or settings could not be resolved
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to read lock record: {0}")]
    StoreRead(String),

    #[error("failed to write lock record: {0}")]
    StoreWrite(String),

    /// Holder token is not `<realm>:<instance>`; logged and never escalated
    #[error("malformed lock holder '{0}'")]
    MalformedHolder(String),

    /// The standard coordinator gave up waiting
    #[error("could not acquire change log lock, currently locked by {holder} since {granted_at}")]
    LockTimeout { holder: String, granted_at: String },
}

impl LockError {
    /// Whether the error comes from the shared lock store
    pub fn is_store_error(&self) -> bool {
        matches!(self, LockError::StoreRead(_) | LockError::StoreWrite(_))
    }
}

/// Result type alias for lockwarden operations
pub type Result<T> = std::result::Result<T, LockError>;
