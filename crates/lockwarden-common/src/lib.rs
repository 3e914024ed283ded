//! Lockwarden Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all lockwarden components:
//! - Error type and result alias
//! - Process identity and lock holder tokens
//! - Configuration access
//! - Cancellation signal for the lock wait loop

pub mod configuration;
pub mod error;
pub mod identity;
pub mod signal;

// Re-exports for convenience
pub use configuration::Configuration;
pub use error::{LockError, Result};
pub use identity::{EnvIdentityProvider, HOLDER_DELIMITER, Identity, IdentityProvider};
pub use signal::CancelSignal;
