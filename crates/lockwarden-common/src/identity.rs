//! Process identity and lock holder tokens
//!
//! An [`Identity`] is the `(realm, instance)` pair a process claims the lock
//! under, e.g. a Kubernetes namespace and pod name. It is written into the lock
//! record as `"<realm>:<instance>"` and parsed back to recognise the holder.

use std::fmt::{Display, Formatter};

use tracing::debug;

use crate::error::{LockError, Result};

/// Separator between realm and instance in a holder token
pub const HOLDER_DELIMITER: char = ':';

/// Environment variables consulted for the realm, in order
pub const REALM_ENV_KEYS: &[&str] = &["REALM", "POD_NAMESPACE"];

/// Environment variables consulted for the instance, in order
pub const INSTANCE_ENV_KEYS: &[&str] = &["INSTANCE", "POD_NAME"];

/// Stable identity of a running instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    realm: String,
    instance: String,
}

impl Identity {
    /// Build an identity, rejecting blank parts and parts containing the delimiter.
    ///
    /// Parts are trimmed so the holder token always parses back to this identity.
    pub fn new(realm: impl Into<String>, instance: impl Into<String>) -> Result<Self> {
        let realm = realm.into().trim().to_string();
        let instance = instance.into().trim().to_string();

        for (label, value) in [("realm", &realm), ("instance", &instance)] {
            if value.is_empty() {
                return Err(LockError::Configuration(format!("{} is blank", label)));
            }
            if value.contains(HOLDER_DELIMITER) {
                return Err(LockError::Configuration(format!(
                    "{} '{}' must not contain '{}'",
                    label, value, HOLDER_DELIMITER
                )));
            }
        }

        Ok(Self { realm, instance })
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Holder token written into the lock record
    pub fn holder(&self) -> String {
        format!("{}{}{}", self.realm, HOLDER_DELIMITER, self.instance)
    }

    /// Parse a holder token back into an identity.
    ///
    /// Exactly one delimiter with non-empty text on both sides is accepted;
    /// anything else is a [`LockError::MalformedHolder`].
    pub fn parse_holder(holder: &str) -> Result<Self> {
        let token = holder.trim();
        let mut parts = token.split(HOLDER_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(realm), Some(instance), None) if !realm.is_empty() && !instance.is_empty() => {
                Ok(Self {
                    realm: realm.to_string(),
                    instance: instance.to_string(),
                })
            }
            _ => Err(LockError::MalformedHolder(holder.to_string())),
        }
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.realm, HOLDER_DELIMITER, self.instance)
    }
}

/// Source of the current process identity
pub trait IdentityProvider: Send + Sync {
    /// Resolve the identity; fails with [`LockError::Configuration`] when incomplete
    fn resolve(&self) -> Result<Identity>;
}

/// A fixed identity resolves to itself
impl IdentityProvider for Identity {
    fn resolve(&self) -> Result<Identity> {
        Ok(self.clone())
    }
}

/// Resolves the identity from `REALM`/`INSTANCE`, falling back to the
/// Kubernetes downward API variables `POD_NAMESPACE`/`POD_NAME`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvIdentityProvider;

impl EnvIdentityProvider {
    pub fn new() -> Self {
        Self
    }

    fn resolve_with<F>(lookup: F) -> Result<Identity>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_non_blank = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(*key))
                .find(|value| !value.trim().is_empty())
        };

        let realm = first_non_blank(REALM_ENV_KEYS).ok_or_else(|| {
            LockError::Configuration(format!("none of {:?} is set", REALM_ENV_KEYS))
        })?;
        let instance = first_non_blank(INSTANCE_ENV_KEYS).ok_or_else(|| {
            LockError::Configuration(format!("none of {:?} is set", INSTANCE_ENV_KEYS))
        })?;

        let identity = Identity::new(realm, instance)?;
        debug!(identity = %identity, "Resolved process identity");
        Ok(identity)
    }
}

impl IdentityProvider for EnvIdentityProvider {
    fn resolve(&self) -> Result<Identity> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }
}
