//! Collaborator traits for the secret and parameter providers

use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

/// A service holding named secrets.
///
/// Implementors must provide:
/// - [`get_secret`](SecretStore::get_secret) - Fetch one raw payload
/// - [`provider_name`](SecretStore::provider_name) - Identifier used in logs and errors
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the raw payload of the secret called `name`.
    ///
    /// Returns `Ok(None)` when the secret carries no payload. Transport and
    /// permission failures are returned as [`ConfigError::Provider`](crate::ConfigError::Provider)
    /// and are never retried by the caller.
    async fn get_secret(&self, name: &str, region: Option<&str>) -> Result<Option<String>>;

    /// Get the provider name for this store.
    ///
    /// Examples: `"secretsmanager"`, `"memory"`
    fn provider_name(&self) -> &'static str;
}

/// A raw parameter as returned by a [`ParameterStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Plaintext value (secure values are already decrypted)
    pub value: String,
    /// Whether the store declares this parameter as a comma-separated list
    pub is_list: bool,
}

impl Parameter {
    /// A single-valued parameter
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_list: false,
        }
    }

    /// A comma-separated list parameter
    #[must_use]
    pub fn list(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_list: true,
        }
    }
}

/// A key-value parameter service, consulted lazily for missing keys.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch the named parameters with decryption of secure values.
    ///
    /// The returned map is keyed by the names exactly as requested. Names that
    /// are not found, or that the store rejects as invalid, are omitted.
    async fn get_parameters(
        &self,
        names: &BTreeSet<String>,
        region: Option<&str>,
    ) -> Result<HashMap<String, Parameter>>;

    /// Get the provider name for this store.
    ///
    /// Examples: `"ssm"`, `"memory"`
    fn provider_name(&self) -> &'static str;
}
