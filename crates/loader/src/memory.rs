//! In-memory stores
//!
//! These stores need no external service. They record every request so that
//! callers can check how much traffic a resolver generated, and can be told
//! to fail in order to exercise provider error paths.

use crate::{ConfigError, Parameter, ParameterStore, Result, SecretStore};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Secret store backed by a map of secret name to raw payload
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: HashMap<String, String>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MemorySecretStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret payload
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, payload: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), payload.into());
        self
    }

    /// Make every subsequent request fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `get_secret` calls served so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Secret names requested so far, in request order
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn get_secret(&self, name: &str, _region: Option<&str>) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_owned());

        if self.failing.load(Ordering::SeqCst) {
            return Err(ConfigError::provider(
                self.provider_name(),
                format!("secret '{name}' is unavailable"),
            ));
        }
        Ok(self.secrets.get(name).cloned())
    }
}

/// Parameter store backed by a map of full parameter name to parameter
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    parameters: HashMap<String, Parameter>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MemoryParameterStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-valued parameter
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), Parameter::new(value));
        self
    }

    /// Add a comma-separated list parameter
    #[must_use]
    pub fn with_list_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), Parameter::list(value));
        self
    }

    /// Make every subsequent request fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `get_parameters` round trips served so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every parameter name requested so far, including the prefix
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn get_parameters(
        &self,
        names: &BTreeSet<String>,
        _region: Option<&str>,
    ) -> Result<HashMap<String, Parameter>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(names.iter().cloned());

        if self.failing.load(Ordering::SeqCst) {
            return Err(ConfigError::provider(
                self.provider_name(),
                "parameter lookup is unavailable",
            ));
        }
        Ok(names
            .iter()
            .filter_map(|name| {
                self.parameters
                    .get(name)
                    .map(|param| (name.clone(), param.clone()))
            })
            .collect())
    }
}
