//! Layered configuration resolver
//!
//! A [`ConfigResolver`] is bound to one invocation. `load()` builds the
//! snapshot from the environment and the function's secret exactly once;
//! `get()` serves from the snapshot and falls back to the parameter store
//! for missing keys, at most once per key for the resolver's lifetime.

use crate::sources::{load_environment, load_parameters, load_secret};
use crate::{
    ConfigError, ConfigValue, InvocationContext, ParameterStore, REGION_ENV_VAR,
    ReferenceResolver, ResolverOptions, Result, SecretStore,
};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// Merged environment and secret values, keyed by configuration key
pub type ConfigSnapshot = HashMap<String, ConfigValue>;

/// Outcome of a parameter store attempt for one key. An initialized cell
/// means the key was attempted; `None` inside it records a miss.
type ParameterSlot = Arc<OnceCell<Option<ConfigValue>>>;

/// Resolves configuration keys across environment, secret and parameter sources.
///
/// # Example
///
/// ```ignore
/// let resolver = ConfigResolver::builder(InvocationContext::new(name, arn))
///     .secret_store(Arc::new(AwsSecretStore::new().await?))
///     .parameter_store(Arc::new(AwsParameterStore::new().await?))
///     .build();
///
/// resolver.load().await?;
/// let port: u16 = resolver.get_as("PORT").await?;
/// ```
pub struct ConfigResolver {
    context: InvocationContext,
    options: ResolverOptions,
    environment: HashMap<String, String>,
    secret_store: Option<Arc<dyn SecretStore>>,
    parameter_store: Option<Arc<dyn ParameterStore>>,
    snapshot: OnceCell<ConfigSnapshot>,
    parameters: Mutex<HashMap<String, ParameterSlot>>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("function_name", &self.context.function_name)
            .field("loaded", &self.is_loaded())
            .field("options", &self.options)
            .field(
                "secret_store",
                &self.secret_store.as_ref().map(|s| s.provider_name()),
            )
            .field(
                "parameter_store",
                &self.parameter_store.as_ref().map(|s| s.provider_name()),
            )
            .finish_non_exhaustive()
    }
}

impl ConfigResolver {
    /// Start building a resolver bound to `context`
    #[must_use]
    pub fn builder(context: InvocationContext) -> ConfigResolverBuilder {
        ConfigResolverBuilder::new(context)
    }

    /// Region used for every source.
    ///
    /// The explicit option wins, then `AWS_REGION` from the environment
    /// snapshot, then the region in the invoked function ARN.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.options
            .region
            .as_deref()
            .or_else(|| {
                self.environment
                    .get(REGION_ENV_VAR)
                    .map(String::as_str)
                    .filter(|region| !region.is_empty())
            })
            .or_else(|| self.context.region())
    }

    /// Name of the secret loaded into the snapshot
    #[must_use]
    pub fn secret_name(&self) -> &str {
        self.options
            .secret_name
            .as_deref()
            .unwrap_or(&self.context.function_name)
    }

    /// Options this resolver was built with
    #[must_use]
    pub const fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Whether `load()` has completed
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.snapshot.initialized()
    }

    /// The merged environment and secret snapshot, once loaded.
    ///
    /// Holds only what `load()` produced. Values found later by the parameter
    /// fallback are in [`resolved_snapshot`](Self::resolved_snapshot).
    #[must_use]
    pub fn snapshot(&self) -> Option<&ConfigSnapshot> {
        self.snapshot.get()
    }

    /// The loaded snapshot plus every value the parameter fallback has found
    #[must_use]
    pub fn resolved_snapshot(&self) -> Option<ConfigSnapshot> {
        let mut resolved = self.snapshot.get()?.clone();
        let parameters = self.parameters.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, slot) in parameters.iter() {
            if let Some(value) = slot
                .get()
                .and_then(Option::as_ref)
                .filter(|value| !value.is_absent())
            {
                resolved.insert(key.clone(), value.clone());
            }
        }
        Some(resolved)
    }

    /// Whether a parameter store lookup for `key` has already completed
    #[must_use]
    pub fn parameter_attempted(&self, key: &str) -> bool {
        self.parameters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|slot| slot.initialized())
    }

    /// Build the snapshot from the environment and the function's secret.
    ///
    /// Subsequent calls are no-ops. Concurrent callers share one load.
    ///
    /// # Errors
    ///
    /// Returns a provider error when the secret, or a secret referenced from
    /// the environment or the secret, cannot be fetched. A failed load
    /// leaves the resolver unloaded.
    pub async fn load(&self) -> Result<()> {
        self.snapshot
            .get_or_try_init(|| self.load_snapshot())
            .await?;
        Ok(())
    }

    /// Get the value for `key`.
    ///
    /// Values from the snapshot are returned without any I/O. A key that is
    /// missing (or empty) triggers a single parameter store lookup the first
    /// time it is requested; the outcome, found or not, is kept for the
    /// resolver's lifetime.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotLoaded`] before `load()` has completed
    /// - [`ConfigError::KeyNotFound`] when no source has a value for `key`
    /// - A provider error from a first-time parameter store lookup
    pub async fn get(&self, key: &str) -> Result<ConfigValue> {
        let snapshot = self.snapshot.get().ok_or(ConfigError::NotLoaded)?;

        if let Some(value) = snapshot.get(key).filter(|value| !value.is_absent()) {
            return Ok(value.clone());
        }

        match self.parameter_fallback(key).await? {
            Some(value) => Ok(value),
            None => Err(ConfigError::KeyNotFound {
                key: key.to_owned(),
            }),
        }
    }

    /// Get the value for `key` and deserialize it into `T`.
    ///
    /// Numbers and booleans decoded from text sources are also accepted
    /// where `T` expects a string, in their original spelling, so
    /// `PASSWORD=123456` reads as `"123456"` and `VERSION=1.10` as `"1.10"`.
    ///
    /// # Errors
    ///
    /// Everything [`get`](Self::get) returns, plus [`ConfigError::Deserialize`].
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = serde_json::Value::from(self.get(key).await?);

        match serde_json::from_value::<T>(value.clone()) {
            Ok(typed) => Ok(typed),
            Err(source) => {
                let textual = match &value {
                    serde_json::Value::Number(_) | serde_json::Value::Bool(_) => {
                        Some(serde_json::Value::String(value.to_string()))
                    }
                    _ => None,
                };
                textual
                    .and_then(|text| serde_json::from_value::<T>(text).ok())
                    .ok_or_else(|| ConfigError::Deserialize {
                        key: key.to_owned(),
                        source,
                    })
            }
        }
    }

    fn reference_resolver(&self) -> Option<ReferenceResolver<'_>> {
        if self.options.skip.secrets_manager {
            return None;
        }
        self.secret_store.as_deref().map(|store| {
            ReferenceResolver::new(store, self.region())
                .with_max_depth(self.options.max_reference_depth)
        })
    }

    async fn load_snapshot(&self) -> Result<ConfigSnapshot> {
        let references = self.reference_resolver();
        let environment_references = references
            .as_ref()
            .filter(|_| self.options.resolve_environment_references);

        tracing::debug!(
            function = %self.context.function_name,
            region = ?self.region(),
            skip_secrets = self.options.skip.secrets_manager,
            "Loading configuration"
        );

        let secret = async {
            match &references {
                Some(resolver) => load_secret(resolver, self.secret_name()).await,
                None => Ok(None),
            }
        };
        let (mut snapshot, secret) = futures::try_join!(
            load_environment(&self.environment, environment_references),
            secret
        )?;

        match secret {
            Some(ConfigValue::Mapping(values)) => snapshot.extend(values),
            Some(_) => tracing::warn!(
                secret = %self.secret_name(),
                "Secret payload is not a JSON object; ignoring it"
            ),
            None => {}
        }

        tracing::debug!(keys = snapshot.len(), "Configuration snapshot loaded");
        Ok(snapshot)
    }

    async fn parameter_fallback(&self, key: &str) -> Result<Option<ConfigValue>> {
        if self.options.skip.parameter_store {
            return Ok(None);
        }
        let Some(store) = self.parameter_store.as_deref() else {
            return Ok(None);
        };

        let slot = {
            let mut parameters = self.parameters.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(parameters.entry(key.to_owned()).or_default())
        };

        let outcome = slot
            .get_or_try_init(|| async {
                tracing::debug!(key, provider = store.provider_name(), "Looking up missing key");
                let references = self.reference_resolver();
                let keys = BTreeSet::from([key.to_owned()]);
                let mut found = load_parameters(
                    store,
                    &keys,
                    self.region(),
                    &self.options.parameter_store_prefix,
                    references.as_ref(),
                )
                .await?;
                let value = found.remove(key);
                tracing::debug!(key, found = value.is_some(), "Parameter lookup finished");
                Ok::<_, ConfigError>(value)
            })
            .await?;

        Ok(outcome.clone().filter(|value| !value.is_absent()))
    }
}

/// Builder for [`ConfigResolver`]
pub struct ConfigResolverBuilder {
    context: InvocationContext,
    options: ResolverOptions,
    environment: Option<HashMap<String, String>>,
    secret_store: Option<Arc<dyn SecretStore>>,
    parameter_store: Option<Arc<dyn ParameterStore>>,
}

impl std::fmt::Debug for ConfigResolverBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolverBuilder")
            .field("function_name", &self.context.function_name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ConfigResolverBuilder {
    fn new(context: InvocationContext) -> Self {
        Self {
            context,
            options: ResolverOptions::default(),
            environment: None,
            secret_store: None,
            parameter_store: None,
        }
    }

    /// Set resolver options
    #[must_use]
    pub fn options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Use this environment snapshot instead of the process environment
    #[must_use]
    pub fn environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Store for the function's secret and for `$ref` targets.
    /// Without one the secret source is skipped.
    #[must_use]
    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secret_store = Some(store);
        self
    }

    /// Store consulted for keys missing from the snapshot.
    /// Without one the fallback is skipped.
    #[must_use]
    pub fn parameter_store(mut self, store: Arc<dyn ParameterStore>) -> Self {
        self.parameter_store = Some(store);
        self
    }

    /// Build the resolver, capturing the process environment unless one was given
    #[must_use]
    pub fn build(self) -> ConfigResolver {
        ConfigResolver {
            context: self.context,
            options: self.options,
            environment: self.environment.unwrap_or_else(process_environment),
            secret_store: self.secret_store,
            parameter_store: self.parameter_store,
            snapshot: OnceCell::new(),
            parameters: Mutex::new(HashMap::new()),
        }
    }
}

/// Capture the process environment, skipping variables that are not UTF-8
fn process_environment() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| {
            let name = key.to_string_lossy().into_owned();
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                _ => {
                    tracing::debug!(
                        variable = %name,
                        "Skipping environment variable that is not valid UTF-8"
                    );
                    None
                }
            }
        })
        .collect()
}
