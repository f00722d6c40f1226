//! Source loaders
//!
//! Each loader fetches one source and normalizes it into [`ConfigValue`]s:
//! - [`load_secret`] - one structured secret, references expanded
//! - [`load_environment`] - an environment snapshot, references optionally expanded
//! - [`load_parameters`] - a batch of parameters under a prefix

use crate::{ConfigError, ConfigValue, ParameterStore, ReferenceResolver, Result};
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashMap};

/// Fetch a secret and expand the references it contains.
///
/// Payloads that are not JSON are kept as opaque string scalars. Returns
/// `Ok(None)` when the store has no payload for `identifier`.
///
/// # Errors
///
/// Returns the store's error for the secret itself or for any secret it
/// references.
pub async fn load_secret(
    resolver: &ReferenceResolver<'_>,
    identifier: &str,
) -> Result<Option<ConfigValue>> {
    let Some(payload) = resolver
        .store()
        .get_secret(identifier, resolver.region())
        .await?
    else {
        tracing::debug!(secret = %identifier, "Secret has no payload");
        return Ok(None);
    };

    let value = resolver.resolve(ConfigValue::decode(&payload)).await?;
    tracing::debug!(secret = %identifier, "Loaded secret");
    Ok(Some(value))
}

/// Decode every environment entry, expanding references when a resolver is given.
///
/// Entries are processed concurrently and keyed by their original names.
///
/// # Errors
///
/// Returns the secret store's error when a referenced secret cannot be fetched.
pub async fn load_environment(
    raw_env: &HashMap<String, String>,
    resolver: Option<&ReferenceResolver<'_>>,
) -> Result<HashMap<String, ConfigValue>> {
    let Some(resolver) = resolver else {
        return Ok(raw_env
            .iter()
            .map(|(key, raw)| (key.clone(), ConfigValue::decode(raw)))
            .collect());
    };

    let entries = try_join_all(raw_env.iter().map(|(key, raw)| async move {
        let value = resolver.resolve(ConfigValue::decode(raw)).await?;
        Ok::<_, ConfigError>((key.clone(), value))
    }))
    .await?;

    Ok(entries.into_iter().collect())
}

/// Fetch `keys` from the parameter store under `prefix`.
///
/// The prefix is prepended to every lookup and stripped from the returned
/// names. List parameters are split on commas and each element decoded on
/// its own. Keys the store does not return are absent from the result.
///
/// # Errors
///
/// Returns the parameter store's error, or the secret store's error when a
/// parameter references a secret that cannot be fetched.
pub async fn load_parameters(
    store: &dyn ParameterStore,
    keys: &BTreeSet<String>,
    region: Option<&str>,
    prefix: &str,
    resolver: Option<&ReferenceResolver<'_>>,
) -> Result<HashMap<String, ConfigValue>> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }

    let names: BTreeSet<String> = keys.iter().map(|key| format!("{prefix}{key}")).collect();
    let parameters = store.get_parameters(&names, region).await?;
    tracing::debug!(
        provider = store.provider_name(),
        requested = names.len(),
        returned = parameters.len(),
        "Fetched parameters"
    );

    let mut result = HashMap::with_capacity(parameters.len());
    for (name, parameter) in parameters {
        let key = name.strip_prefix(prefix).unwrap_or(&name).to_owned();
        let value = if parameter.is_list {
            ConfigValue::Sequence(parameter.value.split(',').map(ConfigValue::decode).collect())
        } else {
            ConfigValue::decode(&parameter.value)
        };
        let value = match resolver {
            Some(resolver) => resolver.resolve(value).await?,
            None => value,
        };
        result.insert(key, value);
    }

    Ok(result)
}
