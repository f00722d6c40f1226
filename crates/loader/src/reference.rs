//! Recursive `$ref` expansion
//!
//! A mapping holding a string under [`REFERENCE_KEY`] is pure indirection: it
//! is replaced by the content of the secret it names, and that content is
//! expanded in turn. Other keys next to `$ref` are dropped. Sequences and
//! plain mappings are walked element by element, concurrently.

use crate::{ConfigError, ConfigValue, Result, SecretStore};
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};

/// Key that marks a mapping as a reference to another secret
pub const REFERENCE_KEY: &str = "$ref";

/// Expands references in a [`ConfigValue`] by fetching from a [`SecretStore`]
pub struct ReferenceResolver<'a> {
    store: &'a dyn SecretStore,
    region: Option<&'a str>,
    max_depth: Option<usize>,
}

impl std::fmt::Debug for ReferenceResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("provider", &self.store.provider_name())
            .field("region", &self.region)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl<'a> ReferenceResolver<'a> {
    /// Create a resolver that fetches referenced secrets from `store`
    #[must_use]
    pub fn new(store: &'a dyn SecretStore, region: Option<&'a str>) -> Self {
        Self {
            store,
            region,
            max_depth: None,
        }
    }

    /// Fail with [`ConfigError::ReferenceDepthExceeded`] once a reference
    /// chain needs more than `depth` nested fetches
    #[must_use]
    pub const fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Store referenced secrets are fetched from
    #[must_use]
    pub fn store(&self) -> &'a dyn SecretStore {
        self.store
    }

    /// Region passed to every fetch
    #[must_use]
    pub const fn region(&self) -> Option<&'a str> {
        self.region
    }

    /// Name of the secret `value` points at, when `value` is a reference
    #[must_use]
    pub fn reference_name(value: &ConfigValue) -> Option<&str> {
        value.get(REFERENCE_KEY).and_then(ConfigValue::as_str)
    }

    /// Expand every reference contained in `value`.
    ///
    /// Strings holding a JSON object or array are decoded first so that
    /// serialized structures take part in expansion. Other scalars come back
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns the store's error when a referenced secret cannot be fetched,
    /// or [`ConfigError::ReferenceDepthExceeded`] when a depth limit is set
    /// and crossed.
    pub fn resolve(&self, value: ConfigValue) -> BoxFuture<'_, Result<ConfigValue>> {
        self.resolve_at(value, 0)
    }

    fn resolve_at(&self, value: ConfigValue, depth: usize) -> BoxFuture<'_, Result<ConfigValue>> {
        async move {
            match value {
                ConfigValue::String(raw) => match ConfigValue::decode_document(&raw) {
                    Some(document) => self.resolve_at(document, depth).await,
                    None => Ok(ConfigValue::String(raw)),
                },
                ConfigValue::Sequence(items) => {
                    let resolved =
                        try_join_all(items.into_iter().map(|item| self.resolve_at(item, depth)))
                            .await?;
                    Ok(ConfigValue::Sequence(resolved))
                }
                ConfigValue::Mapping(map) => {
                    if let Some(name) = map.get(REFERENCE_KEY).and_then(ConfigValue::as_str) {
                        return self.dereference(name.to_owned(), depth).await;
                    }
                    let entries = try_join_all(map.into_iter().map(|(key, value)| async move {
                        let value = self.resolve_at(value, depth).await?;
                        Ok::<_, ConfigError>((key, value))
                    }))
                    .await?;
                    Ok(ConfigValue::Mapping(entries.into_iter().collect()))
                }
                scalar => Ok(scalar),
            }
        }
        .boxed()
    }

    async fn dereference(&self, name: String, depth: usize) -> Result<ConfigValue> {
        if let Some(max) = self.max_depth
            && depth >= max
        {
            return Err(ConfigError::ReferenceDepthExceeded {
                reference: name,
                depth: max,
            });
        }

        tracing::debug!(reference = %name, depth, "Dereferencing secret");
        match self.store.get_secret(&name, self.region).await? {
            Some(payload) => self.resolve_at(ConfigValue::decode(&payload), depth + 1).await,
            None => {
                tracing::debug!(reference = %name, "Referenced secret has no payload");
                Ok(ConfigValue::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySecretStore;
    use std::collections::HashMap;

    fn map(entries: &[(&str, ConfigValue)]) -> ConfigValue {
        ConfigValue::Mapping(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[tokio::test]
    async fn test_scalar_is_unchanged() {
        let store = MemorySecretStore::new();
        let resolver = ReferenceResolver::new(&store, None);

        let value = resolver.resolve(ConfigValue::from("bar")).await.unwrap();

        assert_eq!(value, ConfigValue::from("bar"));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_null_and_numbers_are_unchanged() {
        let store = MemorySecretStore::new();
        let resolver = ReferenceResolver::new(&store, None);

        assert_eq!(resolver.resolve(ConfigValue::Null).await.unwrap(), ConfigValue::Null);
        assert_eq!(
            resolver.resolve(ConfigValue::decode("7")).await.unwrap(),
            ConfigValue::Number(7.into())
        );
    }

    #[tokio::test]
    async fn test_chained_reference() {
        let store = MemorySecretStore::new()
            .with_secret("A", r#"{"$ref":"B"}"#)
            .with_secret("B", "bar");
        let resolver = ReferenceResolver::new(&store, Some("us-east-1"));

        let value = resolver
            .resolve(ConfigValue::decode(r#"{"$ref":"A"}"#))
            .await
            .unwrap();

        assert_eq!(value, ConfigValue::from("bar"));
        assert_eq!(store.requested(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_sequence_preserves_order() {
        let store = MemorySecretStore::new()
            .with_secret("A", "bar1")
            .with_secret("B", "bar2");
        let resolver = ReferenceResolver::new(&store, None);

        let value = resolver
            .resolve(ConfigValue::decode(r#"[{"$ref":"A"},{"$ref":"B"},"bar3"]"#))
            .await
            .unwrap();

        assert_eq!(
            value,
            ConfigValue::from(vec!["bar1".into(), "bar2".into(), "bar3".into()])
        );
    }

    #[tokio::test]
    async fn test_mapping_keeps_siblings() {
        let store = MemorySecretStore::new().with_secret("B", "baz");
        let resolver = ReferenceResolver::new(&store, None);

        let value = resolver
            .resolve(ConfigValue::decode(r#"{"bar":{"$ref":"B"},"a":"b"}"#))
            .await
            .unwrap();

        assert_eq!(value, map(&[("bar", "baz".into()), ("a", "b".into())]));
    }

    #[tokio::test]
    async fn test_reference_drops_extra_keys() {
        let store = MemorySecretStore::new().with_secret("B", r#"{"user":"u"}"#);
        let resolver = ReferenceResolver::new(&store, None);

        let value = resolver
            .resolve(ConfigValue::decode(r#"{"$ref":"B","ignored":"x"}"#))
            .await
            .unwrap();

        assert_eq!(value, map(&[("user", "u".into())]));
    }

    #[tokio::test]
    async fn test_non_string_ref_is_plain_mapping() {
        let store = MemorySecretStore::new();
        let resolver = ReferenceResolver::new(&store, None);
        let input = ConfigValue::decode(r#"{"$ref":42}"#);

        let value = resolver.resolve(input.clone()).await.unwrap();

        assert_eq!(value, input);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_encoded_document_string_is_expanded() {
        let store = MemorySecretStore::new().with_secret("B", "baz");
        let resolver = ReferenceResolver::new(&store, None);

        let value = resolver
            .resolve(ConfigValue::from(r#"{"$ref":"B"}"#))
            .await
            .unwrap();

        assert_eq!(value, ConfigValue::from("baz"));
    }

    #[tokio::test]
    async fn test_referenced_secret_without_payload() {
        let store = MemorySecretStore::new();
        let resolver = ReferenceResolver::new(&store, None);

        let value = resolver
            .resolve(ConfigValue::decode(r#"{"$ref":"missing"}"#))
            .await
            .unwrap();

        assert!(value.is_absent());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let store = MemorySecretStore::new();
        store.set_failing(true);
        let resolver = ReferenceResolver::new(&store, None);

        let result = resolver
            .resolve(ConfigValue::decode(r#"[{"$ref":"A"}]"#))
            .await;

        assert!(matches!(result, Err(ConfigError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_depth_limit_stops_cycles() {
        let store = MemorySecretStore::new()
            .with_secret("A", r#"{"$ref":"B"}"#)
            .with_secret("B", r#"{"$ref":"A"}"#);
        let resolver = ReferenceResolver::new(&store, None).with_max_depth(Some(5));

        let result = resolver
            .resolve(ConfigValue::decode(r#"{"$ref":"A"}"#))
            .await;

        assert!(matches!(
            result,
            Err(ConfigError::ReferenceDepthExceeded { depth: 5, .. })
        ));
        assert_eq!(store.calls(), 5);
    }

    #[tokio::test]
    async fn test_depth_limit_allows_short_chains() {
        let store = MemorySecretStore::new()
            .with_secret("A", r#"{"$ref":"B"}"#)
            .with_secret("B", "bar");
        let resolver = ReferenceResolver::new(&store, None).with_max_depth(Some(2));

        let value = resolver
            .resolve(ConfigValue::decode(r#"{"$ref":"A"}"#))
            .await
            .unwrap();

        assert_eq!(value, ConfigValue::from("bar"));
    }

    #[test]
    fn test_reference_name() {
        let reference = ConfigValue::decode(r#"{"$ref":"db-credentials"}"#);
        assert_eq!(
            ReferenceResolver::reference_name(&reference),
            Some("db-credentials")
        );
        assert!(ReferenceResolver::reference_name(&ConfigValue::from("x")).is_none());
    }
}
