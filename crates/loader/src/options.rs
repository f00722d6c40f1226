//! Resolver options

use serde::{Deserialize, Serialize};

/// Sources that a resolver should never query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SkipOptions {
    /// Never fetch the function's secret during `load()`
    pub secrets_manager: bool,

    /// Never consult the parameter store for missing keys
    pub parameter_store: bool,
}

/// Options controlling how a [`ConfigResolver`](crate::ConfigResolver) loads values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverOptions {
    /// Prepended to every parameter lookup and stripped from returned names
    pub parameter_store_prefix: String,

    /// Sources to skip
    pub skip: SkipOptions,

    /// Secret to load instead of the one named after the function
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// Region to use instead of `AWS_REGION` or the ARN-derived region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Expand `$ref` references found in environment values
    pub resolve_environment_references: bool,

    /// Fail once a chain of nested references grows deeper than this.
    /// `None` follows references without limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reference_depth: Option<usize>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            parameter_store_prefix: String::new(),
            skip: SkipOptions::default(),
            secret_name: None,
            region: None,
            resolve_environment_references: true,
            max_reference_depth: None,
        }
    }
}

impl ResolverOptions {
    /// Set the parameter store prefix
    #[must_use]
    pub fn with_parameter_store_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.parameter_store_prefix = prefix.into();
        self
    }

    /// Skip (or stop skipping) the secret source
    #[must_use]
    pub const fn with_skip_secrets_manager(mut self, skip: bool) -> Self {
        self.skip.secrets_manager = skip;
        self
    }

    /// Skip (or stop skipping) the parameter store fallback
    #[must_use]
    pub const fn with_skip_parameter_store(mut self, skip: bool) -> Self {
        self.skip.parameter_store = skip;
        self
    }

    /// Load this secret instead of the function-named one
    #[must_use]
    pub fn with_secret_name(mut self, name: impl Into<String>) -> Self {
        self.secret_name = Some(name.into());
        self
    }

    /// Pin the region used for every source
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Enable or disable reference expansion in environment values
    #[must_use]
    pub const fn with_environment_references(mut self, resolve: bool) -> Self {
        self.resolve_environment_references = resolve;
        self
    }

    /// Limit the depth of nested reference chains
    #[must_use]
    pub const fn with_max_reference_depth(mut self, depth: usize) -> Self {
        self.max_reference_depth = Some(depth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ResolverOptions::default();
        assert_eq!(options.parameter_store_prefix, "");
        assert!(!options.skip.secrets_manager);
        assert!(!options.skip.parameter_store);
        assert!(options.resolve_environment_references);
        assert!(options.max_reference_depth.is_none());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{"parameterStorePrefix":"dev/","skip":{"secretsManager":true}}"#;
        let options: ResolverOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.parameter_store_prefix, "dev/");
        assert!(options.skip.secrets_manager);
        assert!(!options.skip.parameter_store);
        assert!(options.resolve_environment_references);
    }

    #[test]
    fn test_deserialize_empty() {
        let options: ResolverOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ResolverOptions::default());
    }

    #[test]
    fn test_builders() {
        let options = ResolverOptions::default()
            .with_parameter_store_prefix("prod/")
            .with_skip_parameter_store(true)
            .with_secret_name("shared")
            .with_region("eu-central-1")
            .with_environment_references(false)
            .with_max_reference_depth(4);

        assert_eq!(options.parameter_store_prefix, "prod/");
        assert!(options.skip.parameter_store);
        assert_eq!(options.secret_name.as_deref(), Some("shared"));
        assert_eq!(options.region.as_deref(), Some("eu-central-1"));
        assert!(!options.resolve_environment_references);
        assert_eq!(options.max_reference_depth, Some(4));
    }

    #[test]
    fn test_serialization_skips_unset() {
        let json = serde_json::to_string(&ResolverOptions::default()).unwrap();
        assert!(json.contains("parameterStorePrefix"));
        assert!(!json.contains("secretName"));
        assert!(!json.contains("maxReferenceDepth"));
    }
}
