//! Layered runtime configuration for serverless functions
//!
//! Resolves configuration for a function invocation by merging several sources
//! with a fixed precedence, and by expanding `{"$ref": "<secret>"}` references
//! so that a stored value can point to another secret instead of embedding it.
//!
//! Precedence, lowest to highest:
//! 1. The environment snapshot (decoded, references expanded)
//! 2. The function's structured secret (overwrites environment keys)
//! 3. The parameter store, consulted lazily and only to fill gaps
//!
//! # Example
//!
//! ```ignore
//! use config_loader::{ConfigResolver, InvocationContext, ResolverOptions};
//!
//! let resolver = ConfigResolver::builder(context)
//!     .secret_store(Arc::new(secret_store))
//!     .parameter_store(Arc::new(parameter_store))
//!     .options(ResolverOptions::default().with_parameter_store_prefix("dev/"))
//!     .build();
//!
//! resolver.load().await?;
//! let url = resolver.get("DATABASE_URL").await?;
//! ```
//!
//! Provider implementations live in separate crates:
//! - config-loader-aws: AwsSecretStore, AwsParameterStore

mod context;
pub mod memory;
mod options;
mod reference;
mod resolver;
pub mod sources;
mod store;
mod value;

pub use context::{InvocationContext, REGION_ENV_VAR};
pub use memory::{MemoryParameterStore, MemorySecretStore};
pub use options::{ResolverOptions, SkipOptions};
pub use reference::{REFERENCE_KEY, ReferenceResolver};
pub use resolver::{ConfigResolver, ConfigResolverBuilder, ConfigSnapshot};
pub use store::{Parameter, ParameterStore, SecretStore};
pub use value::ConfigValue;

use thiserror::Error;

/// Boxed error preserved from a provider SDK
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for configuration resolution
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Error types for configuration resolution
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `get()` was called before `load()` completed
    #[error("Please invoke load() before attempting to access config values")]
    NotLoaded,

    /// No source produced a value for the key
    #[error("Config for {key} was not found")]
    KeyNotFound {
        /// Requested configuration key
        key: String,
    },

    /// A secret or parameter provider failed (transport, permissions, ...)
    #[error("{provider} provider failed: {message}")]
    Provider {
        /// Provider that raised the failure (e.g. "secretsmanager")
        provider: &'static str,
        /// Error message from the provider
        message: String,
        /// Underlying provider error, when available
        #[source]
        source: Option<BoxError>,
    },

    /// A chain of `$ref` dereferences exceeded the configured limit
    #[error("Reference '{reference}' exceeds the maximum reference depth of {depth}")]
    ReferenceDepthExceeded {
        /// Secret name whose dereference crossed the limit
        reference: String,
        /// Configured maximum depth
        depth: usize,
    },

    /// A resolved value could not be deserialized into the requested type
    #[error("Config for {key} could not be deserialized: {source}")]
    Deserialize {
        /// Requested configuration key
        key: String,
        /// Deserialization failure
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Build a provider failure without an underlying source error
    #[must_use]
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            source: None,
        }
    }

    /// Build a provider failure that keeps the SDK error as its source
    #[must_use]
    pub fn provider_with_source(
        provider: &'static str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_not_loaded_message() {
        let msg = ConfigError::NotLoaded.to_string();
        assert!(msg.contains("load()"));
    }

    #[test]
    fn test_key_not_found_names_key() {
        let err = ConfigError::KeyNotFound {
            key: "FOO".to_string(),
        };
        assert_eq!(err.to_string(), "Config for FOO was not found");
    }

    #[test]
    fn test_provider_error_message() {
        let err = ConfigError::provider("secretsmanager", "access denied");
        let msg = err.to_string();
        assert!(msg.contains("secretsmanager"));
        assert!(msg.contains("access denied"));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_provider_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = ConfigError::provider_with_source("ssm", "GetParameters failed", io);
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_reference_depth_message() {
        let err = ConfigError::ReferenceDepthExceeded {
            reference: "loop-a".to_string(),
            depth: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("loop-a"));
        assert!(msg.contains('8'));
    }

    #[test]
    fn test_error_debug() {
        let debug = format!("{:?}", ConfigError::NotLoaded);
        assert!(debug.contains("NotLoaded"));
    }
}
