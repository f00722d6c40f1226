//! AWS Secrets Manager secret store

use crate::client::RegionalClients;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::operation::get_secret_value::{
    GetSecretValueError, GetSecretValueOutput,
};
use config_loader::{ConfigError, Result, SecretStore};

const PROVIDER: &str = "secretsmanager";

/// Fetches secrets from AWS Secrets Manager with `GetSecretValue`.
///
/// A secret that does not exist is reported as having no payload, so a
/// function without a secret of its own loads from the environment alone.
/// Binary secrets are returned when they hold UTF-8 text.
pub struct AwsSecretStore {
    clients: RegionalClients<Client>,
}

impl std::fmt::Debug for AwsSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretStore")
            .field("default_region", &self.clients.default_region())
            .field("regions", &self.clients.region_count())
            .finish()
    }
}

impl AwsSecretStore {
    /// Create a store from the default AWS configuration chain
    pub async fn new() -> Self {
        Self::from_sdk_config(crate::load_sdk_config().await)
    }

    /// Create a store from an already loaded SDK configuration
    #[must_use]
    pub fn from_sdk_config(sdk_config: SdkConfig) -> Self {
        Self {
            clients: RegionalClients::new(sdk_config),
        }
    }

    fn client(&self, region: Option<&str>) -> Client {
        self.clients.get(region, |sdk_config, region| {
            let mut builder = aws_sdk_secretsmanager::config::Builder::from(sdk_config);
            if let Some(region) = region {
                builder = builder.region(Region::new(region.to_owned()));
            }
            Client::from_conf(builder.build())
        })
    }

    /// Text payload of a secret: `SecretString`, else UTF-8 `SecretBinary`
    fn payload(output: &GetSecretValueOutput) -> Option<String> {
        if let Some(text) = output.secret_string() {
            return Some(text.to_owned());
        }
        output
            .secret_binary()
            .and_then(|blob| std::str::from_utf8(blob.as_ref()).ok())
            .map(str::to_owned)
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn get_secret(&self, name: &str, region: Option<&str>) -> Result<Option<String>> {
        let response = match self
            .client(region)
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetSecretValueError::is_resource_not_found_exception) =>
            {
                tracing::debug!(secret = %name, region = ?region, "Secret does not exist");
                return Ok(None);
            }
            Err(err) => {
                let message = format!(
                    "GetSecretValue for '{name}' failed: {}",
                    DisplayErrorContext(&err)
                );
                return Err(ConfigError::provider_with_source(PROVIDER, message, err));
            }
        };

        let payload = Self::payload(&response);
        if payload.is_none() {
            tracing::debug!(secret = %name, "Secret has no text payload");
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_secretsmanager::primitives::Blob;

    #[test]
    fn test_payload_prefers_string() {
        let output = GetSecretValueOutput::builder()
            .secret_string(r#"{"FOO":"bar"}"#)
            .secret_binary(Blob::new("ignored"))
            .build();
        assert_eq!(
            AwsSecretStore::payload(&output).as_deref(),
            Some(r#"{"FOO":"bar"}"#)
        );
    }

    #[test]
    fn test_payload_from_utf8_binary() {
        let output = GetSecretValueOutput::builder()
            .secret_binary(Blob::new("plain-text"))
            .build();
        assert_eq!(AwsSecretStore::payload(&output).as_deref(), Some("plain-text"));
    }

    #[test]
    fn test_payload_missing_or_not_utf8() {
        let empty = GetSecretValueOutput::builder().build();
        assert!(AwsSecretStore::payload(&empty).is_none());

        let binary = GetSecretValueOutput::builder()
            .secret_binary(Blob::new(vec![0xff, 0xfe, 0x00]))
            .build();
        assert!(AwsSecretStore::payload(&binary).is_none());
    }

    #[test]
    fn test_debug_shows_no_clients_yet() {
        let store = AwsSecretStore::from_sdk_config(SdkConfig::builder().build());
        let debug = format!("{store:?}");
        assert!(debug.contains("AwsSecretStore"));
        assert!(debug.contains("regions: 0"));
        assert_eq!(store.provider_name(), "secretsmanager");
    }
}
