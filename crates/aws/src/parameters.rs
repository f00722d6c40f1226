//! AWS Systems Manager Parameter Store

use crate::client::RegionalClients;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::config::Region;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::ParameterType;
use config_loader::{ConfigError, Parameter, ParameterStore, Result};
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashMap};

const PROVIDER: &str = "ssm";

/// `GetParameters` accepts at most this many names per call
const MAX_NAMES_PER_CALL: usize = 10;

/// Fetches parameters from SSM Parameter Store with `GetParameters`.
///
/// Secure strings are always decrypted. Requests larger than the service
/// limit are split and fetched concurrently.
pub struct AwsParameterStore {
    clients: RegionalClients<Client>,
}

impl std::fmt::Debug for AwsParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsParameterStore")
            .field("default_region", &self.clients.default_region())
            .field("regions", &self.clients.region_count())
            .finish()
    }
}

impl AwsParameterStore {
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
            let mut builder = aws_sdk_ssm::config::Builder::from(sdk_config);
            if let Some(region) = region {
                builder = builder.region(Region::new(region.to_owned()));
            }
            Client::from_conf(builder.build())
        })
    }

    /// Split names into request-sized batches
    fn batches(names: &BTreeSet<String>) -> Vec<Vec<String>> {
        let names: Vec<String> = names.iter().cloned().collect();
        names
            .chunks(MAX_NAMES_PER_CALL)
            .map(<[String]>::to_vec)
            .collect()
    }

    fn convert(parameter: &aws_sdk_ssm::types::Parameter) -> Option<(String, Parameter)> {
        let name = parameter.name()?;
        let value = parameter.value().unwrap_or_default();
        let is_list = matches!(parameter.r#type(), Some(ParameterType::StringList));
        Some((
            name.to_owned(),
            Parameter {
                value: value.to_owned(),
                is_list,
            },
        ))
    }
}

#[async_trait]
impl ParameterStore for AwsParameterStore {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn get_parameters(
        &self,
        names: &BTreeSet<String>,
        region: Option<&str>,
    ) -> Result<HashMap<String, Parameter>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let client = self.client(region);
        let requests = Self::batches(names).into_iter().map(|batch| {
            let client = &client;
            async move {
                client
                    .get_parameters()
                    .set_names(Some(batch))
                    .with_decryption(true)
                    .send()
                    .await
                    .map_err(|err| {
                        let message =
                            format!("GetParameters failed: {}", DisplayErrorContext(&err));
                        ConfigError::provider_with_source(PROVIDER, message, err)
                    })
            }
        });
        let responses = try_join_all(requests).await?;

        let mut result = HashMap::with_capacity(names.len());
        for response in &responses {
            for invalid in response.invalid_parameters() {
                tracing::debug!(parameter = %invalid, region = ?region, "Parameter not found");
            }
            result.extend(response.parameters().iter().filter_map(Self::convert));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssm_parameter(name: &str, value: &str, kind: ParameterType) -> aws_sdk_ssm::types::Parameter {
        aws_sdk_ssm::types::Parameter::builder()
            .name(name)
            .value(value)
            .r#type(kind)
            .build()
    }

    #[test]
    fn test_batches_respect_service_limit() {
        let names: BTreeSet<String> = (0..23).map(|i| format!("dev/KEY_{i:02}")).collect();

        let batches = AwsParameterStore::batches(&names);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), MAX_NAMES_PER_CALL);
        assert_eq!(batches[2].len(), 3);
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 23);
    }

    #[test]
    fn test_convert_string_list() {
        let converted =
            AwsParameterStore::convert(&ssm_parameter("HOSTS", "a,b", ParameterType::StringList));
        assert_eq!(
            converted,
            Some(("HOSTS".to_string(), Parameter::list("a,b")))
        );
    }

    #[test]
    fn test_convert_secure_string_is_single_value() {
        let converted = AwsParameterStore::convert(&ssm_parameter(
            "dev/DB_PASSWORD",
            "p,a,s,s",
            ParameterType::SecureString,
        ));
        assert_eq!(
            converted,
            Some(("dev/DB_PASSWORD".to_string(), Parameter::new("p,a,s,s")))
        );
    }

    #[test]
    fn test_convert_without_name() {
        let parameter = aws_sdk_ssm::types::Parameter::builder().value("x").build();
        assert!(AwsParameterStore::convert(&parameter).is_none());
    }

    #[tokio::test]
    async fn test_empty_request_makes_no_call() {
        let store = AwsParameterStore::from_sdk_config(SdkConfig::builder().build());

        let result = store.get_parameters(&BTreeSet::new(), Some("us-east-1")).await;

        assert!(tokio_test::assert_ok!(result).is_empty());
        assert!(format!("{store:?}").contains("regions: 0"));
    }
}
