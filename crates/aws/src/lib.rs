//! AWS providers for config-loader
//!
//! This crate implements the config-loader collaborator traits on top of the
//! AWS SDK:
//! - AWS Secrets Manager via the [`secrets`] module
//! - AWS Systems Manager Parameter Store via the [`parameters`] module
//!
//! Both stores load the shared SDK configuration once and keep one client per
//! region, since every lookup names the region it should be served from.

mod client;
pub mod parameters;
pub mod secrets;

// Re-export main types for convenience
pub use parameters::AwsParameterStore;
pub use secrets::AwsSecretStore;

/// Load the SDK configuration from the default provider chain
pub async fn load_sdk_config() -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await
}
