//! Secrets manager configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the secrets manager.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretsConfig {
    /// No secrets manager (secrets are not resolved from external sources)
    #[default]
    None,

    /// Environment variable-based secrets
    /// Keys are looked up directly as environment variable names.
    Env,

    /// AWS Secrets Manager. Requires the `secrets-aws` feature.
    #[cfg(feature = "secrets-aws")]
    Aws(AwsSecretsConfig),
}

impl SecretsConfig {
    pub fn is_none(&self) -> bool {
        matches!(self, SecretsConfig::None)
    }
}

#[cfg(feature = "secrets-aws")]
/// Configuration for AWS Secrets Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct AwsSecretsConfig {
    /// AWS region (e.g., "eu-central-1"). If not set, uses the target region.
    #[serde(default)]
    pub region: Option<String>,

    /// Prefix for all secret names (default: "rds-snapshot-copier/")
    #[serde(default = "default_aws_prefix")]
    pub prefix: String,

    /// Custom endpoint URL (for localstack or other AWS-compatible services)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[cfg(feature = "secrets-aws")]
fn default_aws_prefix() -> String {
    "rds-snapshot-copier/".to_string()
}
