//! AWS Secrets Manager implementation.
//!
//! Secrets may be stored as a plain string or as JSON with a `kms_key_id` or
//! `value` field.

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;

use super::{SecretError, SecretManager, SecretResult};
use crate::config::AwsCredentials;

/// Configuration for AWS Secrets Manager.
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerConfig {
    /// AWS region (e.g., "eu-central-1")
    pub region: String,
    /// Prefix for all secret names (e.g., "rds-snapshot-copier/")
    pub prefix: String,
    /// Optional endpoint URL for testing with localstack
    pub endpoint_url: Option<String>,
    pub credentials: AwsCredentials,
}

impl AwsSecretsManagerConfig {
    /// Create a new config with the given region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            prefix: "rds-snapshot-copier/".to_string(),
            endpoint_url: None,
            credentials: AwsCredentials::Default,
        }
    }

    /// Set the secret name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set a custom endpoint URL (useful for localstack testing).
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// AWS Secrets Manager secret manager.
pub struct AwsSecretsManager {
    client: Client,
    prefix: String,
}

impl AwsSecretsManager {
    /// Create a new AWS Secrets Manager client with the given configuration.
    pub async fn new(config: AwsSecretsManagerConfig) -> Self {
        let sdk_config = crate::aws::load_sdk_config(&config.region, &config.credentials).await;

        let mut sm_config = aws_sdk_secretsmanager::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = &config.endpoint_url {
            sm_config = sm_config.endpoint_url(endpoint_url);
        }

        Self {
            client: Client::from_conf(sm_config.build()),
            prefix: config.prefix,
        }
    }

    /// Build the full secret name with prefix.
    fn full_name(&self, key: &str) -> String {
        full_name(&self.prefix, key)
    }
}

fn full_name(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}", prefix, key)
    }
}

/// Extract the key id from a secret string.
fn extract_value(secret_string: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(secret_string) {
        for field in ["kms_key_id", "value"] {
            if let Some(value) = json.get(field).and_then(|v| v.as_str()) {
                return value.to_string();
            }
        }
    }
    secret_string.to_string()
}

#[async_trait]
impl SecretManager for AwsSecretsManager {
    async fn get(&self, key: &str) -> SecretResult<Option<String>> {
        let name = self.full_name(key);

        match self.client.get_secret_value().secret_id(&name).send().await {
            Ok(output) => {
                if let Some(secret_string) = output.secret_string() {
                    Ok(Some(extract_value(secret_string)))
                } else if let Some(secret_binary) = output.secret_binary() {
                    String::from_utf8(secret_binary.clone().into_inner())
                        .map(|s| Some(extract_value(&s)))
                        .map_err(|e| {
                            SecretError::Internal(format!(
                                "Secret '{}' binary is not valid UTF-8: {}",
                                key, e
                            ))
                        })
                } else {
                    Ok(None)
                }
            }
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    Ok(None)
                } else {
                    Err(SecretError::Connection(format!(
                        "Failed to get secret '{}': {}",
                        name, service_error
                    )))
                }
            }
        }
    }

    async fn health_check(&self) -> SecretResult<()> {
        match self.client.list_secrets().max_results(1).send().await {
            Ok(_) => Ok(()),
            Err(err) => Err(SecretError::Connection(format!(
                "AWS Secrets Manager health check failed: {}",
                err.into_service_error()
            ))),
        }
    }
}
