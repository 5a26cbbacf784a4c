//! Secret lookup for values that should not live in the config file.
//!
//! The copier resolves the target KMS key id through a [`SecretManager`] when
//! `target.kms_key_secret` is set. Backends:
//! - Environment variables
//! - In-memory (for testing)
//! - AWS Secrets Manager - requires `secrets-aws` feature

#[cfg(feature = "secrets-aws")]
mod aws;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
#[cfg(feature = "secrets-aws")]
pub use aws::{AwsSecretsManager, AwsSecretsManagerConfig};
use parking_lot::RwLock;
use thiserror::Error;

use crate::config::{AwsCredentials, SecretsConfig};

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SecretResult<T> = Result<T, SecretError>;

/// Read-only access to a secret store.
#[async_trait]
pub trait SecretManager: Send + Sync {
    /// Get a secret by key. Returns None if not found.
    async fn get(&self, key: &str) -> SecretResult<Option<String>>;

    /// Check if the secret manager is healthy/connected.
    async fn health_check(&self) -> SecretResult<()> {
        Ok(())
    }

    /// Get a secret, treating absence as an error.
    async fn require(&self, key: &str) -> SecretResult<String> {
        match self.get(key).await? {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(SecretError::NotFound(key.to_string())),
        }
    }
}

/// In-memory secret manager (for testing only)
#[derive(Default)]
pub struct MemorySecretManager {
    secrets: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySecretManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.write().insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretManager for MemorySecretManager {
    async fn get(&self, key: &str) -> SecretResult<Option<String>> {
        Ok(self.secrets.read().get(key).cloned())
    }
}

/// Environment-based secret manager (reads from env vars)
#[derive(Default)]
pub struct EnvSecretManager;

impl EnvSecretManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecretManager for EnvSecretManager {
    async fn get(&self, key: &str) -> SecretResult<Option<String>> {
        Ok(std::env::var(key).ok())
    }
}

/// Build the secret manager selected by `[secrets]`.
///
/// Returns `None` for `type = "none"`. `default_region` is used by backends
/// that need a region and were not given one. The backend must pass its
/// health check before it is returned.
#[cfg_attr(not(feature = "secrets-aws"), allow(unused_variables))]
pub async fn build_secret_manager(
    config: &SecretsConfig,
    default_region: &str,
    credentials: &AwsCredentials,
) -> SecretResult<Option<Arc<dyn SecretManager>>> {
    let manager: Arc<dyn SecretManager> = match config {
        SecretsConfig::None => return Ok(None),
        SecretsConfig::Env => Arc::new(EnvSecretManager::new()),
        #[cfg(feature = "secrets-aws")]
        SecretsConfig::Aws(aws) => {
            let mut sm_config = AwsSecretsManagerConfig::new(
                aws.region.as_deref().unwrap_or(default_region),
            )
            .with_prefix(aws.prefix.clone())
            .with_credentials(credentials.clone());
            if let Some(endpoint_url) = &aws.endpoint_url {
                sm_config = sm_config.with_endpoint_url(endpoint_url);
            }
            Arc::new(AwsSecretsManager::new(sm_config).await)
        }
    };

    let manager = checked(manager).await?;
    tracing::debug!(backend = ?config, "Secret manager initialized");
    Ok(Some(manager))
}

async fn checked(manager: Arc<dyn SecretManager>) -> SecretResult<Arc<dyn SecretManager>> {
    manager.health_check().await?;
    Ok(manager)
}
