//! Source, target and resource configuration.

use serde::{Deserialize, Serialize};

use super::{ConfigError, check_unique};

/// Region the automated snapshots are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Source region (e.g., "eu-west-1").
    pub region: String,

    /// Custom endpoint URL (for localstack or other RDS-compatible services).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Region, account and encryption key the copies are made with.
///
/// `region` and `account` may be left unset and supplied per run by the
/// command line or the trigger payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Target region (e.g., "eu-central-1").
    #[serde(default)]
    pub region: Option<String>,

    /// Account that owns the source snapshots.
    #[serde(default)]
    pub account: Option<String>,

    /// KMS key in the target region used to re-encrypt copies.
    #[serde(default)]
    pub kms_key_id: Option<String>,

    /// Name of a secret holding the KMS key id, resolved through `[secrets]`.
    /// Mutually exclusive with `kms_key_id`.
    #[serde(default)]
    pub kms_key_secret: Option<String>,

    /// Also re-encrypt instance copies under the key.
    /// Default: false (instance copies keep the service default)
    #[serde(default)]
    pub encrypt_instance_copies: bool,

    /// Custom endpoint URL for the target-region client.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Attach a presigned source-region request to each copy.
    /// Required by the service for cross-region copies of encrypted snapshots.
    /// Default: true
    #[serde(default = "default_true")]
    pub presign_copies: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            region: None,
            account: None,
            kms_key_id: None,
            kms_key_secret: None,
            encrypt_instance_copies: false,
            endpoint_url: None,
            presign_copies: true,
        }
    }
}

impl TargetConfig {
    /// Whether a key is configured, directly or through a secret.
    pub fn has_key(&self) -> bool {
        self.kms_key_id.is_some() || self.kms_key_secret.is_some()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.kms_key_id.is_some() && self.kms_key_secret.is_some() {
            return Err(ConfigError::Validation(
                "target.kms_key_id and target.kms_key_secret are mutually exclusive".into(),
            ));
        }
        if let Some(account) = &self.account
            && account.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "target.account must not be empty".into(),
            ));
        }
        if self.encrypt_instance_copies && !self.has_key() {
            return Err(ConfigError::Validation(
                "target.encrypt_instance_copies requires a key".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// Instances and clusters whose snapshots are copied, in processing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ResourcesConfig {
    /// Database instance names.
    #[serde(default)]
    pub instances: Vec<String>,

    /// Database cluster names.
    #[serde(default)]
    pub clusters: Vec<String>,
}

impl ResourcesConfig {
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.clusters.is_empty()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        check_unique(&self.instances, "resources.instances")?;
        check_unique(&self.clusters, "resources.clusters")
    }
}

/// Run-level behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    /// Keep processing the remaining resources after one fails.
    /// The run still reports failure. Default: true
    #[serde(default = "default_true")]
    pub continue_on_error: bool,

    /// Log planned copies and deletions without issuing them.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            dry_run: false,
        }
    }
}

/// AWS credential configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum AwsCredentials {
    /// Use the default credential chain (env, profile, IMDS, etc.)
    #[default]
    Default,

    /// Use static credentials.
    Static {
        access_key_id: String,
        secret_access_key: String,
        #[serde(default)]
        session_token: Option<String>,
    },

    /// Use a specific AWS profile.
    Profile { name: String },
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AwsCredentials::Default => write!(f, "Default"),
            AwsCredentials::Static { .. } => f
                .debug_struct("Static")
                .field("access_key_id", &"****")
                .field("secret_access_key", &"****")
                .field("session_token", &"****")
                .finish(),
            AwsCredentials::Profile { name } => {
                f.debug_struct("Profile").field("name", name).finish()
            }
        }
    }
}
