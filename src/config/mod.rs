//! Configuration module for the snapshot copier.
//!
//! The copier is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Values the trigger
//! payload or command line can supply (target region, account) are optional
//! here and resolved into a [`RunConfig`] once per invocation.
//!
//! # Example
//!
//! ```toml
//! [source]
//! region = "eu-west-1"
//!
//! [target]
//! region = "eu-central-1"
//! account = "${AWS_ACCOUNT_ID}"
//! kms_key_id = "arn:aws:kms:eu-central-1:123456789012:key/abc123"
//!
//! [resources]
//! instances = ["my-rds-instance"]
//! clusters = ["my-aurora-cluster"]
//!
//! [retention]
//! keep = 10
//! ```

mod observability;
mod replication;
mod retention;
mod run;
mod secrets;

use std::{collections::HashSet, path::Path};

pub use observability::*;
pub use replication::*;
pub use retention::*;
pub use run::*;
pub use secrets::*;
use serde::{Deserialize, Serialize};

/// Starter configuration written by `rds-snapshot-copier init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# RDS snapshot copier configuration

[source]
region = "eu-west-1"

# Target region and account may also come from --target-region / --account
# or from the trigger payload ("region" / "account").
[target]
# region = "eu-central-1"
# account = "${AWS_ACCOUNT_ID}"
# KMS key in the target region; required when clusters are configured
# kms_key_id = "arn:aws:kms:eu-central-1:123456789012:key/..."
encrypt_instance_copies = false

[resources]
instances = ["my-rds-instance"]
# clusters = ["my-aurora-cluster"]

[retention]
keep = 10
on_delete_failure = "halt"

[run]
continue_on_error = true
dry_run = false

[observability.logging]
level = "info"
format = "compact"
"#;

/// Root configuration for the snapshot copier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct CopierConfig {
    /// Region holding the automated snapshots.
    pub source: SourceConfig,

    /// Region, account and key the copies are made with.
    #[serde(default)]
    pub target: TargetConfig,

    /// Instances and clusters whose snapshots are copied.
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// How many copies to keep in the target region.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Run-level behaviour (failure handling, dry run).
    #[serde(default)]
    pub run: RunSettings,

    /// Credential source for every AWS client.
    #[serde(default)]
    pub credentials: AwsCredentials,

    /// Secrets manager used to resolve `target.kms_key_secret`.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl CopierConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: CopierConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.source.region.trim().is_empty() {
            return Err(ConfigError::Validation("source.region must not be empty".into()));
        }

        if let Some(target_region) = &self.target.region
            && target_region == &self.source.region
        {
            return Err(ConfigError::Validation(format!(
                "target.region must differ from source.region (both are '{}')",
                target_region
            )));
        }

        self.target.validate()?;
        self.resources.validate()?;

        if !self.resources.clusters.is_empty() && !self.target.has_key() {
            return Err(ConfigError::Validation(
                "cluster copies require target.kms_key_id or target.kms_key_secret".into(),
            ));
        }

        if self.target.kms_key_secret.is_some() && self.secrets.is_none() {
            return Err(ConfigError::Validation(
                "target.kms_key_secret requires a [secrets] backend".into(),
            ));
        }

        if self.resources.is_empty() {
            tracing::warn!("No instances or clusters configured; runs will do nothing");
        }

        Ok(())
    }

    /// Generate the JSON schema for the copier configuration.
    #[cfg(feature = "json-schema")]
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CopierConfig)
    }

    /// Generate the JSON schema as a pretty-printed JSON string.
    #[cfg(feature = "json-schema")]
    pub fn json_schema_string() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::json_schema())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Missing required value: {0} (set it in the config file, on the command line, or in the trigger payload)")]
    Missing(&'static str),

    #[error("Failed to resolve secret '{key}': {reason}")]
    Secret { key: String, reason: String },
}

/// Reject duplicate names; each would be copied twice and collide.
pub(crate) fn check_unique(names: &[String], field: &str) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{field} contains an empty name"
            )));
        }
        if !seen.insert(name) {
            return Err(ConfigError::Validation(format!(
                "{field} lists '{name}' more than once"
            )));
        }
    }
    Ok(())
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("invalid interpolation pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
