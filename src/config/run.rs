//! Per-invocation settings.
//!
//! A [`RunConfig`] is resolved once per run from the file configuration, the
//! command-line overrides and the trigger payload, and is never mutated after.
//! For the target region and account the command line wins over the file,
//! and the file wins over the payload.

use super::{ConfigError, CopierConfig, DeleteFailurePolicy};
use crate::{event::InvocationEvent, secrets::SecretManager};

/// Values supplied on the command line for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub target_region: Option<String>,
    pub account: Option<String>,
    /// Forces dry-run on; cannot turn a configured dry-run off.
    pub dry_run: bool,
}

/// Immutable settings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub source_region: String,
    pub target_region: String,
    pub account: String,
    /// Instance names, processed in this order.
    pub instances: Vec<String>,
    /// Cluster names, processed after every instance.
    pub clusters: Vec<String>,
    pub encryption_key_id: Option<String>,
    pub retention_count: u32,
    pub delete_failure_policy: DeleteFailurePolicy,
    pub continue_on_error: bool,
    pub encrypt_instance_copies: bool,
    pub only_managed_copies: bool,
    pub dry_run: bool,
}

impl RunConfig {
    /// Create a run with default policies and no resources.
    pub fn new(
        source_region: impl Into<String>,
        target_region: impl Into<String>,
        account: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            source_region: source_region.into(),
            target_region: target_region.into(),
            account: account.into(),
            instances: Vec::new(),
            clusters: Vec::new(),
            encryption_key_id: None,
            retention_count: 10,
            delete_failure_policy: DeleteFailurePolicy::Halt,
            continue_on_error: true,
            encrypt_instance_copies: false,
            only_managed_copies: false,
            dry_run: false,
        };
        config.check()?;
        Ok(config)
    }

    pub fn with_instances<I, S>(mut self, instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instances = instances.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_clusters<I, S>(mut self, clusters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clusters = clusters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_encryption_key(mut self, key_id: impl Into<String>) -> Self {
        self.encryption_key_id = Some(key_id.into());
        self
    }

    pub fn with_retention_count(mut self, count: u32) -> Self {
        self.retention_count = count;
        self
    }

    pub fn with_delete_failure_policy(mut self, policy: DeleteFailurePolicy) -> Self {
        self.delete_failure_policy = policy;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_encrypt_instance_copies(mut self, encrypt: bool) -> Self {
        self.encrypt_instance_copies = encrypt;
        self
    }

    pub fn with_only_managed_copies(mut self, only_managed: bool) -> Self {
        self.only_managed_copies = only_managed;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check the invariants every run relies on.
    ///
    /// The `with_*` builders do not re-check, so [`run`](crate::replication::run)
    /// calls this again before issuing anything.
    pub fn check(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("source region", &self.source_region),
            ("target region", &self.target_region),
            ("account", &self.account),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{field} must not be empty")));
            }
        }
        if self.source_region == self.target_region {
            return Err(ConfigError::Validation(format!(
                "target region must differ from source region (both are '{}')",
                self.source_region
            )));
        }
        let has_key = self
            .encryption_key_id
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !has_key {
            if !self.clusters.is_empty() {
                return Err(ConfigError::Validation(
                    "cluster copies require an encryption key".to_string(),
                ));
            }
            if self.encrypt_instance_copies {
                return Err(ConfigError::Validation(
                    "encrypted instance copies require an encryption key".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl CopierConfig {
    /// Resolve the settings of one run.
    ///
    /// `secrets` is only consulted when `target.kms_key_secret` is set.
    pub async fn resolve(
        &self,
        overrides: &RunOverrides,
        event: &InvocationEvent,
        secrets: Option<&dyn SecretManager>,
    ) -> Result<RunConfig, ConfigError> {
        let target_region = first_set([
            overrides.target_region.as_deref(),
            self.target.region.as_deref(),
            event.region.as_deref(),
        ])
        .ok_or(ConfigError::Missing("target region"))?;

        let account = first_set([
            overrides.account.as_deref(),
            self.target.account.as_deref(),
            event.account.as_deref(),
        ])
        .ok_or(ConfigError::Missing("account"))?;

        let encryption_key_id = match (&self.target.kms_key_id, &self.target.kms_key_secret) {
            (Some(key_id), _) => Some(key_id.clone()),
            (None, Some(secret_key)) => {
                let manager = secrets.ok_or_else(|| ConfigError::Secret {
                    key: secret_key.clone(),
                    reason: "no secrets backend configured".to_string(),
                })?;
                let key_id =
                    manager
                        .require(secret_key)
                        .await
                        .map_err(|e| ConfigError::Secret {
                            key: secret_key.clone(),
                            reason: e.to_string(),
                        })?;
                tracing::debug!(secret = %secret_key, "Resolved KMS key id from secrets");
                Some(key_id)
            }
            (None, None) => None,
        };

        let run = RunConfig {
            source_region: self.source.region.clone(),
            target_region: target_region.to_string(),
            account: account.to_string(),
            instances: self.resources.instances.clone(),
            clusters: self.resources.clusters.clone(),
            encryption_key_id,
            retention_count: self.retention.keep,
            delete_failure_policy: self.retention.on_delete_failure,
            continue_on_error: self.run.continue_on_error,
            encrypt_instance_copies: self.target.encrypt_instance_copies,
            only_managed_copies: self.retention.only_managed_copies,
            dry_run: self.run.dry_run || overrides.dry_run,
        };
        run.check()?;
        Ok(run)
    }
}

fn first_set<'a>(candidates: [Option<&'a str>; 3]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecretManager;

    fn config(extra: &str) -> CopierConfig {
        CopierConfig::from_str(&format!(
            r#"
            [source]
            region = "eu-west-1"

            [resources]
            instances = ["db-a"]

            {extra}
        "#
        ))
        .unwrap()
    }

    fn event(region: &str, account: &str) -> InvocationEvent {
        InvocationEvent {
            region: Some(region.to_string()),
            account: Some(account.to_string()),
        }
    }

    #[tokio::test]
    async fn test_payload_fills_missing_values() {
        let run = config("")
            .resolve(
                &RunOverrides::default(),
                &event("eu-central-1", "123456789012"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(run.source_region, "eu-west-1");
        assert_eq!(run.target_region, "eu-central-1");
        assert_eq!(run.account, "123456789012");
        assert_eq!(run.instances, vec!["db-a"]);
        assert_eq!(run.retention_count, 10);
        assert_eq!(run.encryption_key_id, None);
        assert!(!run.dry_run);
    }

    #[tokio::test]
    async fn test_precedence_cli_then_file_then_payload() {
        let cfg = config(
            r#"
            [target]
            region = "us-east-1"
            account = "111111111111"
        "#,
        );
        let payload = event("eu-central-1", "222222222222");

        let from_file = cfg
            .resolve(&RunOverrides::default(), &payload, None)
            .await
            .unwrap();
        assert_eq!(from_file.target_region, "us-east-1");
        assert_eq!(from_file.account, "111111111111");

        let overrides = RunOverrides {
            target_region: Some("ap-southeast-2".into()),
            account: Some("333333333333".into()),
            dry_run: true,
        };
        let from_cli = cfg.resolve(&overrides, &payload, None).await.unwrap();
        assert_eq!(from_cli.target_region, "ap-southeast-2");
        assert_eq!(from_cli.account, "333333333333");
        assert!(from_cli.dry_run);
    }

    #[tokio::test]
    async fn test_missing_account() {
        let err = config("")
            .resolve(
                &RunOverrides::default(),
                &InvocationEvent {
                    region: Some("eu-central-1".into()),
                    account: None,
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("account")));
    }

    #[tokio::test]
    async fn test_payload_region_equal_to_source_rejected() {
        let err = config("")
            .resolve(
                &RunOverrides::default(),
                &event("eu-west-1", "123456789012"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{err}");
    }

    #[tokio::test]
    async fn test_key_resolved_from_secret() {
        let cfg = config(
            r#"
            [target]
            kms_key_secret = "kms-key-id"

            [secrets]
            type = "env"
        "#,
        );
        let secrets = MemorySecretManager::new()
            .with_secret("kms-key-id", "arn:aws:kms:eu-central-1:123456789012:key/abc");

        let run = cfg
            .resolve(
                &RunOverrides::default(),
                &event("eu-central-1", "123456789012"),
                Some(&secrets),
            )
            .await
            .unwrap();
        assert_eq!(
            run.encryption_key_id.as_deref(),
            Some("arn:aws:kms:eu-central-1:123456789012:key/abc")
        );

        let err = cfg
            .resolve(
                &RunOverrides::default(),
                &event("eu-central-1", "123456789012"),
                Some(&MemorySecretManager::new()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Secret { ref key, .. } if key == "kms-key-id"));
    }

    #[test]
    fn test_run_config_new_rejects_same_region() {
        assert!(RunConfig::new("eu-west-1", "eu-west-1", "123456789012").is_err());
        assert!(RunConfig::new("eu-west-1", "eu-central-1", "").is_err());

        let run = RunConfig::new("eu-west-1", "eu-central-1", "123456789012")
            .unwrap()
            .with_encryption_key("arn:aws:kms:eu-central-1:123456789012:key/abc")
            .with_clusters(["aurora-a"])
            .with_retention_count(3);
        assert_eq!(run.clusters, vec!["aurora-a"]);
        assert_eq!(run.retention_count, 3);
        assert_eq!(run.delete_failure_policy, DeleteFailurePolicy::Halt);
        assert!(run.check().is_ok());
    }

    #[test]
    fn test_check_requires_key_for_encrypted_copies() {
        let base = RunConfig::new("eu-west-1", "eu-central-1", "123456789012").unwrap();

        let err = base.clone().with_clusters(["aurora-a"]).check().unwrap_err();
        assert!(err.to_string().contains("cluster copies"), "{err}");

        let err = base
            .clone()
            .with_encrypt_instance_copies(true)
            .check()
            .unwrap_err();
        assert!(err.to_string().contains("instance copies"), "{err}");

        let blank_key = base.clone().with_clusters(["aurora-a"]).with_encryption_key("  ");
        assert!(blank_key.check().is_err());

        assert!(base.with_instances(["db-a"]).check().is_ok());
    }

    #[tokio::test]
    async fn test_values_are_trimmed() {
        let overrides = RunOverrides {
            target_region: Some(" eu-west-1 ".into()),
            ..Default::default()
        };
        let err = config("")
            .resolve(&overrides, &event("eu-central-1", "123456789012"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{err}");

        let run = config("")
            .resolve(
                &RunOverrides::default(),
                &event("eu-central-1 ", " 123456789012"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(run.target_region, "eu-central-1");
        assert_eq!(run.account, "123456789012");
    }
}
