//! Copying the latest automated snapshot of one resource.

use tracing::instrument;

use super::ReplicationError;
use crate::{
    client::{CopyRequest, SnapshotService},
    config::RunConfig,
    snapshot::{ResourceKind, SnapshotClass, select_latest, source_arn, validate_target},
};

/// Everything needed to replicate one resource in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub resource_name: String,
    pub resource_kind: ResourceKind,
    pub source_region: String,
    pub target_region: String,
    pub account: String,
    pub encryption_key_id: Option<String>,
    pub retention_count: u32,
}

impl CopyTask {
    /// Task for a standalone instance. The key is only passed on when the run
    /// opts into re-encrypting instance copies.
    pub fn instance(config: &RunConfig, name: &str) -> Self {
        let key = config
            .encrypt_instance_copies
            .then(|| config.encryption_key_id.clone())
            .flatten();
        Self::build(config, name, ResourceKind::Instance, key)
    }

    /// Task for a cluster, always re-encrypted under the run's key.
    pub fn cluster(config: &RunConfig, name: &str) -> Self {
        Self::build(
            config,
            name,
            ResourceKind::Cluster,
            config.encryption_key_id.clone(),
        )
    }

    fn build(
        config: &RunConfig,
        name: &str,
        resource_kind: ResourceKind,
        encryption_key_id: Option<String>,
    ) -> Self {
        Self {
            resource_name: name.to_string(),
            resource_kind,
            source_region: config.source_region.clone(),
            target_region: config.target_region.clone(),
            account: config.account.clone(),
            encryption_key_id,
            retention_count: config.retention_count,
        }
    }
}

/// Result of a copy step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The service accepted the copy; it completes asynchronously.
    Copied {
        source_arn: String,
        target_identifier: String,
    },
    /// Dry run: the copy that would have been issued.
    Planned {
        source_arn: String,
        target_identifier: String,
    },
    /// The resource has no automated snapshot.
    NothingToCopy,
}

impl CopyOutcome {
    pub fn target_identifier(&self) -> Option<&str> {
        match self {
            Self::Copied {
                target_identifier, ..
            }
            | Self::Planned {
                target_identifier, ..
            } => Some(target_identifier),
            Self::NothingToCopy => None,
        }
    }
}

/// Issues copies of the latest automated snapshot into the target region.
pub struct CopyOrchestrator<'a> {
    source: &'a dyn SnapshotService,
    target: &'a dyn SnapshotService,
    dry_run: bool,
}

impl<'a> CopyOrchestrator<'a> {
    pub fn new(source: &'a dyn SnapshotService, target: &'a dyn SnapshotService) -> Self {
        Self {
            source,
            target,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Copy the latest automated snapshot of `task`'s resource.
    ///
    /// Makes exactly one copy attempt. A rejection, including a name already
    /// taken by an overlapping run, is returned as
    /// [`ReplicationError::CopyIssue`].
    #[instrument(
        skip_all,
        fields(resource = %task.resource_name, kind = %task.resource_kind)
    )]
    pub async fn copy(&self, task: &CopyTask) -> Result<CopyOutcome, ReplicationError> {
        tracing::info!("Copying snapshots for {}", task.resource_name);

        let automated = self
            .source
            .list_snapshots(
                task.resource_kind,
                &task.resource_name,
                SnapshotClass::Automated,
            )
            .await
            .map_err(|source| ReplicationError::Listing {
                resource: task.resource_name.clone(),
                kind: task.resource_kind,
                class: SnapshotClass::Automated,
                source,
            })?;

        let Some(latest) = select_latest(&automated, SnapshotClass::Automated) else {
            tracing::info!("Found no automated snapshots. Nothing to do");
            return Ok(CopyOutcome::NothingToCopy);
        };

        let target_identifier =
            validate_target(latest, &automated).map_err(|source| ReplicationError::Naming {
                resource: task.resource_name.clone(),
                kind: task.resource_kind,
                source,
            })?;
        let source_arn = source_arn(
            &task.source_region,
            &task.account,
            task.resource_kind,
            &latest.identifier,
        );

        tracing::info!(
            source_arn = %source_arn,
            target_identifier = %target_identifier,
            source_status = latest.status.as_deref().unwrap_or("unknown"),
            "Will copy {} to {}",
            source_arn,
            target_identifier
        );

        if self.dry_run {
            tracing::info!(
                target_region = %task.target_region,
                "DRY RUN: copy not issued"
            );
            return Ok(CopyOutcome::Planned {
                source_arn,
                target_identifier,
            });
        }

        let request = CopyRequest {
            resource_kind: task.resource_kind,
            source_arn,
            target_identifier,
            kms_key_id: task.encryption_key_id.clone(),
            copy_tags: true,
            source_region: task.source_region.clone(),
        };

        match self.target.copy_snapshot(&request).await {
            Ok(assigned) => {
                tracing::debug!(
                    target_identifier = %assigned,
                    backend = self.target.backend_name(),
                    "Copy accepted"
                );
                Ok(CopyOutcome::Copied {
                    source_arn: request.source_arn,
                    target_identifier: assigned,
                })
            }
            Err(source) => {
                if source.is_already_exists() {
                    tracing::warn!(
                        target_identifier = %request.target_identifier,
                        "Copy target already exists; another run may have copied this snapshot"
                    );
                }
                Err(ReplicationError::CopyIssue {
                    resource: task.resource_name.clone(),
                    kind: task.resource_kind,
                    source_arn: request.source_arn,
                    target_identifier: request.target_identifier,
                    source,
                })
            }
        }
    }
}
