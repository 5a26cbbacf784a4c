//! Pruning old copies in the target region.
//!
//! Every manual snapshot of a resource counts towards retention, not only the
//! ones this tool created, unless the pruner is restricted to managed copies.

use chrono::Utc;
use tracing::instrument;

use super::{DeleteFailure, ReplicationError};
use crate::{
    client::SnapshotService,
    config::DeleteFailurePolicy,
    snapshot::{COPY_PREFIX, ResourceKind, SnapshotClass, order_newest_first},
};

/// Results from a single prune pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Manual snapshots considered for retention.
    pub found: usize,
    /// Number kept (the newest `retention_count`).
    pub kept: usize,
    /// Identifiers deleted, in deletion order.
    pub deleted: Vec<String>,
    /// Dry run: identifiers that would have been deleted.
    pub planned: Vec<String>,
}

impl PruneReport {
    /// Check if any snapshots were deleted.
    pub fn has_deletions(&self) -> bool {
        !self.deleted.is_empty()
    }
}

/// Deletes all but the newest copies of a resource in the target region.
pub struct RetentionPruner<'a> {
    target: &'a dyn SnapshotService,
    policy: DeleteFailurePolicy,
    only_managed_copies: bool,
    dry_run: bool,
}

impl<'a> RetentionPruner<'a> {
    pub fn new(target: &'a dyn SnapshotService) -> Self {
        Self {
            target,
            policy: DeleteFailurePolicy::default(),
            only_managed_copies: false,
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: DeleteFailurePolicy) -> Self {
        self.policy = policy;
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

    /// Keep the newest `retention_count` manual snapshots of the resource and
    /// delete the rest, walking from newest to oldest.
    #[instrument(
        skip_all,
        fields(resource = %resource_name, kind = %kind, keep = retention_count)
    )]
    pub async fn prune(
        &self,
        resource_name: &str,
        kind: ResourceKind,
        retention_count: u32,
    ) -> Result<PruneReport, ReplicationError> {
        let mut copies = self
            .target
            .list_snapshots(kind, resource_name, SnapshotClass::Manual)
            .await
            .map_err(|source| ReplicationError::Listing {
                resource: resource_name.to_string(),
                kind,
                class: SnapshotClass::Manual,
                source,
            })?;

        if self.only_managed_copies {
            copies.retain(|s| s.identifier.starts_with(COPY_PREFIX));
        }

        let keep = usize::try_from(retention_count).unwrap_or(usize::MAX);
        let mut report = PruneReport {
            found: copies.len(),
            kept: copies.len().min(keep),
            ..Default::default()
        };

        if copies.len() <= keep {
            tracing::debug!(found = copies.len(), "Nothing to prune");
            return Ok(report);
        }

        let ordered = order_newest_first(copies, Utc::now());
        let mut failures = Vec::new();

        for expired in ordered.into_iter().skip(keep) {
            tracing::info!(
                identifier = %expired.identifier,
                created_at = ?expired.created_at,
                "Will remove {}",
                expired.identifier
            );

            if self.dry_run {
                report.planned.push(expired.identifier);
                continue;
            }

            match self.target.delete_snapshot(kind, &expired.identifier).await {
                Ok(()) => report.deleted.push(expired.identifier),
                Err(error) => {
                    tracing::error!(
                        identifier = %expired.identifier,
                        error = %error,
                        "Failed to delete snapshot"
                    );
                    failures.push(DeleteFailure {
                        identifier: expired.identifier,
                        error,
                    });
                    if self.policy == DeleteFailurePolicy::Halt {
                        break;
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(ReplicationError::Deletion {
                resource: resource_name.to_string(),
                kind,
                failures,
                deleted: report.deleted,
            });
        }

        if report.has_deletions() {
            tracing::info!(
                deleted = report.deleted.len(),
                kept = report.kept,
                "Prune complete"
            );
        }

        Ok(report)
    }
}
