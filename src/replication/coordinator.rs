//! Driving copy and prune across every configured resource.
//!
//! Instances are processed before clusters, each in configuration order. A
//! resource's copy and prune form one unit of work: a failed copy skips that
//! resource's prune, and nothing done for earlier resources is undone.

use tracing::instrument;
use uuid::Uuid;

use super::{
    CopyOrchestrator, CopyOutcome, CopyTask, PruneReport, ReplicationError, RetentionPruner,
};
use crate::{
    client::SnapshotService,
    config::{ConfigError, RunConfig},
    snapshot::ResourceKind,
};

/// Outcome of one resource in a run.
#[derive(Debug, Clone)]
pub struct ResourceReport {
    pub resource: String,
    pub kind: ResourceKind,
    /// `None` when the copy step failed.
    pub copy: Option<CopyOutcome>,
    /// `None` when the prune step failed or did not run.
    pub prune: Option<PruneReport>,
    pub error: Option<ReplicationError>,
}

impl ResourceReport {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Results from a single run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Correlates the log events of one run.
    pub run_id: Uuid,
    pub dry_run: bool,
    /// Resources in the order they were processed.
    pub resources: Vec<ResourceReport>,
    /// Resources never started because an earlier one failed and the run
    /// does not continue on error.
    pub skipped: Vec<(String, ResourceKind)>,
}

impl RunReport {
    /// Number of copies issued (or planned, in a dry run).
    pub fn copies(&self) -> usize {
        self.resources
            .iter()
            .filter(|r| {
                matches!(
                    r.copy,
                    Some(CopyOutcome::Copied { .. } | CopyOutcome::Planned { .. })
                )
            })
            .count()
    }

    /// Number of snapshots deleted across all resources, including those
    /// deleted by a prune pass that later failed.
    pub fn deletions(&self) -> usize {
        self.resources
            .iter()
            .map(|r| match (&r.prune, &r.error) {
                (Some(prune), _) => prune.deleted.len(),
                (None, Some(ReplicationError::Deletion { deleted, .. })) => deleted.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResourceReport> {
        self.resources.iter().filter(|r| r.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Turn any failed resource into an error.
    pub fn into_result(self) -> Result<RunReport, RunError> {
        if self.has_failures() {
            Err(RunError { report: self })
        } else {
            Ok(self)
        }
    }
}

/// A run in which at least one resource failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", describe_run_failure(.report))]
pub struct RunError {
    pub report: RunReport,
}

fn describe_run_failure(report: &RunReport) -> String {
    let failed: Vec<String> = report
        .failures()
        .map(|r| format!("{} '{}'", r.kind, r.resource))
        .collect();
    let mut message = format!(
        "{} of {} resource(s) failed: {}",
        failed.len(),
        report.resources.len() + report.skipped.len(),
        failed.join(", ")
    );
    if !report.skipped.is_empty() {
        message.push_str(&format!(" ({} not attempted)", report.skipped.len()));
    }
    message
}

/// Replicate every resource of `config` from `source` to `target`.
///
/// `source` must be bound to the source region and `target` to the target
/// region. Fails before any remote call when `config` breaks a
/// [`RunConfig::check`] invariant. Never returns early on a resource failure;
/// inspect the report or call [`RunReport::into_result`].
#[instrument(
    skip_all,
    fields(
        run_id = tracing::field::Empty,
        source_region = %config.source_region,
        target_region = %config.target_region,
        dry_run = config.dry_run,
    )
)]
pub async fn run(
    config: &RunConfig,
    source: &dyn SnapshotService,
    target: &dyn SnapshotService,
) -> Result<RunReport, ConfigError> {
    config.check()?;

    let run_id = Uuid::new_v4();
    tracing::Span::current().record("run_id", tracing::field::display(run_id));

    if source.region() != config.source_region || target.region() != config.target_region {
        tracing::warn!(
            source_client = source.region(),
            target_client = target.region(),
            "Client regions do not match the run configuration"
        );
    }

    let copier = CopyOrchestrator::new(source, target).with_dry_run(config.dry_run);
    let pruner = RetentionPruner::new(target)
        .with_policy(config.delete_failure_policy)
        .with_only_managed_copies(config.only_managed_copies)
        .with_dry_run(config.dry_run);

    let tasks: Vec<CopyTask> = config
        .instances
        .iter()
        .map(|name| CopyTask::instance(config, name))
        .chain(
            config
                .clusters
                .iter()
                .map(|name| CopyTask::cluster(config, name)),
        )
        .collect();

    tracing::info!(
        instances = config.instances.len(),
        clusters = config.clusters.len(),
        keep = config.retention_count,
        "Starting snapshot replication"
    );

    let mut report = RunReport {
        run_id,
        dry_run: config.dry_run,
        resources: Vec::with_capacity(tasks.len()),
        skipped: Vec::new(),
    };

    let mut tasks = tasks.into_iter();
    for task in tasks.by_ref() {
        let resource = replicate(&copier, &pruner, &task).await;
        let failed = resource.is_failure();
        report.resources.push(resource);

        if failed && !config.continue_on_error {
            tracing::warn!("Stopping run after failure");
            break;
        }
    }
    report.skipped = tasks.map(|t| (t.resource_name, t.resource_kind)).collect();

    if report.has_failures() {
        tracing::error!(
            failed = report.failures().count(),
            skipped = report.skipped.len(),
            copies = report.copies(),
            deletions = report.deletions(),
            "Snapshot replication finished with failures"
        );
    } else {
        tracing::info!(
            copies = report.copies(),
            deletions = report.deletions(),
            "Snapshot replication complete"
        );
    }

    Ok(report)
}

async fn replicate(
    copier: &CopyOrchestrator<'_>,
    pruner: &RetentionPruner<'_>,
    task: &CopyTask,
) -> ResourceReport {
    let mut resource = ResourceReport {
        resource: task.resource_name.clone(),
        kind: task.resource_kind,
        copy: None,
        prune: None,
        error: None,
    };

    match copier.copy(task).await {
        Ok(outcome) => resource.copy = Some(outcome),
        Err(error) => {
            tracing::error!(
                resource = %task.resource_name,
                kind = %task.resource_kind,
                error = %error,
                "Copy failed"
            );
            resource.error = Some(error);
            return resource;
        }
    }

    match pruner
        .prune(&task.resource_name, task.resource_kind, task.retention_count)
        .await
    {
        Ok(prune) => resource.prune = Some(prune),
        Err(error) => {
            tracing::error!(
                resource = %task.resource_name,
                kind = %task.resource_kind,
                error = %error,
                "Prune failed"
            );
            resource.error = Some(error);
        }
    }

    resource
}

#[cfg(feature = "aws-sdk")]
mod rds {
    use super::{RunReport, run};
    use crate::{
        client::{RdsSnapshotService, RdsSnapshotServiceConfig},
        config::{ConfigError, CopierConfig, RunConfig},
    };

    /// Run against RDS, with one client per region built from `copier`.
    pub async fn run_with_rds(
        copier: &CopierConfig,
        config: &RunConfig,
    ) -> Result<RunReport, ConfigError> {
        config.check()?;

        let source = RdsSnapshotService::new(
            RdsSnapshotServiceConfig::new(&config.source_region)
                .with_endpoint_url(copier.source.endpoint_url.clone())
                .with_credentials(copier.credentials.clone())
                .with_presign_copies(false),
        )
        .await;
        let target = RdsSnapshotService::new(
            RdsSnapshotServiceConfig::new(&config.target_region)
                .with_endpoint_url(copier.target.endpoint_url.clone())
                .with_credentials(copier.credentials.clone())
                .with_presign_copies(copier.target.presign_copies),
        )
        .await;

        run(config, &source, &target).await
    }
}

#[cfg(feature = "aws-sdk")]
pub use rds::run_with_rds;
