//! End-to-end replication tests using in-memory snapshot services.
//!
//! Each test seeds a source and a target region, runs the coordinator once and
//! asserts on the calls each region received.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rstest::rstest;

use crate::{
    client::{MemorySnapshotService, ServiceCall, ServiceError},
    config::{CopierConfig, DeleteFailurePolicy, RunConfig, RunOverrides},
    event::InvocationEvent,
    replication::{self, CopyOutcome, ReplicationError},
    snapshot::{ResourceKind, SnapshotClass, SnapshotRef},
};

const SOURCE_REGION: &str = "eu-west-1";
const TARGET_REGION: &str = "eu-central-1";
const ACCOUNT: &str = "123456789012";
const KMS_KEY: &str = "arn:aws:kms:eu-central-1:123456789012:key/abc123";

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    source: MemorySnapshotService,
    target: MemorySnapshotService,
}

impl Harness {
    fn new() -> Self {
        Self {
            source: MemorySnapshotService::new(SOURCE_REGION),
            target: MemorySnapshotService::new(TARGET_REGION),
        }
    }

    fn automated(mut self, kind: ResourceKind, owner: &str, ids: &[&str]) -> Self {
        self.source = self.source.with_snapshots(
            ids.iter()
                .map(|id| SnapshotRef::new(*id, owner, kind, SnapshotClass::Automated)),
        );
        self
    }

    /// `count` manual copies of `owner` in the target region, one per day
    /// ending the day before `newest`.
    fn copies(mut self, kind: ResourceKind, owner: &str, count: i64) -> Self {
        self.target = self.target.with_snapshots((0..count).map(|i| {
            let at = newest() - Duration::days(i + 1);
            SnapshotRef::new(
                format!("copy-of-{owner}-{}", at.format("%Y-%m-%d")),
                owner,
                kind,
                SnapshotClass::Manual,
            )
            .with_created_at(at)
        }));
        self
    }

    async fn run(&self, config: &RunConfig) -> replication::RunReport {
        replication::run(config, &self.source, &self.target)
            .await
            .expect("run config is valid")
    }

    fn copied(&self) -> Vec<String> {
        self.target
            .copy_requests()
            .into_iter()
            .map(|r| r.target_identifier)
            .collect()
    }
}

fn newest() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap()
}

fn run_config() -> RunConfig {
    RunConfig::new(SOURCE_REGION, TARGET_REGION, ACCOUNT)
        .unwrap()
        .with_encryption_key(KMS_KEY)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_copies_latest_and_prunes_two_oldest() {
    let harness = Harness::new()
        .automated(
            ResourceKind::Instance,
            "db-a",
            &["rds:db-a-2024-05-31", "rds:db-a-2024-06-01", "rds:db-a-2024-05-30"],
        )
        .copies(ResourceKind::Instance, "db-a", 12);

    let report = harness.run(&run_config().with_instances(["db-a"])).await;

    assert_eq!(harness.copied(), vec!["copy-of-db-a-2024-06-01"]);
    let request = &harness.target.copy_requests()[0];
    assert_eq!(
        request.source_arn,
        "arn:aws:rds:eu-west-1:123456789012:snapshot:rds:db-a-2024-06-01"
    );
    assert_eq!(request.kms_key_id, None);

    // 12 copies dated 05-20 ..= 05-31; the two oldest go, newest first
    assert_eq!(
        harness.target.deleted_identifiers(),
        vec!["copy-of-db-a-2024-05-21", "copy-of-db-a-2024-05-20"]
    );
    assert_eq!(report.deletions(), 2);
    assert!(!harness.source.has_mutations());
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn test_resource_without_automated_snapshots_is_noop() {
    let harness = Harness::new();

    let report = harness.run(&run_config().with_instances(["db-b"])).await;

    assert!(!harness.target.has_mutations());
    assert_eq!(
        report.resources[0].copy,
        Some(CopyOutcome::NothingToCopy)
    );
    assert!(report.into_result().is_ok());
}

#[rstest]
#[case::fewer_than_keep(3, 10, 0)]
#[case::exactly_keep(10, 10, 0)]
#[case::keep_two(4, 2, 2)]
#[case::keep_none(3, 0, 3)]
#[tokio::test]
async fn test_retention_bound(#[case] existing: i64, #[case] keep: u32, #[case] deletes: usize) {
    let harness = Harness::new()
        .automated(ResourceKind::Instance, "db-a", &["rds:db-a-2024-06-01"])
        .copies(ResourceKind::Instance, "db-a", existing);

    let report = harness
        .run(
            &run_config()
                .with_instances(["db-a"])
                .with_retention_count(keep),
        )
        .await;

    assert_eq!(harness.target.deleted_identifiers().len(), deletes);
    assert_eq!(report.deletions(), deletes);
}

#[tokio::test]
async fn test_cluster_copy_and_prune_use_cluster_calls() {
    let harness = Harness::new()
        .automated(
            ResourceKind::Cluster,
            "aurora-a",
            &["rds:aurora-a-2024-06-01-04-10"],
        )
        .copies(ResourceKind::Cluster, "aurora-a", 3);

    harness
        .run(
            &run_config()
                .with_clusters(["aurora-a"])
                .with_retention_count(2),
        )
        .await;

    let request = &harness.target.copy_requests()[0];
    assert_eq!(request.resource_kind, ResourceKind::Cluster);
    assert_eq!(request.kms_key_id.as_deref(), Some(KMS_KEY));
    assert!(request.copy_tags);
    assert!(harness.target.calls().contains(&ServiceCall::Delete {
        kind: ResourceKind::Cluster,
        identifier: "copy-of-aurora-a-2024-05-29".into(),
    }));
}

#[tokio::test]
async fn test_failure_does_not_undo_earlier_resources() {
    let harness = Harness::new()
        .automated(ResourceKind::Instance, "db-a", &["rds:db-a-2024-06-01"])
        .automated(ResourceKind::Cluster, "aurora-a", &["rds:aurora-a-2024-06-01"])
        .copies(ResourceKind::Instance, "db-a", 3);
    let harness = Harness {
        target: harness.target.fail_copy(
            "copy-of-aurora-a-2024-06-01",
            ServiceError::from_code("KMSKeyNotAccessibleFault", "key disabled"),
        ),
        ..harness
    };

    let report = harness
        .run(
            &run_config()
                .with_instances(["db-a"])
                .with_clusters(["aurora-a"])
                .with_retention_count(1),
        )
        .await;

    // db-a's copy and deletions stand
    assert_eq!(
        harness.copied(),
        vec!["copy-of-db-a-2024-06-01", "copy-of-aurora-a-2024-06-01"]
    );
    assert_eq!(harness.target.deleted_identifiers().len(), 2);

    let err = report.into_result().unwrap_err();
    let failed = &err.report.resources[1];
    assert_eq!(failed.resource, "aurora-a");
    assert!(matches!(
        failed.error,
        Some(ReplicationError::CopyIssue { .. })
    ));
}

#[tokio::test]
async fn test_overlapping_run_surfaces_conflict() {
    // A concurrent run already created today's copy
    let harness = Harness::new()
        .automated(ResourceKind::Instance, "db-a", &["rds:db-a-2024-06-01"])
        .automated(ResourceKind::Instance, "db-b", &["rds:db-b-2024-06-01"]);
    let harness = Harness {
        target: harness.target.with_snapshot(SnapshotRef::new(
            "copy-of-db-a-2024-06-01",
            "db-a",
            ResourceKind::Instance,
            SnapshotClass::Manual,
        )),
        ..harness
    };

    let report = harness
        .run(&run_config().with_instances(["db-a", "db-b"]))
        .await;

    let db_a = &report.resources[0];
    assert!(db_a.error.as_ref().is_some_and(|e| e.is_copy_conflict()));
    assert!(report.resources[1].error.is_none());
    assert_eq!(
        harness.copied(),
        vec!["copy-of-db-a-2024-06-01", "copy-of-db-b-2024-06-01"]
    );
}

#[tokio::test]
async fn test_continue_policy_reports_every_failed_delete() {
    let harness = Harness::new().copies(ResourceKind::Instance, "db-a", 4);
    let harness = Harness {
        target: harness
            .target
            .fail_delete(
                "copy-of-db-a-2024-05-29",
                ServiceError::from_code("InvalidDBSnapshotState", "copying"),
            )
            .fail_delete(
                "copy-of-db-a-2024-05-28",
                ServiceError::from_code("InvalidDBSnapshotState", "copying"),
            ),
        ..harness
    };

    let report = harness
        .run(
            &run_config()
                .with_instances(["db-a"])
                .with_retention_count(1)
                .with_delete_failure_policy(DeleteFailurePolicy::Continue),
        )
        .await;

    match &report.resources[0].error {
        Some(ReplicationError::Deletion {
            failures, deleted, ..
        }) => {
            assert_eq!(failures.len(), 2);
            assert_eq!(deleted, &vec!["copy-of-db-a-2024-05-30".to_string()]);
        }
        other => panic!("expected deletion error, got {other:?}"),
    }
}

// =============================================================================
// Configuration to run
// =============================================================================

#[tokio::test]
async fn test_config_and_payload_drive_a_dry_run() {
    let config = CopierConfig::from_str(
        r#"
        [source]
        region = "eu-west-1"

        [target]
        kms_key_id = "arn:aws:kms:eu-central-1:123456789012:key/abc123"

        [resources]
        instances = ["db-a"]
        clusters = ["aurora-a"]

        [retention]
        keep = 1
    "#,
    )
    .unwrap();
    let event = InvocationEvent::from_json(
        r#"{"detail-type": "Scheduled Event", "region": "eu-central-1", "account": "123456789012"}"#,
    )
    .unwrap();
    let overrides = RunOverrides {
        dry_run: true,
        ..Default::default()
    };

    let run_config = config.resolve(&overrides, &event, None).await.unwrap();
    assert_eq!(run_config.target_region, TARGET_REGION);

    let harness = Harness::new()
        .automated(ResourceKind::Instance, "db-a", &["rds:db-a-2024-06-01"])
        .automated(ResourceKind::Cluster, "aurora-a", &["rds:aurora-a-2024-06-01"])
        .copies(ResourceKind::Instance, "db-a", 3);

    let report = harness.run(&run_config).await;

    assert!(report.dry_run);
    assert!(!harness.target.has_mutations());
    assert_eq!(report.copies(), 2);
    assert_eq!(
        report.resources[0]
            .prune
            .as_ref()
            .map(|p| p.planned.len()),
        Some(2)
    );
    assert!(report.into_result().is_ok());
}
