//! Snapshot model shared by the client, selector and replication layers.
//!
//! Every value here is a transient observation of the database service's
//! current state. Nothing is persisted between runs.

mod naming;
mod selector;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use naming::{COPY_PREFIX, NamingError, source_arn, target_identifier, validate_target};
pub use selector::{SelectionPolicy, order_newest_first, select_latest};

/// Whether a snapshot belongs to a standalone instance or to a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instance,
    Cluster,
}

impl ResourceKind {
    /// ARN resource-type qualifier for snapshots of this kind.
    pub fn arn_qualifier(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "snapshot",
            ResourceKind::Cluster => "cluster-snapshot",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Cluster => "cluster",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who created a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotClass {
    /// Created by the service's backup schedule.
    Automated,
    /// Created explicitly, including every copy this tool makes.
    Manual,
}

impl SnapshotClass {
    /// Value of the service's `SnapshotType` filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotClass::Automated => "automated",
            SnapshotClass::Manual => "manual",
        }
    }

    /// Parse the service's `SnapshotType` value. Unknown types (`shared`,
    /// `public`, `awsbackup`) are not handled by this tool.
    pub fn from_service(value: &str) -> Option<Self> {
        match value {
            "automated" => Some(SnapshotClass::Automated),
            "manual" => Some(SnapshotClass::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for SnapshotClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One snapshot as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRef {
    /// Unique within region, account and resource kind.
    pub identifier: String,
    /// Instance or cluster the snapshot was taken from.
    pub owner_resource_name: String,
    pub resource_kind: ResourceKind,
    /// Absent while a snapshot is still being created.
    pub created_at: Option<DateTime<Utc>>,
    pub snapshot_class: SnapshotClass,
    /// Service-reported status (`available`, `creating`, ...), informational.
    #[serde(default)]
    pub status: Option<String>,
}

impl SnapshotRef {
    pub fn new(
        identifier: impl Into<String>,
        owner_resource_name: impl Into<String>,
        resource_kind: ResourceKind,
        snapshot_class: SnapshotClass,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            owner_resource_name: owner_resource_name.into(),
            resource_kind,
            created_at: None,
            snapshot_class,
            status: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Creation time used for ordering; a missing timestamp counts as `now`.
    pub fn effective_created_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.created_at.unwrap_or(now)
    }
}
