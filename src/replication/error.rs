use thiserror::Error;

use crate::{
    client::ServiceError,
    snapshot::{NamingError, ResourceKind, SnapshotClass},
};

/// A delete call the service rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub identifier: String,
    pub error: ServiceError,
}

/// Failure of one resource's copy or prune step.
#[derive(Debug, Clone, Error)]
pub enum ReplicationError {
    #[error("Failed to list {class} snapshots of {kind} '{resource}': {source}")]
    Listing {
        resource: String,
        kind: ResourceKind,
        class: SnapshotClass,
        source: ServiceError,
    },

    #[error("Cannot name the copy for {kind} '{resource}': {source}")]
    Naming {
        resource: String,
        kind: ResourceKind,
        source: NamingError,
    },

    #[error("Failed to copy {source_arn} to {target_identifier} for {kind} '{resource}': {source}")]
    CopyIssue {
        resource: String,
        kind: ResourceKind,
        source_arn: String,
        target_identifier: String,
        source: ServiceError,
    },

    #[error(
        "Failed to delete {} snapshot(s) of {kind} '{resource}' ({} deleted before): {}",
        .failures.len(),
        .deleted.len(),
        describe_failures(.failures)
    )]
    Deletion {
        resource: String,
        kind: ResourceKind,
        failures: Vec<DeleteFailure>,
        /// Identifiers deleted in the same pass before or despite the failures.
        deleted: Vec<String>,
    },
}

impl ReplicationError {
    pub fn resource(&self) -> &str {
        match self {
            Self::Listing { resource, .. }
            | Self::Naming { resource, .. }
            | Self::CopyIssue { resource, .. }
            | Self::Deletion { resource, .. } => resource,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Listing { kind, .. }
            | Self::Naming { kind, .. }
            | Self::CopyIssue { kind, .. }
            | Self::Deletion { kind, .. } => *kind,
        }
    }

    /// Whether the copy was rejected because its target name is taken,
    /// which usually means an overlapping run got there first.
    pub fn is_copy_conflict(&self) -> bool {
        matches!(self, Self::CopyIssue { source, .. } if source.is_already_exists())
    }
}

fn describe_failures(failures: &[DeleteFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.identifier, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}
