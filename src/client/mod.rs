//! Snapshot service clients.
//!
//! The replication workflow only talks to the database service through the
//! [`SnapshotService`] trait. Backends:
//!
//! - **RDS**: the AWS RDS API via `aws-sdk-rds` (requires the `aws-sdk` feature)
//! - **Memory**: an in-process service that records every call (for testing)
//!
//! A client is bound to exactly one region; a run builds one for the source
//! region and one for the target region.

mod memory;
#[cfg(feature = "aws-sdk")]
mod rds;

use async_trait::async_trait;
pub use memory::{MemorySnapshotService, ServiceCall};
#[cfg(feature = "aws-sdk")]
pub use rds::{RdsSnapshotService, RdsSnapshotServiceConfig};
use thiserror::Error;

use crate::snapshot::{ResourceKind, SnapshotClass, SnapshotRef};

/// Classification of a rejected service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// The target identifier is already taken (e.g. an overlapping run).
    AlreadyExists,
    /// The snapshot does not exist (e.g. deleted by an overlapping run).
    NotFound,
    /// The snapshot is not in a state that allows the operation.
    InvalidState,
    /// The caller lacks permission, or the key cannot be used.
    AccessDenied,
    /// Any other rejection reported by the service.
    Rejected,
    /// The request never got a service response (network, timeout).
    Transport,
    /// No credentials could be resolved to sign the request.
    Credentials,
}

/// A rejected call to the snapshot service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .code.as_deref().unwrap_or("error"))]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    /// Service error code, when the service returned one.
    pub code: Option<String>,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Classify a service error code.
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let kind = match code.as_str() {
            "DBSnapshotAlreadyExists"
            | "DBSnapshotAlreadyExistsFault"
            | "DBClusterSnapshotAlreadyExistsFault" => ServiceErrorKind::AlreadyExists,
            "DBSnapshotNotFound"
            | "DBSnapshotNotFoundFault"
            | "DBClusterSnapshotNotFoundFault"
            | "DBInstanceNotFound"
            | "DBClusterNotFoundFault" => ServiceErrorKind::NotFound,
            "InvalidDBSnapshotState"
            | "InvalidDBSnapshotStateFault"
            | "InvalidDBClusterSnapshotStateFault" => ServiceErrorKind::InvalidState,
            "AccessDenied"
            | "AccessDeniedException"
            | "UnauthorizedOperation"
            | "KMSKeyNotAccessibleFault" => ServiceErrorKind::AccessDenied,
            _ => ServiceErrorKind::Rejected,
        };
        Self {
            kind,
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == ServiceErrorKind::AlreadyExists
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ServiceErrorKind::NotFound
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Parameters of a cross-region copy, issued against the target-region client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub resource_kind: ResourceKind,
    /// Fully-qualified ARN of the snapshot in the source region.
    pub source_arn: String,
    pub target_identifier: String,
    /// Target-region key to re-encrypt under.
    pub kms_key_id: Option<String>,
    pub copy_tags: bool,
    /// Region the source snapshot lives in.
    pub source_region: String,
}

/// Remote snapshot operations, bound to one region.
#[async_trait]
pub trait SnapshotService: Send + Sync {
    /// Region this client talks to.
    fn region(&self) -> &str;

    /// List every snapshot of `class` taken from `resource_name`.
    async fn list_snapshots(
        &self,
        kind: ResourceKind,
        resource_name: &str,
        class: SnapshotClass,
    ) -> ServiceResult<Vec<SnapshotRef>>;

    /// Start a copy. Returns the identifier the service assigned to the copy.
    async fn copy_snapshot(&self, request: &CopyRequest) -> ServiceResult<String>;

    /// Delete a snapshot by identifier.
    async fn delete_snapshot(&self, kind: ResourceKind, identifier: &str) -> ServiceResult<()>;

    /// Get the backend type name (for logging/debugging).
    fn backend_name(&self) -> &'static str;
}
