//! In-memory snapshot service (for testing only).
//!
//! Holds a seeded list of snapshots for one region and records every call in
//! order. Copies are validated and recorded but not added to the listing, so
//! a test controls exactly what the next listing returns.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CopyRequest, ServiceError, ServiceErrorKind, ServiceResult, SnapshotService};
use crate::snapshot::{ResourceKind, SnapshotClass, SnapshotRef};

/// A call made against a [`MemorySnapshotService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    List {
        kind: ResourceKind,
        resource_name: String,
        class: SnapshotClass,
    },
    Copy(CopyRequest),
    Delete {
        kind: ResourceKind,
        identifier: String,
    },
}

#[derive(Default)]
struct State {
    snapshots: Vec<SnapshotRef>,
    calls: Vec<ServiceCall>,
    list_failures: HashMap<String, ServiceError>,
    copy_failures: HashMap<String, ServiceError>,
    delete_failures: HashMap<String, ServiceError>,
}

pub struct MemorySnapshotService {
    region: String,
    state: Mutex<State>,
}

impl MemorySnapshotService {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Seed a snapshot into the listing.
    pub fn with_snapshot(self, snapshot: SnapshotRef) -> Self {
        self.state.lock().snapshots.push(snapshot);
        self
    }

    pub fn with_snapshots(self, snapshots: impl IntoIterator<Item = SnapshotRef>) -> Self {
        self.state.lock().snapshots.extend(snapshots);
        self
    }

    /// Make every listing for `resource_name` fail with `error`.
    pub fn fail_list(self, resource_name: impl Into<String>, error: ServiceError) -> Self {
        self.state
            .lock()
            .list_failures
            .insert(resource_name.into(), error);
        self
    }

    /// Make the copy to `target_identifier` fail with `error`.
    pub fn fail_copy(self, target_identifier: impl Into<String>, error: ServiceError) -> Self {
        self.state
            .lock()
            .copy_failures
            .insert(target_identifier.into(), error);
        self
    }

    /// Make the delete of `identifier` fail with `error`.
    pub fn fail_delete(self, identifier: impl Into<String>, error: ServiceError) -> Self {
        self.state
            .lock()
            .delete_failures
            .insert(identifier.into(), error);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().calls.clone()
    }

    pub fn copy_requests(&self) -> Vec<CopyRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ServiceCall::Copy(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Identifiers passed to delete calls, in order, including rejected ones.
    pub fn deleted_identifiers(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ServiceCall::Delete { identifier, .. } => Some(identifier),
                _ => None,
            })
            .collect()
    }

    /// Whether any copy or delete call was made.
    pub fn has_mutations(&self) -> bool {
        self.calls()
            .iter()
            .any(|call| !matches!(call, ServiceCall::List { .. }))
    }

    /// Snapshots currently held.
    pub fn snapshots(&self) -> Vec<SnapshotRef> {
        self.state.lock().snapshots.clone()
    }
}

#[async_trait]
impl SnapshotService for MemorySnapshotService {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_snapshots(
        &self,
        kind: ResourceKind,
        resource_name: &str,
        class: SnapshotClass,
    ) -> ServiceResult<Vec<SnapshotRef>> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::List {
            kind,
            resource_name: resource_name.to_string(),
            class,
        });

        if let Some(error) = state.list_failures.get(resource_name) {
            return Err(error.clone());
        }

        Ok(state
            .snapshots
            .iter()
            .filter(|s| {
                s.resource_kind == kind
                    && s.owner_resource_name == resource_name
                    && s.snapshot_class == class
            })
            .cloned()
            .collect())
    }

    async fn copy_snapshot(&self, request: &CopyRequest) -> ServiceResult<String> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Copy(request.clone()));

        if let Some(error) = state.copy_failures.get(&request.target_identifier) {
            return Err(error.clone());
        }

        let taken = state.snapshots.iter().any(|s| {
            s.resource_kind == request.resource_kind && s.identifier == request.target_identifier
        });
        if taken {
            return Err(ServiceError::from_code(
                match request.resource_kind {
                    ResourceKind::Instance => "DBSnapshotAlreadyExists",
                    ResourceKind::Cluster => "DBClusterSnapshotAlreadyExistsFault",
                },
                format!(
                    "Cannot create the snapshot because a snapshot with the identifier {} already exists.",
                    request.target_identifier
                ),
            ));
        }

        Ok(request.target_identifier.clone())
    }

    async fn delete_snapshot(&self, kind: ResourceKind, identifier: &str) -> ServiceResult<()> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Delete {
            kind,
            identifier: identifier.to_string(),
        });

        if let Some(error) = state.delete_failures.get(identifier) {
            return Err(error.clone());
        }

        let before = state.snapshots.len();
        state
            .snapshots
            .retain(|s| !(s.resource_kind == kind && s.identifier == identifier));
        if state.snapshots.len() == before {
            return Err(ServiceError {
                kind: ServiceErrorKind::NotFound,
                code: Some(
                    match kind {
                        ResourceKind::Instance => "DBSnapshotNotFound",
                        ResourceKind::Cluster => "DBClusterSnapshotNotFoundFault",
                    }
                    .to_string(),
                ),
                message: format!("Snapshot {identifier} not found."),
            });
        }

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
