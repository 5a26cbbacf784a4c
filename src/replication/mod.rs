//! Cross-region snapshot replication.
//!
//! For each configured resource: find the latest automated snapshot in the
//! source region, copy it into the target region, then prune the target
//! region's manual snapshots down to the retention count.

mod coordinator;
mod copy;
mod error;
mod prune;

#[cfg(feature = "aws-sdk")]
pub use coordinator::run_with_rds;
pub use coordinator::{ResourceReport, RunError, RunReport, run};
pub use copy::{CopyOrchestrator, CopyOutcome, CopyTask};
pub use error::{DeleteFailure, ReplicationError};
pub use prune::{PruneReport, RetentionPruner};
