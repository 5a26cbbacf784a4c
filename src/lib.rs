//! Cross-region replication and retention of RDS snapshots.
//!
//! Each run copies the latest automated snapshot of every configured database
//! instance and cluster from a source region into a target region, then
//! deletes the oldest manual snapshots in the target region beyond a
//! retention count. Runs are stateless; everything is read fresh from the
//! service each time.

#[cfg(feature = "aws-sdk")]
pub mod aws;
pub mod client;
pub mod config;
pub mod event;
pub mod observability;
pub mod replication;
pub mod secrets;
pub mod snapshot;

#[cfg(test)]
mod tests;
