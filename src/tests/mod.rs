//! Consolidated test modules.
//!
//! End-to-end runs of the replication workflow against in-memory snapshot
//! services, from configuration and trigger payload to the recorded calls.

mod replication_e2e;
