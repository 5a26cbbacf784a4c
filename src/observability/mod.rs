//! Observability module providing structured logging.
//!
//! Logs are written to stdout in a configurable format (pretty, compact,
//! JSON). JSON is the format to pick when the output is collected by a log
//! aggregator such as CloudWatch Logs.

mod tracing_init;

pub use tracing_init::*;
