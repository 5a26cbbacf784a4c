//! Retention configuration for copies in the target region.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! keep = 10
//! on_delete_failure = "halt"
//! only_managed_copies = false
//! ```

use serde::{Deserialize, Serialize};

/// How many manual snapshots to keep per resource in the target region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Number of newest manual snapshots to keep per resource.
    /// 0 deletes every manual snapshot of the resource.
    /// Default: 10
    #[serde(default = "default_keep")]
    pub keep: u32,

    /// What to do when one deletion fails.
    #[serde(default)]
    pub on_delete_failure: DeleteFailurePolicy,

    /// Only count and delete snapshots named `copy-of-...`, leaving manual
    /// snapshots created by other means untouched.
    /// Default: false
    #[serde(default)]
    pub only_managed_copies: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep: default_keep(),
            on_delete_failure: DeleteFailurePolicy::default(),
            only_managed_copies: false,
        }
    }
}

fn default_keep() -> u32 {
    10
}

/// Behaviour of a prune pass after a failed deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeleteFailurePolicy {
    /// Stop at the first failure; later candidates are not attempted.
    #[default]
    Halt,
    /// Attempt every candidate and report all failures together.
    Continue,
}
