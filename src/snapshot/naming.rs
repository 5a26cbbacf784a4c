//! Source ARNs and target identifiers.
//!
//! Both formats are consumed by the database service and by operators looking
//! for copies, so they must stay bit-exact:
//!
//! - `arn:aws:rds:<region>:<account>:snapshot:<id>` for instance snapshots
//! - `arn:aws:rds:<region>:<account>:cluster-snapshot:<id>` for cluster snapshots
//! - `copy-of-<id with every "rds:" removed>` for the copy in the target region
//!
//! Stripping `rds:` assumes automated identifiers only carry it as the service
//! prefix. The derived identifier is checked so a violation of that assumption
//! fails the copy instead of silently mis-naming it.

use thiserror::Error;

use super::{ResourceKind, SnapshotRef};

/// Prefix of every copy made by this tool.
pub const COPY_PREFIX: &str = "copy-of-";

const SERVICE_PREFIX: &str = "rds:";
const MAX_IDENTIFIER_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("source identifier '{source_identifier}' is empty once 'rds:' is removed")]
    Empty { source_identifier: String },

    #[error("target identifier '{target}' derived from '{source_identifier}' is not a valid snapshot identifier: {reason}")]
    Invalid {
        source_identifier: String,
        target: String,
        reason: &'static str,
    },

    #[error("source snapshots '{first}' and '{second}' both map to target identifier '{target}'")]
    Collision {
        first: String,
        second: String,
        target: String,
    },
}

/// Fully-qualified ARN of a snapshot in the source region.
pub fn source_arn(region: &str, account: &str, kind: ResourceKind, identifier: &str) -> String {
    format!(
        "arn:aws:rds:{}:{}:{}:{}",
        region,
        account,
        kind.arn_qualifier(),
        identifier
    )
}

/// Derive the target identifier for a copy of `source_identifier`.
pub fn target_identifier(source_identifier: &str) -> Result<String, NamingError> {
    let stripped = source_identifier.replace(SERVICE_PREFIX, "");
    if stripped.is_empty() {
        return Err(NamingError::Empty {
            source_identifier: source_identifier.to_string(),
        });
    }

    let target = format!("{COPY_PREFIX}{stripped}");
    if let Some(reason) = invalid_reason(&target) {
        return Err(NamingError::Invalid {
            source_identifier: source_identifier.to_string(),
            target,
            reason,
        });
    }

    Ok(target)
}

/// Derive the target identifier for `selected` and make sure no other source
/// snapshot of the same resource would be copied to the same name.
pub fn validate_target(
    selected: &SnapshotRef,
    siblings: &[SnapshotRef],
) -> Result<String, NamingError> {
    let target = target_identifier(&selected.identifier)?;

    for other in siblings {
        if other.identifier == selected.identifier {
            continue;
        }
        // Siblings with an underivable name are not our concern here.
        if let Ok(other_target) = target_identifier(&other.identifier)
            && other_target == target
        {
            return Err(NamingError::Collision {
                first: selected.identifier.clone(),
                second: other.identifier.clone(),
                target,
            });
        }
    }

    Ok(target)
}

/// Snapshot identifier rules: ASCII letters, digits and hyphens, starting with
/// a letter, no trailing or doubled hyphen, at most 255 characters.
fn invalid_reason(identifier: &str) -> Option<&'static str> {
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Some("longer than 255 characters");
    }
    if !identifier
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
    {
        return Some("must start with a letter");
    }
    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Some("only letters, digits and hyphens are allowed");
    }
    if identifier.ends_with('-') {
        return Some("must not end with a hyphen");
    }
    if identifier.contains("--") {
        return Some("must not contain two consecutive hyphens");
    }
    None
}
