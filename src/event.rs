//! Invocation payload handed to a run by its trigger.
//!
//! Schedulers deliver a JSON object; only `region` and `account` are read and
//! every other key is ignored. Both fields are optional and only used when the
//! configuration and command line leave them unset.

use std::{io::Read, path::Path};

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InvocationEvent {
    /// Region the trigger fired in; used as the target region.
    #[serde(default)]
    pub region: Option<String>,

    /// Account the trigger belongs to; used as the snapshot owner account.
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Failed to read event payload from {source_name}: {error}")]
    Io {
        source_name: String,
        error: std::io::Error,
    },

    #[error("Invalid event payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl InvocationEvent {
    pub fn from_json(payload: &str) -> Result<Self, EventError> {
        if payload.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(payload)?)
    }

    /// Read a payload from a file, or from stdin when `path` is `-`.
    pub fn load(path: &Path) -> Result<Self, EventError> {
        let mut payload = String::new();
        if path == Path::new("-") {
            std::io::stdin()
                .read_to_string(&mut payload)
                .map_err(|error| EventError::Io {
                    source_name: "stdin".to_string(),
                    error,
                })?;
        } else {
            payload = std::fs::read_to_string(path).map_err(|error| EventError::Io {
                source_name: path.display().to_string(),
                error,
            })?;
        }
        Self::from_json(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_event_extra_keys_ignored() {
        let event = InvocationEvent::from_json(
            r#"{
                "version": "0",
                "id": "89d1a02d-5ec7-412e-82f5-13505f849b41",
                "detail-type": "Scheduled Event",
                "source": "aws.events",
                "account": "123456789012",
                "time": "2026-01-10T02:00:00Z",
                "region": "eu-central-1",
                "resources": ["arn:aws:events:eu-central-1:123456789012:rule/nightly"],
                "detail": {}
            }"#,
        )
        .unwrap();

        assert_eq!(event.region.as_deref(), Some("eu-central-1"));
        assert_eq!(event.account.as_deref(), Some("123456789012"));
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(InvocationEvent::from_json("").unwrap(), InvocationEvent::default());
        assert_eq!(InvocationEvent::from_json("{}").unwrap(), InvocationEvent::default());
    }

    #[test]
    fn test_invalid_payload() {
        assert!(matches!(
            InvocationEvent::from_json("[1, 2]"),
            Err(EventError::Json(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"region": "us-east-1"}"#).unwrap();

        let event = InvocationEvent::load(&path).unwrap();
        assert_eq!(event.region.as_deref(), Some("us-east-1"));
        assert_eq!(event.account, None);

        assert!(matches!(
            InvocationEvent::load(&dir.path().join("missing.json")),
            Err(EventError::Io { .. })
        ));
    }
}
