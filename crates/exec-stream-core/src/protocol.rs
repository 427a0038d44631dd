//! Wire protocol of the execution stream.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Empty frame")]
    Empty,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Log line emitted by the execution engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Any other fields the engine attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Message from the server about one execution.
///
/// `execution_id` is carried for correlation only; it is not checked
/// against the execution the stream was opened for, and a missing or
/// `null` id does not reject the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionMessage {
    /// Log output.
    Log {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
        #[serde(default)]
        log: Option<LogEntry>,
    },
    /// Execution status change.
    Status {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    /// State change of a single workflow node.
    NodeUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
        #[serde(default)]
        node_state: Option<Value>,
    },
    /// Execution finished.
    Completion {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
        #[serde(default)]
        result: Option<Value>,
    },
    /// Execution-level error.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    /// Any discriminant this client does not know.
    #[serde(other)]
    Unknown,
}

impl ExecutionMessage {
    /// Parse a text frame.
    ///
    /// # Errors
    /// Returns error if the frame is empty or not a valid message.
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let frame = frame.trim();
        if frame.is_empty() {
            return Err(ProtocolError::Empty);
        }
        Ok(serde_json::from_str(frame)?)
    }

    /// Correlation id, if the variant carries one.
    #[must_use]
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Self::Log { execution_id, .. }
            | Self::Status { execution_id, .. }
            | Self::NodeUpdate { execution_id, .. }
            | Self::Completion { execution_id, .. }
            | Self::Error { execution_id, .. } => execution_id.as_deref(),
            Self::Unknown => None,
        }
    }

    /// Node id of a `node_update`: top-level `node_id` first, then
    /// `node_state.node_id`. Empty strings count as absent.
    #[must_use]
    pub fn resolved_node_id(&self) -> Option<&str> {
        let Self::NodeUpdate {
            node_id,
            node_state,
            ..
        } = self
        else {
            return None;
        };
        node_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                node_state
                    .as_ref()
                    .and_then(|state| state.get("node_id"))
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_log() {
        let msg = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"log","execution_id":"exec-1","log":{"level":"INFO","message":"Test log","step":3}}"#
        ));
        let ExecutionMessage::Log { execution_id, log } = msg else {
            panic!("Wrong message type");
        };
        assert_eq!(execution_id.as_deref(), Some("exec-1"));
        let log = log.unwrap();
        assert_eq!(log.level.as_deref(), Some("INFO"));
        assert_eq!(log.message.as_deref(), Some("Test log"));
        assert_eq!(log.extra.get("step"), Some(&json!(3)));
    }

    #[test]
    fn test_parse_status_with_data() {
        let msg = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"status","execution_id":"exec-1","status":"running","data":{"progress":50}}"#
        ));
        let ExecutionMessage::Status { status, data, .. } = msg else {
            panic!("Wrong message type");
        };
        assert_eq!(status.as_deref(), Some("running"));
        assert_eq!(data, Some(json!({"progress": 50})));
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let msg = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"heartbeat","execution_id":"exec-1"}"#
        ));
        assert_eq!(msg, ExecutionMessage::Unknown);
        assert_eq!(msg.execution_id(), None);
    }

    #[test]
    fn test_missing_execution_id_defaults() {
        let msg = assert_ok!(ExecutionMessage::parse(r#"{"type":"completion"}"#));
        assert_eq!(msg.execution_id(), None);
    }

    #[test]
    fn test_null_execution_id_keeps_frame() {
        let log = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"log","execution_id":null,"log":{"message":"hello"}}"#
        ));
        assert_eq!(log.execution_id(), None);
        let ExecutionMessage::Log { log: Some(entry), .. } = log else {
            panic!("Wrong message type");
        };
        assert_eq!(entry.message.as_deref(), Some("hello"));

        let status = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"status","execution_id":null,"status":"running"}"#
        ));
        assert!(matches!(status, ExecutionMessage::Status { status: Some(ref s), .. } if s == "running"));

        let done = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"completion","execution_id":null,"result":{"ok":true}}"#
        ));
        assert!(matches!(done, ExecutionMessage::Completion { result: Some(_), .. }));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(ExecutionMessage::parse("   "), Err(ProtocolError::Empty)));
        assert_err!(ExecutionMessage::parse("not json"));
        assert_err!(ExecutionMessage::parse(r#"{"execution_id":"exec-1"}"#));
        assert_err!(ExecutionMessage::parse("42"));
    }

    #[test]
    fn test_node_id_resolution() {
        let nested = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"node_update","execution_id":"e","node_state":{"node_id":"node-1"}}"#
        ));
        assert_eq!(nested.resolved_node_id(), Some("node-1"));

        let both = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"node_update","execution_id":"e","node_id":"top","node_state":{"node_id":"inner"}}"#
        ));
        assert_eq!(both.resolved_node_id(), Some("top"));

        let empty_top = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"node_update","execution_id":"e","node_id":"","node_state":{"node_id":"inner"}}"#
        ));
        assert_eq!(empty_top.resolved_node_id(), Some("inner"));

        let neither = assert_ok!(ExecutionMessage::parse(
            r#"{"type":"node_update","execution_id":"e","node_state":{"status":"running"}}"#
        ));
        assert_eq!(neither.resolved_node_id(), None);
    }

    #[test]
    fn test_message_serialization() {
        let msg = ExecutionMessage::Error {
            execution_id: Some("exec-1".to_string()),
            error: Some("boom".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));

        let parsed = assert_ok!(ExecutionMessage::parse(&json));
        assert_eq!(parsed, msg);
    }
}
