//! Protocol messages for syncledger.
//!
//! These are the messages a source or destination connector emits during a
//! sync, already decoded from the wire by the surrounding worker.

use serde::{Deserialize, Serialize};

use crate::{CheckpointHash, Scope, StreamKey};

/// All protocol messages the bookkeeping core understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// A data record
    Record(Record),
    /// A checkpoint (state message)
    Checkpoint(Checkpoint),
    /// A progress estimate
    Estimate(Estimate),
    /// An error trace
    ErrorTrace(ErrorTrace),
}

impl Message {
    /// Short name of the message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Record(_) => "record",
            Message::Checkpoint(_) => "checkpoint",
            Message::Estimate(_) => "estimate",
            Message::ErrorTrace(_) => "error_trace",
        }
    }
}

/// A single record emitted by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stream the record belongs to
    pub stream: StreamKey,
    /// Record payload
    pub data: serde_json::Value,
    /// Unix timestamp (milliseconds) at which the connector emitted the record
    pub emitted_at: u64,
}

/// A checkpoint: an opaque, resumable marker of sync progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Whether this checkpoints the whole sync or a single stream
    pub scope: Scope,
    /// Opaque checkpoint payload
    pub data: serde_json::Value,
}

impl Checkpoint {
    /// Create a sync-wide checkpoint.
    pub fn global(data: serde_json::Value) -> Self {
        Self {
            scope: Scope::Global,
            data,
        }
    }

    /// Create a checkpoint for a single stream.
    pub fn stream(stream: StreamKey, data: serde_json::Value) -> Self {
        Self {
            scope: Scope::Stream(stream),
            data,
        }
    }

    /// Content hash of the payload.
    pub fn hash(&self) -> CheckpointHash {
        CheckpointHash::of(&self.data)
    }
}

/// A connector's prediction of how much data a sync or stream will move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    /// Whole sync or a single stream
    pub scope: Scope,
    /// Estimated number of records
    pub row_estimate: u64,
    /// Estimated number of bytes
    pub byte_estimate: u64,
}

/// Failure classification carried by an error trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceFailureType {
    /// The connector failed on its own
    SystemError,
    /// The connector was misconfigured
    ConfigError,
}

/// An error reported by a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTrace {
    /// Unix timestamp (milliseconds) at which the error was emitted
    pub emitted_at: u64,
    /// User-facing error message
    pub message: String,
    /// Internal error message, if any
    pub internal_message: Option<String>,
    /// Stack trace, if any
    pub stack_trace: Option<String>,
    /// Failure classification, if the connector provided one
    pub failure_type: Option<TraceFailureType>,
}

impl ErrorTrace {
    /// Create an error trace with only a message and timestamp.
    pub fn new(emitted_at: u64, message: impl Into<String>) -> Self {
        Self {
            emitted_at,
            message: message.into(),
            internal_message: None,
            stack_trace: None,
            failure_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_json_is_internally_tagged() {
        let msg = Message::Record(Record {
            stream: StreamKey::new("users"),
            data: json!({"id": 1}),
            emitted_at: 1000,
        });

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "Record");
        assert_eq!(value["stream"]["name"], "users");
    }

    #[test]
    fn checkpoint_constructors_set_scope() {
        let global = Checkpoint::global(json!({"lsn": 10}));
        assert!(global.scope.is_global());

        let stream = Checkpoint::stream(StreamKey::new("orders"), json!({"cursor": "a"}));
        assert_eq!(stream.scope.stream(), Some(&StreamKey::new("orders")));
    }

    #[test]
    fn checkpoint_hash_depends_only_on_payload() {
        let a = Checkpoint::global(json!({"lsn": 10}));
        let b = Checkpoint::stream(StreamKey::new("orders"), json!({"lsn": 10}));
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn message_kind_names() {
        let trace = Message::ErrorTrace(ErrorTrace::new(5, "boom"));
        assert_eq!(trace.kind(), "error_trace");

        let estimate = Message::Estimate(Estimate {
            scope: Scope::Global,
            row_estimate: 1,
            byte_estimate: 2,
        });
        assert_eq!(estimate.kind(), "estimate");
    }

    #[test]
    fn failure_type_serializes_snake_case() {
        let value = serde_json::to_value(TraceFailureType::ConfigError).unwrap();
        assert_eq!(value, json!("config_error"));
    }
}
