//! Structured failure reasons built from connector error traces.

use serde::Serialize;
use syncledger_types::{ErrorTrace, TraceFailureType};

/// Which side of the sync a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    /// The source connector
    Source,
    /// The destination connector
    Destination,
}

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// The connector was misconfigured
    ConfigError,
    /// Anything else
    SystemError,
}

impl From<Option<TraceFailureType>> for FailureType {
    fn from(value: Option<TraceFailureType>) -> Self {
        match value {
            Some(TraceFailureType::ConfigError) => FailureType::ConfigError,
            Some(TraceFailureType::SystemError) | None => FailureType::SystemError,
        }
    }
}

/// A failure attributed to one connector of a sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReason {
    /// Connector that reported the error
    pub origin: FailureOrigin,
    /// Failure classification
    pub failure_type: FailureType,
    /// User-facing message
    pub external_message: String,
    /// Internal message, if the connector provided one
    pub internal_message: Option<String>,
    /// Stack trace, if the connector provided one
    pub stack_trace: Option<String>,
    /// Unix timestamp (milliseconds) of the error
    pub timestamp_ms: u64,
    /// Job the attempt belongs to
    pub job_id: i64,
    /// Attempt number within the job
    pub attempt_number: u32,
    /// Whether the reason was built from a connector error trace
    pub from_trace_message: bool,
}

impl FailureReason {
    /// Build a failure reason from a connector error trace.
    pub fn from_error_trace(
        origin: FailureOrigin,
        trace: &ErrorTrace,
        job_id: i64,
        attempt_number: u32,
    ) -> Self {
        Self {
            origin,
            failure_type: trace.failure_type.into(),
            external_message: trace.message.clone(),
            internal_message: trace.internal_message.clone(),
            stack_trace: trace.stack_trace.clone(),
            timestamp_ms: trace.emitted_at,
            job_id,
            attempt_number,
            from_trace_message: true,
        }
    }
}
