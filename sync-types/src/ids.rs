//! Identity and addressing types for syncledger.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifies a logical data stream by name and optional namespace.
///
/// Equality is structural, so two keys built from the same parts are the
/// same stream.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    /// Stream name
    pub name: String,
    /// Stream namespace (schema, database, ...), if the source has one
    pub namespace: Option<String>,
}

impl StreamKey {
    /// Create a key for a stream without a namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Create a key for a namespaced stream.
    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}.{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamKey({})", self)
    }
}

/// Addressing scope of a checkpoint or estimate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "stream", rename_all = "snake_case")]
pub enum Scope {
    /// Applies to the whole sync
    Global,
    /// Applies to a single stream
    Stream(StreamKey),
}

impl Scope {
    /// The stream this scope refers to, if it is stream-scoped.
    pub fn stream(&self) -> Option<&StreamKey> {
        match self {
            Scope::Global => None,
            Scope::Stream(key) => Some(key),
        }
    }

    /// Check if this is the global scope.
    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }
}

/// Content hash of a checkpoint payload.
///
/// The first 8 bytes of SHA-256 over the JSON serialization of the payload.
/// Identical payloads always hash to the same value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckpointHash(u64);

impl CheckpointHash {
    /// Hash a checkpoint payload.
    pub fn of(data: &serde_json::Value) -> Self {
        let mut hasher = Sha256::new();
        // Writing a `Value` into a hasher cannot fail.
        let _ = serde_json::to_writer(&mut hasher, data);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(bytes))
    }

    /// Create a hash from a raw value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value of this hash.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CheckpointHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for CheckpointHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CheckpointHash({})", self)
    }
}
