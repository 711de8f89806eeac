//! Stream interning.
//!
//! Delta entries are kept small by referring to streams through a `u16`
//! index instead of the full name/namespace pair.

use std::collections::HashMap;
use std::fmt;
use syncledger_types::StreamKey;

/// Interned identifier of a stream within one sync.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamIndex(u16);

impl StreamIndex {
    /// Create an index with the given value.
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the numeric value of this index.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Debug for StreamIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamIndex({})", self.0)
    }
}

/// Two-way mapping between stream keys and their interned indices.
#[derive(Debug, Clone, Default)]
pub struct StreamRegistry {
    indices: HashMap<StreamKey, StreamIndex>,
    keys: Vec<StreamKey>,
}

impl StreamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the index of a stream, interning it on first use.
    ///
    /// Returns `None` once the `u16` index space is exhausted.
    pub fn index_of(&mut self, key: &StreamKey) -> Option<StreamIndex> {
        if let Some(index) = self.indices.get(key) {
            return Some(*index);
        }
        let index = StreamIndex(u16::try_from(self.keys.len()).ok()?);
        self.indices.insert(key.clone(), index);
        self.keys.push(key.clone());
        Some(index)
    }

    /// Resolve an index back to its stream key.
    pub fn key_of(&self, index: StreamIndex) -> Option<&StreamKey> {
        self.keys.get(usize::from(index.0))
    }

    /// Number of interned streams.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if no stream has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
