//! Committed-record bookkeeping for syncledger.
//!
//! This module provides an ordered ledger of per-checkpoint record deltas:
//! - FIFO ordering matching the source's checkpoint emission order
//! - Commit folding (one acknowledgment commits everything up to it)
//! - A byte budget that latches the tracker once exhausted
//!
//! Destinations usually acknowledge the latest checkpoint rather than every
//! one, so a commit pops all deltas up to and including the matching hash.

use std::collections::{HashMap, VecDeque};
use syncledger_types::CheckpointHash;
use thiserror::Error;

use crate::streams::StreamIndex;

/// Estimated cost of the hash stored with every delta.
pub const STATE_HASH_BYTES: usize = 8;

/// Estimated cost of one (stream index, record count) pair.
pub const STREAM_COUNT_BYTES: usize = 2 + 8;

/// Errors returned by [`DeltaTracker`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    /// The byte budget is exhausted; the tracker is latched.
    #[error("delta tracker capacity exceeded (capacity: {capacity} bytes)")]
    CapacityExceeded {
        /// Configured capacity in bytes.
        capacity: usize,
    },

    /// A commit referenced a checkpoint that is not pending.
    #[error("no pending checkpoint with hash {hash}")]
    NoSuchCheckpoint {
        /// The hash that was committed.
        hash: CheckpointHash,
    },
}

/// Record counts attributed to a single checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StateDelta {
    hash: CheckpointHash,
    counts: HashMap<StreamIndex, u64>,
}

impl StateDelta {
    fn cost(&self) -> usize {
        entry_cost(self.counts.len())
    }
}

fn entry_cost(streams: usize) -> usize {
    STATE_HASH_BYTES.saturating_add(streams.saturating_mul(STREAM_COUNT_BYTES))
}

/// Ordered ledger of record deltas awaiting destination commits.
///
/// Deltas flow through the tracker in this order:
/// 1. `add_state()` - the source emitted a checkpoint
/// 2. `commit_state_hash()` - the destination committed it (or a later one)
///
/// Once the byte budget is exceeded every mutation fails with
/// [`DeltaError::CapacityExceeded`] for the lifetime of the tracker.
#[derive(Debug)]
pub struct DeltaTracker {
    /// Total byte budget.
    capacity: usize,
    /// Budget not used by pending deltas.
    remaining_capacity: usize,
    /// Set once the budget was exceeded, never cleared.
    capacity_exceeded: bool,
    /// Deltas in emission order.
    deltas: VecDeque<StateDelta>,
    /// Running committed counts.
    committed: HashMap<StreamIndex, u64>,
}

impl DeltaTracker {
    /// Create a tracker with the given byte budget.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            remaining_capacity: capacity,
            capacity_exceeded: false,
            deltas: VecDeque::new(),
            committed: HashMap::new(),
        }
    }

    /// Queue the record counts emitted since the previous checkpoint.
    ///
    /// Every call appends, even for a hash that is already pending.
    pub fn add_state(
        &mut self,
        hash: CheckpointHash,
        counts: HashMap<StreamIndex, u64>,
    ) -> Result<(), DeltaError> {
        self.ensure_capacity_not_exceeded()?;

        let delta = StateDelta { hash, counts };
        let cost = delta.cost();
        if cost > self.remaining_capacity {
            self.capacity_exceeded = true;
            return Err(self.capacity_error());
        }

        self.remaining_capacity -= cost;
        self.deltas.push_back(delta);
        Ok(())
    }

    /// Commit every pending delta up to and including `hash`.
    ///
    /// Fails without side effects if no pending delta has this hash.
    pub fn commit_state_hash(&mut self, hash: CheckpointHash) -> Result<(), DeltaError> {
        self.ensure_capacity_not_exceeded()?;

        let position = self
            .deltas
            .iter()
            .position(|delta| delta.hash == hash)
            .ok_or(DeltaError::NoSuchCheckpoint { hash })?;

        for delta in self.deltas.drain(..=position) {
            self.remaining_capacity += delta.cost();
            for (stream, count) in delta.counts {
                *self.committed.entry(stream).or_insert(0) += count;
            }
        }
        Ok(())
    }

    /// Snapshot of committed record counts per stream.
    pub fn stream_to_committed_records(&self) -> HashMap<StreamIndex, u64> {
        self.committed.clone()
    }

    /// Check if the tracker has latched after exceeding its budget.
    pub fn capacity_exceeded(&self) -> bool {
        self.capacity_exceeded
    }

    /// Number of deltas awaiting a commit.
    pub fn pending_len(&self) -> usize {
        self.deltas.len()
    }

    /// Bytes of budget not used by pending deltas.
    pub fn remaining_capacity(&self) -> usize {
        self.remaining_capacity
    }

    /// Total byte budget.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn ensure_capacity_not_exceeded(&self) -> Result<(), DeltaError> {
        if self.capacity_exceeded {
            return Err(self.capacity_error());
        }
        Ok(())
    }

    fn capacity_error(&self) -> DeltaError {
        DeltaError::CapacityExceeded {
            capacity: self.capacity,
        }
    }
}
