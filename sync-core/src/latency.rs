//! Checkpoint latency tracking for syncledger.
//!
//! Measures how long the destination takes to commit a checkpoint after the
//! source emitted it, and how long the source takes between checkpoints.
//! Both are kept as a running maximum and a running mean in whole seconds.
//!
//! Checkpoints are addressed either globally (one sequence for the whole
//! sync) or per stream (one sequence per stream). The first checkpoint seen
//! fixes the addressing mode for the lifetime of the tracker.

use std::collections::{HashMap, VecDeque};
use std::time::SystemTime;
use syncledger_types::{CheckpointHash, Scope};
use thiserror::Error;

/// Estimated cost of one pending emission (hash + timestamp).
pub const PENDING_EMISSION_BYTES: usize = 8 + 8;

/// Errors returned by [`LatencyTracker`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatencyError {
    /// The byte budget is exhausted; the tracker is latched.
    #[error("latency tracker out of memory (capacity: {capacity} bytes)")]
    OutOfMemory {
        /// Configured capacity in bytes.
        capacity: usize,
    },

    /// A commit did not match any pending emission.
    #[error("no pending checkpoint emission matches hash {hash}")]
    NoStateMatch {
        /// The hash that was committed.
        hash: CheckpointHash,
    },

    /// Global and per-stream checkpoints were mixed in one sync.
    #[error("global and per-stream checkpoints cannot be mixed in one sync")]
    MixedScopes,
}

/// Compute a running mean after adding one sample.
///
/// `count` is the number of samples including `new_value`. The exact mean
/// is truncated toward zero, so `calculate_mean(10, 5, 12) == 10`.
pub fn calculate_mean(old_mean: u64, count: u64, new_value: u64) -> u64 {
    if count == 0 {
        return new_value;
    }
    let count = u128::from(count);
    let total = u128::from(old_mean) * (count - 1) + u128::from(new_value);
    // The mean of u64 samples always fits in a u64.
    (total / count) as u64
}

fn elapsed_secs(from: SystemTime, to: SystemTime) -> u64 {
    to.duration_since(from).map(|d| d.as_secs()).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressingMode {
    Global,
    PerStream,
}

impl AddressingMode {
    fn of(scope: &Scope) -> Self {
        match scope {
            Scope::Global => AddressingMode::Global,
            Scope::Stream(_) => AddressingMode::PerStream,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingEmission {
    hash: CheckpointHash,
    emitted_at: SystemTime,
}

/// Running max and mean of a series of second counts.
#[derive(Debug, Clone, Default)]
struct RunningStats {
    count: u64,
    max: Option<u64>,
    mean: Option<u64>,
}

impl RunningStats {
    fn record(&mut self, value: u64) {
        self.count += 1;
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
        self.mean = Some(calculate_mean(self.mean.unwrap_or(0), self.count, value));
    }
}

/// Tracks emit-to-commit latency of checkpoints with a bounded budget.
///
/// Per addressing scope, an emission moves from pending to matched when the
/// destination commits it (or a later checkpoint of the same scope). Once
/// the budget is exceeded every mutation fails with
/// [`LatencyError::OutOfMemory`].
#[derive(Debug)]
pub struct LatencyTracker {
    capacity: usize,
    used: usize,
    out_of_memory: bool,
    mode: Option<AddressingMode>,
    pending: HashMap<Scope, VecDeque<PendingEmission>>,
    commit_stats: RunningStats,

    first_record_received_at: Option<SystemTime>,
    last_state_message_received_at: Option<SystemTime>,
    receive_stats: RunningStats,
    total_source_emitted_state_messages: u64,
    total_destination_emitted_state_messages: u64,
}

impl LatencyTracker {
    /// Create a tracker with the given byte budget for pending emissions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            out_of_memory: false,
            mode: None,
            pending: HashMap::new(),
            commit_stats: RunningStats::default(),
            first_record_received_at: None,
            last_state_message_received_at: None,
            receive_stats: RunningStats::default(),
            total_source_emitted_state_messages: 0,
            total_destination_emitted_state_messages: 0,
        }
    }

    /// Record that the source emitted a checkpoint.
    pub fn add_state(
        &mut self,
        scope: &Scope,
        hash: CheckpointHash,
        emitted_at: SystemTime,
    ) -> Result<(), LatencyError> {
        self.ensure_not_out_of_memory()?;
        let mode = AddressingMode::of(scope);
        match self.mode {
            Some(existing) if existing != mode => return Err(LatencyError::MixedScopes),
            _ => {}
        }

        if self.used + PENDING_EMISSION_BYTES > self.capacity {
            self.out_of_memory = true;
            return Err(self.out_of_memory_error());
        }

        self.mode = Some(mode);
        self.used += PENDING_EMISSION_BYTES;
        self.pending
            .entry(scope.clone())
            .or_default()
            .push_back(PendingEmission { hash, emitted_at });
        Ok(())
    }

    /// Record that the destination committed a checkpoint.
    ///
    /// Matches the oldest pending emission with this hash in the same scope,
    /// records its latency, and evicts it along with every older emission of
    /// that scope.
    pub fn update_states(
        &mut self,
        scope: &Scope,
        hash: CheckpointHash,
        committed_at: SystemTime,
    ) -> Result<(), LatencyError> {
        self.ensure_not_out_of_memory()?;
        match self.mode {
            None => return Err(LatencyError::NoStateMatch { hash }),
            Some(mode) if mode != AddressingMode::of(scope) => {
                return Err(LatencyError::MixedScopes)
            }
            Some(_) => {}
        }

        let queue = self
            .pending
            .get_mut(scope)
            .ok_or(LatencyError::NoStateMatch { hash })?;
        let position = queue
            .iter()
            .position(|pending| pending.hash == hash)
            .ok_or(LatencyError::NoStateMatch { hash })?;

        let matched = queue[position];
        queue.drain(..=position);
        if queue.is_empty() {
            self.pending.remove(scope);
        }
        self.used -= (position + 1) * PENDING_EMISSION_BYTES;

        self.commit_stats
            .record(elapsed_secs(matched.emitted_at, committed_at));
        Ok(())
    }

    /// Set the time the first record of the sync was received.
    pub fn set_first_record_received_at(&mut self, received_at: SystemTime) {
        self.first_record_received_at = Some(received_at);
    }

    /// Time the first record of the sync was received, if any.
    pub fn first_record_received_at(&self) -> Option<SystemTime> {
        self.first_record_received_at
    }

    /// Set the time the latest source checkpoint was received.
    pub fn set_last_state_message_received_at(&mut self, received_at: SystemTime) {
        self.last_state_message_received_at = Some(received_at);
    }

    /// Count a checkpoint emitted by the source.
    pub fn increment_total_source_emitted_state_messages(&mut self) {
        self.total_source_emitted_state_messages += 1;
    }

    /// Count a checkpoint committed by the destination.
    pub fn increment_total_destination_emitted_state_messages(&mut self) {
        self.total_destination_emitted_state_messages += 1;
    }

    /// Sample the time the source took to produce this checkpoint.
    ///
    /// Measured from the previous checkpoint, or from the first record when
    /// this is the first checkpoint. Nothing is sampled if neither exists.
    pub fn update_max_and_mean_seconds_to_receive_state_message(
        &mut self,
        received_at: SystemTime,
    ) {
        let since = self
            .last_state_message_received_at
            .or(self.first_record_received_at);
        if let Some(since) = since {
            self.receive_stats.record(elapsed_secs(since, received_at));
        }
    }

    /// Longest emit-to-commit latency seen, in seconds.
    pub fn max_seconds_between_state_emitted_and_committed(&self) -> Option<u64> {
        self.commit_stats.max
    }

    /// Running mean emit-to-commit latency, in seconds.
    pub fn mean_seconds_between_state_emitted_and_committed(&self) -> Option<u64> {
        self.commit_stats.mean
    }

    /// Longest time the source took to produce a checkpoint, in seconds.
    pub fn max_seconds_to_receive_state_message(&self) -> Option<u64> {
        self.receive_stats.max
    }

    /// Running mean time the source took to produce a checkpoint, in seconds.
    pub fn mean_seconds_to_receive_state_message(&self) -> Option<u64> {
        self.receive_stats.mean
    }

    /// Number of checkpoints emitted by the source.
    pub fn total_source_emitted_state_messages(&self) -> u64 {
        self.total_source_emitted_state_messages
    }

    /// Number of checkpoints committed by the destination.
    pub fn total_destination_emitted_state_messages(&self) -> u64 {
        self.total_destination_emitted_state_messages
    }

    /// Check if the tracker has latched after exceeding its budget.
    pub fn out_of_memory(&self) -> bool {
        self.out_of_memory
    }

    /// Number of emissions awaiting a commit, across all scopes.
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    fn ensure_not_out_of_memory(&self) -> Result<(), LatencyError> {
        if self.out_of_memory {
            return Err(self.out_of_memory_error());
        }
        Ok(())
    }

    fn out_of_memory_error(&self) -> LatencyError {
        LatencyError::OutOfMemory {
            capacity: self.capacity,
        }
    }
}
