//! MessageTracker - the bookkeeping entry point for one sync.
//!
//! The dispatch loop of a sync calls [`MessageTracker::accept_from_source`]
//! and [`MessageTracker::accept_from_destination`] once per message. The
//! tracker keeps emitted/estimated counters itself and fans checkpoints out
//! to the leaf trackers and the state aggregators.
//!
//! ```text
//! source msgs ──┐                  ┌─> DeltaTracker    (committed records)
//!               ├─> MessageTracker ├─> LatencyTracker  (emit→commit seconds)
//! dest msgs ────┘                  └─> StateAggregator (resumable state)
//! ```
//!
//! Bookkeeping failures in the leaf trackers never abort message
//! processing. They are logged and the affected figures (committed counts
//! or checkpoint timings) become unavailable for the rest of the sync.

use std::collections::HashMap;
use std::io;
use std::time::SystemTime;
use syncledger_types::{Checkpoint, ErrorTrace, Estimate, Message, Record, Scope, StreamKey};
use thiserror::Error;

use crate::aggregator::{AggregatedState, DefaultStateAggregator, StateAggregator};
use crate::config::TrackerConfig;
use crate::delta::DeltaTracker;
use crate::failure::{FailureOrigin, FailureReason};
use crate::latency::LatencyTracker;
use crate::streams::{StreamIndex, StreamRegistry};

/// Errors surfaced by [`MessageTracker`].
///
/// These indicate a misbehaving connector and are not swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Stream and sync estimates were emitted in the same sync.
    #[error("stream and sync estimates cannot be emitted in the same sync")]
    MixedEstimateScopes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EstimateScope {
    Stream,
    Sync,
}

#[derive(Debug, Clone, Copy, Default)]
struct StreamStats {
    emitted_records: u64,
    emitted_bytes: u64,
    estimated_records: u64,
    estimated_bytes: u64,
}

/// Counts bytes written without buffering them.
#[derive(Default)]
struct ByteCounter(u64);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Estimated serialized size of a record payload, in bytes.
///
/// This is the length of the payload's JSON serialization.
pub fn estimated_byte_size(data: &serde_json::Value) -> u64 {
    let mut counter = ByteCounter::default();
    // Writing a `Value` into a counter cannot fail.
    let _ = serde_json::to_writer(&mut counter, data);
    counter.0
}

fn origin_label(origin: FailureOrigin) -> &'static str {
    match origin {
        FailureOrigin::Source => "source",
        FailureOrigin::Destination => "destination",
    }
}

/// Stats and metadata tracking for the messages of one sync.
///
/// Not intended to transform messages or trigger downstream actions; it
/// only observes them.
#[derive(Debug)]
pub struct MessageTracker<A: StateAggregator = DefaultStateAggregator> {
    log_connector_messages: bool,
    streams: StreamRegistry,
    stream_stats: HashMap<StreamKey, StreamStats>,
    /// Records per stream since the last source checkpoint.
    running_counts: HashMap<StreamIndex, u64>,
    delta: DeltaTracker,
    latency: LatencyTracker,
    source_states: A,
    destination_states: A,

    estimate_scope: Option<EstimateScope>,
    sync_records_estimated: u64,
    sync_bytes_estimated: u64,

    first_source_error: Option<ErrorTrace>,
    first_destination_error: Option<ErrorTrace>,
    source_error_count: u64,
    destination_error_count: u64,

    /// Set once committed counts can no longer be computed exactly.
    unreliable_committed_counts: bool,
    /// Set once emit-to-commit timings can no longer be computed.
    unreliable_state_timing_metrics: bool,
}

impl MessageTracker<DefaultStateAggregator> {
    /// Create a tracker with default state aggregation.
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_parts(
            config,
            DeltaTracker::new(config.delta_capacity_bytes),
            LatencyTracker::new(config.latency_capacity_bytes),
            DefaultStateAggregator::new(),
            DefaultStateAggregator::new(),
        )
    }
}

impl<A: StateAggregator> MessageTracker<A> {
    /// Create a tracker from explicit collaborators.
    ///
    /// The capacity settings of `config` are ignored; the given trackers
    /// carry their own budgets.
    pub fn with_parts(
        config: &TrackerConfig,
        delta: DeltaTracker,
        latency: LatencyTracker,
        source_states: A,
        destination_states: A,
    ) -> Self {
        Self {
            log_connector_messages: config.log_connector_messages,
            streams: StreamRegistry::new(),
            stream_stats: HashMap::new(),
            running_counts: HashMap::new(),
            delta,
            latency,
            source_states,
            destination_states,
            estimate_scope: None,
            sync_records_estimated: 0,
            sync_bytes_estimated: 0,
            first_source_error: None,
            first_destination_error: None,
            source_error_count: 0,
            destination_error_count: 0,
            unreliable_committed_counts: false,
            unreliable_state_timing_metrics: false,
        }
    }

    /// Accept a message emitted by the source, timestamped now.
    pub fn accept_from_source(&mut self, message: &Message) -> Result<(), TrackerError> {
        self.accept_from_source_at(message, SystemTime::now())
    }

    /// Accept a message emitted by the source at the given time.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MixedEstimateScopes`] if the source mixes
    /// stream and sync estimates.
    pub fn accept_from_source_at(
        &mut self,
        message: &Message,
        now: SystemTime,
    ) -> Result<(), TrackerError> {
        self.log_message(FailureOrigin::Source, message);

        match message {
            Message::Record(record) => self.handle_source_record(record, now),
            Message::Checkpoint(checkpoint) => self.handle_source_checkpoint(checkpoint, now),
            Message::Estimate(estimate) => return self.handle_estimate(estimate),
            Message::ErrorTrace(trace) => self.handle_error_trace(trace, FailureOrigin::Source),
        }
        Ok(())
    }

    /// Accept a message emitted by the destination, timestamped now.
    pub fn accept_from_destination(&mut self, message: &Message) -> Result<(), TrackerError> {
        self.accept_from_destination_at(message, SystemTime::now())
    }

    /// Accept a message emitted by the destination at the given time.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MixedEstimateScopes`] if the destination
    /// forwards estimates of both scopes.
    pub fn accept_from_destination_at(
        &mut self,
        message: &Message,
        now: SystemTime,
    ) -> Result<(), TrackerError> {
        self.log_message(FailureOrigin::Destination, message);

        match message {
            Message::Checkpoint(checkpoint) => {
                self.handle_destination_checkpoint(checkpoint, now)
            }
            Message::ErrorTrace(trace) => {
                self.handle_error_trace(trace, FailureOrigin::Destination)
            }
            Message::Estimate(estimate) => return self.handle_estimate(estimate),
            Message::Record(record) => {
                tracing::warn!("Ignoring record for stream {} from destination", record.stream);
            }
        }
        Ok(())
    }

    /// Count the record and attribute it to the next source checkpoint.
    fn handle_source_record(&mut self, record: &Record, now: SystemTime) {
        if self.latency.first_record_received_at().is_none() {
            self.latency.set_first_record_received_at(now);
        }

        let stats = self.stream_stats.entry(record.stream.clone()).or_default();
        stats.emitted_records += 1;
        stats.emitted_bytes += estimated_byte_size(&record.data);

        match self.streams.index_of(&record.stream) {
            Some(index) => *self.running_counts.entry(index).or_insert(0) += 1,
            None if !self.unreliable_committed_counts => {
                tracing::warn!(
                    "Too many streams to track committed records (limit: {})",
                    usize::from(u16::MAX) + 1
                );
                tracing::warn!("This only impacts metadata and does not indicate a problem with actual sync data.");
                self.unreliable_committed_counts = true;
            }
            None => {}
        }
    }

    /// Hand the records counted since the previous checkpoint to the delta
    /// tracker and start counting afresh.
    fn handle_source_checkpoint(&mut self, checkpoint: &Checkpoint, now: SystemTime) {
        self.latency.increment_total_source_emitted_state_messages();
        self.latency
            .update_max_and_mean_seconds_to_receive_state_message(now);
        self.latency.set_last_state_message_received_at(now);
        self.source_states.ingest(checkpoint);

        let hash = checkpoint.hash();
        let counts = std::mem::take(&mut self.running_counts);

        if !self.unreliable_committed_counts {
            if let Err(e) = self.delta.add_state(hash, counts) {
                tracing::warn!("Committed record counts can no longer be computed reliably: {}", e);
                tracing::warn!("This only impacts metadata and does not indicate a problem with actual sync data.");
                self.unreliable_committed_counts = true;
            }
        }

        if !self.unreliable_state_timing_metrics {
            if let Err(e) = self.latency.add_state(&checkpoint.scope, hash, now) {
                tracing::warn!("Checkpoint timing metrics can no longer be recorded: {}", e);
                tracing::warn!("This only impacts metrics and does not indicate a problem with actual sync data.");
                self.unreliable_state_timing_metrics = true;
            }
        }
    }

    /// Commit every checkpoint up to and including this one.
    fn handle_destination_checkpoint(&mut self, checkpoint: &Checkpoint, now: SystemTime) {
        self.latency
            .increment_total_destination_emitted_state_messages();
        self.destination_states.ingest(checkpoint);

        let hash = checkpoint.hash();

        if !self.unreliable_committed_counts {
            if let Err(e) = self.delta.commit_state_hash(hash) {
                tracing::warn!("Committed record counts can no longer be computed reliably: {}", e);
                tracing::warn!("This only impacts metadata and does not indicate a problem with actual sync data.");
                self.unreliable_committed_counts = true;
            }
        }

        if !self.unreliable_state_timing_metrics {
            if let Err(e) = self.latency.update_states(&checkpoint.scope, hash, now) {
                tracing::warn!("Unable to match destination checkpoint to a source checkpoint: {}", e);
                tracing::warn!("This only impacts metrics and does not indicate a problem with actual sync data.");
                self.unreliable_state_timing_metrics = true;
            }
        }
    }

    /// Each estimate replaces the previous one for its scope.
    fn handle_estimate(&mut self, estimate: &Estimate) -> Result<(), TrackerError> {
        let scope = match estimate.scope {
            Scope::Global => EstimateScope::Sync,
            Scope::Stream(_) => EstimateScope::Stream,
        };
        if self.estimate_scope.is_some_and(|existing| existing != scope) {
            return Err(TrackerError::MixedEstimateScopes);
        }
        self.estimate_scope = Some(scope);

        match &estimate.scope {
            Scope::Stream(stream) => {
                tracing::debug!("Saving stream estimates for {}", stream);
                let stats = self.stream_stats.entry(stream.clone()).or_default();
                stats.estimated_records = estimate.row_estimate;
                stats.estimated_bytes = estimate.byte_estimate;
            }
            Scope::Global => {
                tracing::debug!("Saving sync estimates");
                self.sync_records_estimated = estimate.row_estimate;
                self.sync_bytes_estimated = estimate.byte_estimate;
            }
        }
        Ok(())
    }

    fn handle_error_trace(&mut self, trace: &ErrorTrace, origin: FailureOrigin) {
        let (first, count) = match origin {
            FailureOrigin::Source => (&mut self.first_source_error, &mut self.source_error_count),
            FailureOrigin::Destination => (
                &mut self.first_destination_error,
                &mut self.destination_error_count,
            ),
        };
        *count += 1;
        if first.is_none() {
            *first = Some(trace.clone());
        }
    }

    fn log_message(&self, origin: FailureOrigin, message: &Message) {
        if !self.log_connector_messages {
            return;
        }
        match serde_json::to_string(message) {
            Ok(json) => tracing::info!("{} message | {}", origin_label(origin), json),
            Err(e) => tracing::warn!(
                "Failed to serialize {} {} message: {}",
                origin_label(origin),
                message.kind(),
                e
            ),
        }
    }

    /// Total records emitted by the source.
    pub fn total_records_emitted(&self) -> u64 {
        self.stream_stats.values().map(|s| s.emitted_records).sum()
    }

    /// Total estimated bytes of records emitted by the source.
    pub fn total_bytes_emitted(&self) -> u64 {
        self.stream_stats.values().map(|s| s.emitted_bytes).sum()
    }

    /// Records emitted by the source, per stream.
    pub fn stream_to_emitted_records(&self) -> HashMap<StreamKey, u64> {
        self.collect_stats(|s| s.emitted_records)
    }

    /// Estimated bytes emitted by the source, per stream.
    pub fn stream_to_emitted_bytes(&self) -> HashMap<StreamKey, u64> {
        self.collect_stats(|s| s.emitted_bytes)
    }

    /// Latest record estimate per stream.
    pub fn stream_to_estimated_records(&self) -> HashMap<StreamKey, u64> {
        self.collect_stats(|s| s.estimated_records)
    }

    /// Latest byte estimate per stream.
    pub fn stream_to_estimated_bytes(&self) -> HashMap<StreamKey, u64> {
        self.collect_stats(|s| s.estimated_bytes)
    }

    /// Estimated records for the sync: the sync estimate, or the sum of
    /// stream estimates.
    pub fn total_records_estimated(&self) -> u64 {
        match self.estimate_scope {
            Some(EstimateScope::Sync) => self.sync_records_estimated,
            _ => self.stream_stats.values().map(|s| s.estimated_records).sum(),
        }
    }

    /// Estimated bytes for the sync: the sync estimate, or the sum of
    /// stream estimates.
    pub fn total_bytes_estimated(&self) -> u64 {
        match self.estimate_scope {
            Some(EstimateScope::Sync) => self.sync_bytes_estimated,
            _ => self.stream_stats.values().map(|s| s.estimated_bytes).sum(),
        }
    }

    /// Records committed by the destination, per stream.
    ///
    /// `None` once committed counts can no longer be computed exactly.
    pub fn stream_to_committed_records(&self) -> Option<HashMap<StreamKey, u64>> {
        if self.unreliable_committed_counts {
            return None;
        }
        Some(
            self.delta
                .stream_to_committed_records()
                .into_iter()
                .filter_map(|(index, count)| {
                    self.streams.key_of(index).map(|key| (key.clone(), count))
                })
                .collect(),
        )
    }

    /// Total records committed by the destination.
    ///
    /// `None` once committed counts can no longer be computed exactly.
    pub fn total_records_committed(&self) -> Option<u64> {
        if self.unreliable_committed_counts {
            return None;
        }
        Some(self.delta.stream_to_committed_records().values().sum())
    }

    /// Number of checkpoints emitted by the source.
    pub fn total_source_state_messages_emitted(&self) -> u64 {
        self.latency.total_source_emitted_state_messages()
    }

    /// Number of checkpoints committed by the destination.
    pub fn total_destination_state_messages_emitted(&self) -> u64 {
        self.latency.total_destination_emitted_state_messages()
    }

    /// Aggregated state of all source checkpoints, once one was seen.
    pub fn source_output_state(&self) -> Option<AggregatedState> {
        self.source_states.aggregated()
    }

    /// Aggregated state of all destination checkpoints, once one was seen.
    pub fn destination_output_state(&self) -> Option<AggregatedState> {
        self.destination_states.aggregated()
    }

    /// Longest time the source took to produce a checkpoint, in seconds.
    pub fn max_seconds_to_receive_source_state_message(&self) -> Option<u64> {
        self.latency.max_seconds_to_receive_state_message()
    }

    /// Mean time the source took to produce a checkpoint, in seconds.
    pub fn mean_seconds_to_receive_source_state_message(&self) -> Option<u64> {
        self.latency.mean_seconds_to_receive_state_message()
    }

    /// Longest emit-to-commit latency of a checkpoint, in seconds.
    ///
    /// `None` if no checkpoint was matched yet or timings became unreliable.
    pub fn max_seconds_between_state_message_emitted_and_committed(&self) -> Option<u64> {
        if self.unreliable_state_timing_metrics {
            return None;
        }
        self.latency.max_seconds_between_state_emitted_and_committed()
    }

    /// Mean emit-to-commit latency of a checkpoint, in seconds.
    ///
    /// `None` if no checkpoint was matched yet or timings became unreliable.
    pub fn mean_seconds_between_state_message_emitted_and_committed(&self) -> Option<u64> {
        if self.unreliable_state_timing_metrics {
            return None;
        }
        self.latency.mean_seconds_between_state_emitted_and_committed()
    }

    /// Check if committed counts became unavailable.
    pub fn unreliable_committed_counts(&self) -> bool {
        self.unreliable_committed_counts
    }

    /// Check if checkpoint timings became unavailable.
    pub fn unreliable_state_timing_metrics(&self) -> bool {
        self.unreliable_state_timing_metrics
    }

    /// First error trace emitted by the source.
    pub fn first_source_error_trace(&self) -> Option<&ErrorTrace> {
        self.first_source_error.as_ref()
    }

    /// First error trace emitted by the destination.
    pub fn first_destination_error_trace(&self) -> Option<&ErrorTrace> {
        self.first_destination_error.as_ref()
    }

    /// Number of error traces emitted by the source.
    pub fn source_error_trace_count(&self) -> u64 {
        self.source_error_count
    }

    /// Number of error traces emitted by the destination.
    pub fn destination_error_trace_count(&self) -> u64 {
        self.destination_error_count
    }

    /// Build the failure reason for a failed attempt from the captured
    /// error traces.
    ///
    /// The source's first error wins; the destination's is used only when
    /// the source reported none.
    pub fn error_trace_message_failure(
        &self,
        job_id: i64,
        attempt_number: u32,
    ) -> Option<FailureReason> {
        if let Some(trace) = &self.first_source_error {
            return Some(FailureReason::from_error_trace(
                FailureOrigin::Source,
                trace,
                job_id,
                attempt_number,
            ));
        }
        self.first_destination_error.as_ref().map(|trace| {
            FailureReason::from_error_trace(
                FailureOrigin::Destination,
                trace,
                job_id,
                attempt_number,
            )
        })
    }

    fn collect_stats(&self, field: impl Fn(&StreamStats) -> u64) -> HashMap<StreamKey, u64> {
        self.stream_stats
            .iter()
            .map(|(key, stats)| (key.clone(), field(stats)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn record(stream: &str, data: serde_json::Value) -> Message {
        Message::Record(Record {
            stream: StreamKey::new(stream),
            data,
            emitted_at: 0,
        })
    }

    fn checkpoint(lsn: u64) -> Message {
        Message::Checkpoint(Checkpoint::global(json!({ "lsn": lsn })))
    }

    fn estimate(scope: Scope, rows: u64, bytes: u64) -> Message {
        Message::Estimate(Estimate {
            scope,
            row_estimate: rows,
            byte_estimate: bytes,
        })
    }

    fn tracker() -> MessageTracker {
        MessageTracker::new(&TrackerConfig::default())
    }

    #[test]
    fn estimated_byte_size_is_json_length() {
        let data = json!({"id": 1, "name": "ada"});
        let expected = serde_json::to_string(&data).unwrap().len() as u64;
        assert_eq!(estimated_byte_size(&data), expected);
    }

    #[test]
    fn records_update_emitted_counters() {
        let mut tracker = tracker();
        let r1 = json!({"id": 1});
        let r2 = json!({"id": 2, "name": "bob"});

        tracker.accept_from_source(&record("a", r1.clone())).unwrap();
        tracker.accept_from_source(&record("a", r2.clone())).unwrap();
        tracker.accept_from_source(&record("b", r1.clone())).unwrap();

        let a = StreamKey::new("a");
        let b = StreamKey::new("b");
        assert_eq!(tracker.total_records_emitted(), 3);
        assert_eq!(tracker.stream_to_emitted_records()[&a], 2);
        assert_eq!(tracker.stream_to_emitted_records()[&b], 1);
        assert_eq!(
            tracker.stream_to_emitted_bytes()[&a],
            estimated_byte_size(&r1) + estimated_byte_size(&r2)
        );
        assert_eq!(
            tracker.total_bytes_emitted(),
            2 * estimated_byte_size(&r1) + estimated_byte_size(&r2)
        );
    }

    #[test]
    fn first_record_starts_receive_timer() {
        let mut tracker = tracker();
        tracker.accept_from_source_at(&record("a", json!({})), at(10)).unwrap();
        tracker.accept_from_source_at(&record("a", json!({})), at(12)).unwrap();
        tracker.accept_from_source_at(&checkpoint(1), at(15)).unwrap();

        assert_eq!(tracker.max_seconds_to_receive_source_state_message(), Some(5));
        assert_eq!(tracker.mean_seconds_to_receive_source_state_message(), Some(5));
    }

    #[test]
    fn committed_counts_follow_destination() {
        let mut tracker = tracker();
        tracker.accept_from_source(&record("a", json!({}))).unwrap();
        tracker.accept_from_source(&checkpoint(1)).unwrap();
        tracker.accept_from_source(&record("a", json!({}))).unwrap();
        tracker.accept_from_source(&checkpoint(2)).unwrap();

        assert_eq!(tracker.total_records_committed(), Some(0));

        tracker.accept_from_destination(&checkpoint(2)).unwrap();

        assert_eq!(tracker.total_records_committed(), Some(2));
        assert_eq!(
            tracker.stream_to_committed_records(),
            Some(HashMap::from([(StreamKey::new("a"), 2)]))
        );
    }

    #[test]
    fn unknown_destination_checkpoint_degrades_without_error() {
        let mut tracker = tracker();
        tracker.accept_from_source(&record("a", json!({}))).unwrap();
        tracker.accept_from_source(&checkpoint(1)).unwrap();

        assert!(tracker.accept_from_destination(&checkpoint(99)).is_ok());

        assert!(tracker.unreliable_committed_counts());
        assert!(tracker.unreliable_state_timing_metrics());
        assert_eq!(tracker.stream_to_committed_records(), None);
        assert_eq!(tracker.total_records_committed(), None);
        assert_eq!(
            tracker.max_seconds_between_state_message_emitted_and_committed(),
            None
        );
        // Emitted counts are unaffected.
        assert_eq!(tracker.total_records_emitted(), 1);
        // Degradation is permanent.
        tracker.accept_from_destination(&checkpoint(1)).unwrap();
        assert_eq!(tracker.total_records_committed(), None);
    }

    #[test]
    fn delta_capacity_overflow_degrades_committed_counts_only() {
        let config = TrackerConfig {
            delta_capacity_bytes: 0,
            ..TrackerConfig::default()
        };
        let mut tracker = MessageTracker::new(&config);

        tracker.accept_from_source_at(&checkpoint(1), at(0)).unwrap();
        tracker.accept_from_destination_at(&checkpoint(1), at(3)).unwrap();

        assert!(tracker.unreliable_committed_counts());
        assert!(!tracker.unreliable_state_timing_metrics());
        assert_eq!(tracker.total_records_committed(), None);
        assert_eq!(
            tracker.max_seconds_between_state_message_emitted_and_committed(),
            Some(3)
        );
    }

    #[test]
    fn latency_capacity_overflow_degrades_timings_only() {
        let config = TrackerConfig {
            latency_capacity_bytes: 0,
            ..TrackerConfig::default()
        };
        let mut tracker = MessageTracker::new(&config);

        tracker.accept_from_source(&record("a", json!({}))).unwrap();
        tracker.accept_from_source(&checkpoint(1)).unwrap();
        tracker.accept_from_destination(&checkpoint(1)).unwrap();

        assert!(tracker.unreliable_state_timing_metrics());
        assert!(!tracker.unreliable_committed_counts());
        assert_eq!(tracker.total_records_committed(), Some(1));
        assert_eq!(
            tracker.mean_seconds_between_state_message_emitted_and_committed(),
            None
        );
    }

    #[test]
    fn checkpoint_counters() {
        let mut tracker = tracker();
        tracker.accept_from_source(&checkpoint(1)).unwrap();
        tracker.accept_from_source(&checkpoint(2)).unwrap();
        tracker.accept_from_destination(&checkpoint(2)).unwrap();

        assert_eq!(tracker.total_source_state_messages_emitted(), 2);
        assert_eq!(tracker.total_destination_state_messages_emitted(), 1);
    }

    #[test]
    fn output_states_appear_after_first_checkpoint() {
        let mut tracker = tracker();
        assert_eq!(tracker.source_output_state(), None);
        assert_eq!(tracker.destination_output_state(), None);

        tracker.accept_from_source(&checkpoint(1)).unwrap();
        tracker.accept_from_source(&checkpoint(2)).unwrap();

        assert_eq!(
            tracker.source_output_state(),
            Some(AggregatedState::Global(json!({"lsn": 2})))
        );
        assert_eq!(tracker.destination_output_state(), None);

        tracker.accept_from_destination(&checkpoint(1)).unwrap();
        assert_eq!(
            tracker.destination_output_state(),
            Some(AggregatedState::Global(json!({"lsn": 1})))
        );
    }

    #[test]
    fn stream_estimates_replace_previous() {
        let mut tracker = tracker();
        let users = Scope::Stream(StreamKey::new("users"));
        let orders = Scope::Stream(StreamKey::new("orders"));

        tracker.accept_from_source(&estimate(users.clone(), 10, 100)).unwrap();
        tracker.accept_from_source(&estimate(users, 20, 200)).unwrap();
        tracker.accept_from_source(&estimate(orders, 5, 50)).unwrap();

        assert_eq!(tracker.stream_to_estimated_records()[&StreamKey::new("users")], 20);
        assert_eq!(tracker.stream_to_estimated_bytes()[&StreamKey::new("orders")], 50);
        assert_eq!(tracker.total_records_estimated(), 25);
        assert_eq!(tracker.total_bytes_estimated(), 250);
    }

    #[test]
    fn sync_estimates_replace_previous() {
        let mut tracker = tracker();
        tracker.accept_from_source(&estimate(Scope::Global, 10, 100)).unwrap();
        tracker.accept_from_source(&estimate(Scope::Global, 30, 300)).unwrap();

        assert_eq!(tracker.total_records_estimated(), 30);
        assert_eq!(tracker.total_bytes_estimated(), 300);
    }

    #[test]
    fn sync_estimate_is_not_masked_by_records() {
        let mut tracker = tracker();
        tracker.accept_from_source(&record("a", json!({}))).unwrap();
        tracker.accept_from_source(&estimate(Scope::Global, 10, 100)).unwrap();

        assert_eq!(tracker.total_records_estimated(), 10);
    }

    #[test]
    fn stream_then_sync_estimate_fails() {
        let mut tracker = tracker();
        tracker
            .accept_from_source(&estimate(Scope::Stream(StreamKey::new("a")), 1, 1))
            .unwrap();

        assert_eq!(
            tracker.accept_from_source(&estimate(Scope::Global, 1, 1)),
            Err(TrackerError::MixedEstimateScopes)
        );
    }

    #[test]
    fn sync_then_stream_estimate_fails() {
        let mut tracker = tracker();
        tracker.accept_from_source(&estimate(Scope::Global, 1, 1)).unwrap();

        assert_eq!(
            tracker.accept_from_source(&estimate(Scope::Stream(StreamKey::new("a")), 1, 1)),
            Err(TrackerError::MixedEstimateScopes)
        );
        // The sync estimate is kept.
        assert_eq!(tracker.total_records_estimated(), 1);
    }

    #[test]
    fn first_error_trace_per_side_is_kept() {
        let mut tracker = tracker();
        tracker
            .accept_from_source(&Message::ErrorTrace(ErrorTrace::new(1, "first")))
            .unwrap();
        tracker
            .accept_from_source(&Message::ErrorTrace(ErrorTrace::new(2, "second")))
            .unwrap();
        tracker
            .accept_from_destination(&Message::ErrorTrace(ErrorTrace::new(3, "dest")))
            .unwrap();

        assert_eq!(tracker.first_source_error_trace().unwrap().message, "first");
        assert_eq!(tracker.first_destination_error_trace().unwrap().message, "dest");
        assert_eq!(tracker.source_error_trace_count(), 2);
        assert_eq!(tracker.destination_error_trace_count(), 1);
    }

    #[test]
    fn no_error_traces_means_no_failure() {
        let tracker = tracker();
        assert!(tracker.first_source_error_trace().is_none());
        assert!(tracker.error_trace_message_failure(1, 0).is_none());
    }

    #[test]
    fn destination_records_are_ignored() {
        let mut tracker = tracker();
        tracker.accept_from_destination(&record("a", json!({}))).unwrap();

        assert_eq!(tracker.total_records_emitted(), 0);
    }

    #[test]
    fn logging_connector_messages_does_not_change_accounting() {
        let config = TrackerConfig {
            log_connector_messages: true,
            ..TrackerConfig::default()
        };
        let mut tracker = MessageTracker::new(&config);

        tracker.accept_from_source(&record("a", json!({"x": 1}))).unwrap();
        tracker.accept_from_source(&checkpoint(1)).unwrap();
        tracker.accept_from_destination(&checkpoint(1)).unwrap();

        assert_eq!(tracker.total_records_committed(), Some(1));
    }

    #[test]
    fn tracker_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MessageTracker>();
        assert_send_sync::<TrackerError>();
    }
}
