//! Checkpoint aggregation.
//!
//! The tracker forwards every checkpoint to a [`StateAggregator`], which
//! folds them into the single resumable state a sync would report. The
//! trait is the seam; [`DefaultStateAggregator`] keeps the latest global
//! checkpoint, or the latest checkpoint of every stream.

use serde::Serialize;
use std::collections::BTreeMap;
use syncledger_types::{Checkpoint, Scope, StreamKey};

/// Folds checkpoints into an aggregated, resumable state.
pub trait StateAggregator {
    /// Fold one checkpoint into the aggregate.
    fn ingest(&mut self, checkpoint: &Checkpoint);

    /// The aggregated state, or `None` if nothing was ingested.
    fn aggregated(&self) -> Option<AggregatedState>;
}

/// Latest checkpoint payload of a single stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamState {
    /// The stream
    pub stream: StreamKey,
    /// Its latest checkpoint payload
    pub data: serde_json::Value,
}

/// The resumable state built from all ingested checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "states", rename_all = "snake_case")]
pub enum AggregatedState {
    /// The latest sync-wide checkpoint
    Global(serde_json::Value),
    /// The latest checkpoint of every stream, ordered by stream key
    PerStream(Vec<StreamState>),
}

#[derive(Debug, Clone, Default)]
enum Aggregate {
    #[default]
    Empty,
    Global(serde_json::Value),
    PerStream(BTreeMap<StreamKey, serde_json::Value>),
}

/// Default aggregation: latest global state, or latest state per stream.
///
/// A checkpoint of the other kind resets the aggregate to that kind.
#[derive(Debug, Clone, Default)]
pub struct DefaultStateAggregator {
    aggregate: Aggregate,
}

impl DefaultStateAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateAggregator for DefaultStateAggregator {
    fn ingest(&mut self, checkpoint: &Checkpoint) {
        match (&mut self.aggregate, &checkpoint.scope) {
            (Aggregate::PerStream(states), Scope::Stream(stream)) => {
                states.insert(stream.clone(), checkpoint.data.clone());
            }
            (aggregate, Scope::Stream(stream)) => {
                if matches!(aggregate, Aggregate::Global(_)) {
                    tracing::warn!("Stream checkpoint replaces aggregated global checkpoint");
                }
                let mut states = BTreeMap::new();
                states.insert(stream.clone(), checkpoint.data.clone());
                *aggregate = Aggregate::PerStream(states);
            }
            (aggregate, Scope::Global) => {
                if matches!(aggregate, Aggregate::PerStream(_)) {
                    tracing::warn!("Global checkpoint replaces aggregated stream checkpoints");
                }
                *aggregate = Aggregate::Global(checkpoint.data.clone());
            }
        }
    }

    fn aggregated(&self) -> Option<AggregatedState> {
        match &self.aggregate {
            Aggregate::Empty => None,
            Aggregate::Global(data) => Some(AggregatedState::Global(data.clone())),
            Aggregate::PerStream(states) => Some(AggregatedState::PerStream(
                states
                    .iter()
                    .map(|(stream, data)| StreamState {
                        stream: stream.clone(),
                        data: data.clone(),
                    })
                    .collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_aggregator_has_no_state() {
        let aggregator = DefaultStateAggregator::new();
        assert_eq!(aggregator.aggregated(), None);
    }

    #[test]
    fn global_checkpoints_keep_latest() {
        let mut aggregator = DefaultStateAggregator::new();
        aggregator.ingest(&Checkpoint::global(json!({"lsn": 1})));
        aggregator.ingest(&Checkpoint::global(json!({"lsn": 2})));

        assert_eq!(
            aggregator.aggregated(),
            Some(AggregatedState::Global(json!({"lsn": 2})))
        );
    }

    #[test]
    fn stream_checkpoints_keep_latest_per_stream() {
        let mut aggregator = DefaultStateAggregator::new();
        aggregator.ingest(&Checkpoint::stream(StreamKey::new("b"), json!({"c": 1})));
        aggregator.ingest(&Checkpoint::stream(StreamKey::new("a"), json!({"c": 1})));
        aggregator.ingest(&Checkpoint::stream(StreamKey::new("b"), json!({"c": 2})));

        assert_eq!(
            aggregator.aggregated(),
            Some(AggregatedState::PerStream(vec![
                StreamState {
                    stream: StreamKey::new("a"),
                    data: json!({"c": 1}),
                },
                StreamState {
                    stream: StreamKey::new("b"),
                    data: json!({"c": 2}),
                },
            ]))
        );
    }

    #[test]
    fn switching_kind_resets_aggregate() {
        let mut aggregator = DefaultStateAggregator::new();
        aggregator.ingest(&Checkpoint::stream(StreamKey::new("a"), json!({"c": 1})));
        aggregator.ingest(&Checkpoint::global(json!({"lsn": 5})));

        assert_eq!(
            aggregator.aggregated(),
            Some(AggregatedState::Global(json!({"lsn": 5})))
        );

        aggregator.ingest(&Checkpoint::stream(StreamKey::new("b"), json!({"c": 9})));
        assert!(matches!(
            aggregator.aggregated(),
            Some(AggregatedState::PerStream(states)) if states.len() == 1
        ));
    }
}
