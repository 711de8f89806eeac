//! # sync-core
//!
//! Checkpoint bookkeeping for syncledger (no I/O, instant tests).
//!
//! This crate answers, at any point of a sync, how many records the source
//! has emitted, how many the destination has durably committed, and how
//! long checkpoints take to go from emitted to committed.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take messages and
//! timestamps as input and update in-memory counters. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (timestamps are injectable)
//! - Bounded memory (every ledger has a fixed byte budget)
//!
//! Reading messages off the wire and persisting results is done by the
//! surrounding worker, which feeds [`MessageTracker`] from one dispatch loop.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregator;
pub mod config;
pub mod delta;
pub mod failure;
pub mod latency;
pub mod streams;
pub mod tracker;

pub use aggregator::{AggregatedState, DefaultStateAggregator, StateAggregator, StreamState};
pub use config::{ConfigError, TrackerConfig};
pub use delta::{DeltaError, DeltaTracker};
pub use failure::{FailureOrigin, FailureReason, FailureType};
pub use latency::{calculate_mean, LatencyError, LatencyTracker};
pub use streams::{StreamIndex, StreamRegistry};
pub use tracker::{estimated_byte_size, MessageTracker, TrackerError};
