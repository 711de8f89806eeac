//! # sync-types
//!
//! Protocol message types for syncledger.
//!
//! This crate provides the foundational types used across syncledger crates:
//! - [`StreamKey`], [`Scope`] - Stream identity and checkpoint addressing
//! - [`CheckpointHash`] - Content identity of a checkpoint payload
//! - [`Message`] - Protocol messages (Record, Checkpoint, Estimate, ErrorTrace)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod ids;
mod messages;

pub use ids::{CheckpointHash, Scope, StreamKey};
pub use messages::{Checkpoint, ErrorTrace, Estimate, Message, Record, TraceFailureType};
