//! # Chronicle Incremental
//!
//! Watermark-bounded, proof-carrying change-data-capture over the
//! timeline.
//!
//! ## Purpose
//!
//! Consumers ask "what changed since my watermark" and get back a
//! [`ChangeSet`]: typed changes decoded from commit payloads, each
//! carrying the owning commit's inclusion proof, plus the engine root the
//! batch was cut against. Watermarks are per-consumer, monotonically
//! non-decreasing, and persist with the timeline, so a restarted consumer
//! resumes exactly where it stopped.
//!
//! Delivery is at-least-once: the watermark advances only after the
//! consumer's handler succeeds, so replay after a crash is possible and
//! handlers must be idempotent.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod processor;

pub use domain::change_set::{Change, ChangeSet, ChangeSetProof};
pub use domain::errors::IncrementalError;
pub use processor::{IncrementalProcessor, ProcessOutcome};
