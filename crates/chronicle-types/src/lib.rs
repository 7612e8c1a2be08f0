//! # Chronicle Shared Types
//!
//! Domain entities shared across the engine crates.
//!
//! ## Purpose
//!
//! Single source of truth for the types that cross crate boundaries:
//! - Commit identity ([`CommitKey`], [`CommitId`]) and commit records ([`Commit`])
//! - Snapshot records ([`Snapshot`])
//! - The change-record payload codec ([`ChangeRecord`], [`encode_changes`],
//!   [`decode_changes`])
//!
//! Commit payloads are encoded exactly once, at the timeline boundary, and
//! decoded exactly once, by the incremental processor. Everything in between
//! treats the payload as opaque bytes anchored by its SHA-256 hash.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod changes;
pub mod entities;
pub mod errors;

pub use changes::{decode_changes, encode_changes, payload_hash, ChangeRecord, ColumnValue, ScalarValue};
pub use entities::{Commit, CommitId, CommitKey, Snapshot, TableName, Timestamp, Watermark};
pub use errors::TypesError;

/// 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// The root hash of an empty structure.
pub const EMPTY_ROOT: Hash = [0u8; 32];
