//! # Domain Entities
//!
//! Commit identity, commit records, snapshots, and watermarks.
//!
//! All entities here are immutable once constructed: a commit is never
//! mutated after it enters the timeline, only physically relocated by
//! compaction.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Hash;

/// Engine timestamp: signed 64-bit integer in a caller-defined unit
/// (epoch seconds recommended). The engine performs no calendar
/// arithmetic, only ordering.
pub type Timestamp = i64;

/// Name of a table in the engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableName(pub String);

impl TableName {
    /// Create a table name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 digest of the table name bytes.
    pub fn digest(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hasher.finalize().into()
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identity of a commit: (table, timestamp, sequence).
///
/// The monotonic per-table sequence guarantees a total order even for
/// commits sharing a timestamp. Ordering is derived field order:
/// table, then timestamp, then sequence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitKey {
    /// Table the commit belongs to.
    pub table: TableName,
    /// Commit timestamp (caller-supplied or wall clock at commit time).
    pub timestamp: Timestamp,
    /// Per-table monotonic sequence number.
    pub sequence: u64,
}

impl CommitKey {
    /// Create a commit key.
    pub fn new(table: impl Into<TableName>, timestamp: Timestamp, sequence: u64) -> Self {
        Self {
            table: table.into(),
            timestamp,
            sequence,
        }
    }

    /// Canonical byte encoding used for hashing: table bytes, then
    /// little-endian timestamp and sequence.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.table.0.len() + 16);
        bytes.extend_from_slice(self.table.0.as_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.sequence.to_le_bytes());
        bytes
    }
}

impl std::fmt::Display for CommitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{}", self.table, self.timestamp, self.sequence)
    }
}

/// External identifier for a commit.
///
/// A commit's identity is its key: derivable, stable across compaction,
/// and needing no side table.
pub type CommitId = CommitKey;

/// An immutable, timestamped batch of changes recorded against a table.
///
/// The payload is the bincode-encoded change list, opaque to every layer
/// except the incremental processor. `payload_hash` is the SHA-256 of the
/// payload bytes and is the integrity anchor for tamper detection.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    /// Commit identity.
    pub key: CommitKey,
    /// Opaque serialized change log.
    pub payload: Vec<u8>,
    /// SHA-256 of `payload`.
    pub payload_hash: Hash,
}

impl Commit {
    /// Create a commit, hashing the payload.
    pub fn new(key: CommitKey, payload: Vec<u8>) -> Self {
        let payload_hash = crate::changes::payload_hash(&payload);
        Self {
            key,
            payload,
            payload_hash,
        }
    }

    /// The commit hash: SHA-256 over the canonical key bytes and the
    /// payload hash. This is the leaf the Merkle history is built from.
    pub fn commit_hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.key.canonical_bytes());
        hasher.update(self.payload_hash);
        hasher.finalize().into()
    }

    /// Recompute the payload hash from the payload bytes and compare to
    /// the recorded one. False means the payload was altered after the
    /// commit was sealed.
    pub fn payload_intact(&self) -> bool {
        crate::changes::payload_hash(&self.payload) == self.payload_hash
    }
}

/// A named, immutable record of the engine root at a point in time.
///
/// Created on demand, never auto-deleted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Snapshot name (unique).
    pub name: String,
    /// Timestamp the snapshot covers: all commits with timestamp <= this.
    pub timestamp: Timestamp,
    /// Engine root hash over the covered history.
    pub root_hash: Hash,
}

impl Snapshot {
    /// Create a snapshot record.
    pub fn new(name: impl Into<String>, timestamp: Timestamp, root_hash: Hash) -> Self {
        Self {
            name: name.into(),
            timestamp,
            root_hash,
        }
    }
}

/// A consumer's per-table progress marker: changes up to and including
/// this timestamp have been processed. Monotonically non-decreasing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Watermark {
    /// Consumer that owns this watermark.
    pub consumer: String,
    /// Table the watermark applies to.
    pub table: TableName,
    /// Last processed timestamp.
    pub timestamp: Timestamp,
}
