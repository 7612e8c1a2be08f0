//! # Change Sets
//!
//! The unit of incremental delivery: an ordered batch of typed changes
//! bounded by watermarks and tied to the engine root it was cut against.

use serde::{Deserialize, Serialize};

use chronicle_index::MerkleProof;
use chronicle_types::{ChangeRecord, CommitId, Hash, TableName, Timestamp};

/// One typed change, with the inclusion proof of its owning commit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Change {
    /// The commit this change came from.
    pub commit: CommitId,
    /// The decoded change operation.
    pub record: ChangeRecord,
    /// Inclusion proof for the owning commit, bound to the engine root
    /// at batch creation.
    pub proof: MerkleProof,
}

/// Aggregate proof tying a batch to the timeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeSetProof {
    /// Engine root at batch creation time.
    pub root: Hash,
    /// Commits covered by the batch, in order.
    pub commits: Vec<CommitId>,
}

/// An ordered batch of changes with its resulting watermark.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Table the changes belong to.
    pub table: TableName,
    /// Watermark the batch was requested from (exclusive lower bound).
    pub since: Timestamp,
    /// Resulting watermark: timestamp of the last included commit, or
    /// `since` unchanged when the batch is empty.
    pub watermark: Timestamp,
    /// The changes, in commit order.
    pub changes: Vec<Change>,
    /// Aggregate proof for the batch.
    pub proof: ChangeSetProof,
}

impl ChangeSet {
    /// Number of changes in the batch.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// True when the batch carries no change.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
