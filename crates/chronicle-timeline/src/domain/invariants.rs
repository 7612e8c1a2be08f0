//! # Domain Invariants
//!
//! Business rules that must always hold for the timeline.

use chronicle_types::{ChangeRecord, TableName};

use super::errors::TimelineError;

/// Default utilization threshold below which compaction triggers.
pub const DEFAULT_COMPACTION_THRESHOLD: f64 = 0.70;

/// Invariant: a commit must carry at least one change.
///
/// Rejected before any state mutation.
pub fn invariant_commit_non_empty(
    table: &TableName,
    changes: &[ChangeRecord],
) -> Result<(), TimelineError> {
    if changes.is_empty() {
        return Err(TimelineError::EmptyCommit {
            table: table.clone(),
        });
    }
    Ok(())
}

/// Invariant: compaction runs only when the index is fragmented enough to
/// be worth rebuilding — utilization under the threshold and the tree past
/// the minimum leaf count.
pub fn compaction_due(
    utilization: f64,
    threshold: f64,
    leaf_nodes: usize,
    min_leaves: usize,
) -> bool {
    utilization < threshold && leaf_nodes >= min_leaves
}
