//! # Compaction
//!
//! Rebuilds a table's index packed to the target fill factor without
//! changing the root its commit set produces.
//!
//! The pass is all-or-nothing: the replacement tree is built and verified
//! off to the side, and the caller swaps it in only on success. Any
//! failure leaves the pre-compaction tree active.

use chronicle_index::MerkleBPlusTree;
use chronicle_types::TableName;

use crate::config::TimelineConfig;
use crate::domain::errors::TimelineError;
use crate::domain::invariants::compaction_due;

/// True when the tree is fragmented enough for an automatic pass.
pub fn should_compact(tree: &MerkleBPlusTree, config: &TimelineConfig) -> bool {
    compaction_due(
        tree.utilization(),
        config.compaction_threshold,
        tree.leaf_node_count(),
        config.compaction_min_leaves,
    )
}

/// Build the packed replacement for a table's tree and confirm it
/// produces the same root as the live tree and passes the structural
/// self-check. The live tree is untouched.
pub fn rebuild_packed(
    table: &TableName,
    tree: &MerkleBPlusTree,
    config: &TimelineConfig,
) -> Result<MerkleBPlusTree, TimelineError> {
    let commits = tree.entries();
    let rebuilt = MerkleBPlusTree::bulk_load(commits, config.node_capacity, config.compaction_fill)
        .map_err(|e| TimelineError::Index {
            table: table.clone(),
            operation: "compaction",
            source: e,
        })?;

    if rebuilt.root_hash() != tree.root_hash() || !rebuilt.verify_structure() {
        return Err(TimelineError::CompactionRootMismatch {
            table: table.clone(),
        });
    }

    tracing::debug!(
        table = %table,
        nodes_before = tree.node_count(),
        nodes_after = rebuilt.node_count(),
        utilization_before = tree.utilization(),
        utilization_after = rebuilt.utilization(),
        "compaction pass built replacement tree"
    );
    Ok(rebuilt)
}
