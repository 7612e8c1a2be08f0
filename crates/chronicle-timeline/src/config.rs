//! # Timeline Configuration

use serde::{Deserialize, Serialize};

use crate::domain::invariants::DEFAULT_COMPACTION_THRESHOLD;

/// Configuration for the timeline service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Max entries per leaf and max keys per internal node.
    pub node_capacity: usize,

    /// Utilization below which compaction triggers automatically.
    pub compaction_threshold: f64,

    /// Minimum leaf nodes before auto-compaction is considered; keeps
    /// tiny trees from being rebuilt on every commit.
    pub compaction_min_leaves: usize,

    /// Target leaf fill for compaction's bulk load, as a fraction of
    /// capacity.
    pub compaction_fill: f64,

    /// Run compaction automatically after commits. Explicit
    /// `compact()` calls work either way.
    pub auto_compact: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            node_capacity: 32,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            compaction_min_leaves: 4,
            compaction_fill: 0.9,
            auto_compact: true,
        }
    }
}

impl TimelineConfig {
    /// Config for tests: small nodes so splits and compaction happen
    /// within a handful of commits.
    pub fn for_testing() -> Self {
        Self {
            node_capacity: 4,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            compaction_min_leaves: 2,
            compaction_fill: 1.0,
            auto_compact: true,
        }
    }
}
