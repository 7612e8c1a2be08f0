//! # Index Errors
//!
//! Error types for the Merkle index structures.

use chronicle_types::CommitKey;
use thiserror::Error;

/// Errors from index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A key was inserted twice. Commit sequences make keys unique by
    /// construction, so this indicates a caller bug, not a runtime state.
    #[error("Duplicate key: {key}")]
    DuplicateKey {
        /// The offending key.
        key: CommitKey,
    },

    /// No entry exists under this key.
    #[error("Key not found: {key}")]
    KeyNotFound {
        /// The requested key.
        key: CommitKey,
    },

    /// A proof was requested for a leaf index past the end.
    #[error("Leaf index {index} out of range: {count} leaves")]
    LeafOutOfRange {
        /// Requested leaf index.
        index: usize,
        /// Number of leaves present.
        count: usize,
    },

    /// Bulk load input was not strictly ordered by key.
    #[error("Bulk load input unsorted at position {position}")]
    UnsortedLoad {
        /// First out-of-order position.
        position: usize,
    },
}
