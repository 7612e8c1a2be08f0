//! # Domain Errors
//!
//! Error types for timeline operations.
//!
//! ## Design Principles
//!
//! - Usage errors are rejected synchronously, before any mutation
//! - Integrity errors are never downgraded or auto-repaired
//! - Not-found errors stay distinct from integrity errors
//! - Index errors propagate with table and operation context attached,
//!   the original error preserved as the source

use chronicle_index::IndexError;
use chronicle_types::{CommitKey, TableName, TypesError};
use thiserror::Error;

/// Errors from timeline operations.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// A commit carried no changes.
    #[error("Empty commit rejected for table '{table}'")]
    EmptyCommit {
        /// Target table.
        table: TableName,
    },

    /// The named table has no commits.
    #[error("Table not found: '{table}'")]
    TableNotFound {
        /// Requested table.
        table: TableName,
    },

    /// No commit exists under this id.
    #[error("Commit not found: {key}")]
    CommitNotFound {
        /// Requested commit id.
        key: CommitKey,
    },

    /// A snapshot with this name already exists.
    #[error("Snapshot '{name}' already exists")]
    DuplicateSnapshot {
        /// Offending name.
        name: String,
    },

    /// No snapshot with this name.
    #[error("Snapshot not found: '{name}'")]
    SnapshotNotFound {
        /// Requested name.
        name: String,
    },

    /// Change list could not be encoded into a commit payload.
    #[error("Failed to encode changes for table '{table}'")]
    Encode {
        /// Target table.
        table: TableName,
        /// Codec failure.
        #[source]
        source: TypesError,
    },

    /// An index operation failed; table and operation give the context,
    /// the source carries the original error unchanged.
    #[error("Index error during {operation} on table '{table}'")]
    Index {
        /// Table the operation targeted.
        table: TableName,
        /// Operation name.
        operation: &'static str,
        /// Underlying index error.
        #[source]
        source: IndexError,
    },

    /// Key-value store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A persisted metadata record failed its checksum or did not decode.
    #[error("Data corruption in record '{record}': {message}")]
    DataCorruption {
        /// Record key.
        record: String,
        /// What failed.
        message: String,
    },

    /// Compaction produced a tree whose root differs from the live one.
    /// The pre-compaction tree stays active.
    #[error("Compaction aborted for table '{table}': rebuilt root differs")]
    CompactionRootMismatch {
        /// Table being compacted.
        table: TableName,
    },
}

/// Key-value store errors.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O failure during read or write.
    #[error("Store I/O error: {message}")]
    Io {
        /// Adapter message.
        message: String,
    },

    /// The store reported corrupt data.
    #[error("Store corruption: {message}")]
    Corruption {
        /// Adapter message.
        message: String,
    },
}
