//! # Domain Errors
//!
//! Error types for the incremental processor.
//!
//! Timeline errors propagate wrapped with table and operation context,
//! the original error preserved as the source.

use chronicle_timeline::TimelineError;
use chronicle_types::{CommitId, TableName, Timestamp, TypesError};
use thiserror::Error;

/// Errors from incremental processing.
#[derive(Debug, Error)]
pub enum IncrementalError {
    /// A watermark update tried to move backwards (or stand still).
    /// Watermarks are monotonic by contract.
    #[error(
        "Watermark regression on table '{table}': requested {requested}, current {current}"
    )]
    WatermarkRegression {
        /// Table whose watermark was targeted.
        table: TableName,
        /// Rejected value.
        requested: Timestamp,
        /// Stored watermark.
        current: Timestamp,
    },

    /// A timeline call failed.
    #[error("Timeline error during {operation} on table '{table}'")]
    Timeline {
        /// Table the operation targeted.
        table: TableName,
        /// Operation name.
        operation: &'static str,
        /// Underlying timeline error.
        #[source]
        source: TimelineError,
    },

    /// A commit payload did not decode into change records.
    #[error("Failed to decode changes of commit {commit}")]
    Decode {
        /// Owning commit.
        commit: CommitId,
        /// Codec failure.
        #[source]
        source: TypesError,
    },

    /// The consumer's handler failed; the watermark was not advanced.
    #[error("Handler failed for table '{table}'")]
    Handler {
        /// Table being processed.
        table: TableName,
        /// Handler error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
