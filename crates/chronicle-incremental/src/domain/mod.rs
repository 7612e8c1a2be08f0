//! # Incremental Domain
//!
//! Change sets and the processor's error taxonomy.

pub mod change_set;
pub mod errors;

pub use change_set::{Change, ChangeSet, ChangeSetProof};
pub use errors::IncrementalError;
