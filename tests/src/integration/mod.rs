//! # Integration Tests
//!
//! Cross-crate flows: timeline + index + incremental processor working
//! against the in-memory store adapter.

pub mod compaction;
pub mod incremental;
pub mod integrity;
pub mod time_travel;
