//! # Chronicle Timeline
//!
//! The commit log over the Merkle index: appends commits, answers
//! time-travel queries, tracks snapshots and watermarks, verifies
//! integrity, and keeps the index compact as history grows.
//!
//! ## Module Structure
//!
//! ```text
//! chronicle-timeline/
//! ├── domain/          # Errors and invariants
//! ├── ports/           # Outbound dependencies: key-value store, time source
//! ├── compaction.rs    # Rebuild-packed-and-verify pass
//! ├── persistence.rs   # Record keys, framing, load
//! ├── config.rs        # TimelineConfig
//! └── service.rs       # TimelineService orchestrating everything
//! ```
//!
//! ## Consistency contract
//!
//! Single writer per table; reads run concurrently against the state
//! behind a reader/writer lock and never observe a torn tree — compaction
//! builds its replacement off to the side and swaps it in under the write
//! lock. The engine root is re-derived from commit contents on load and
//! never trusted from disk.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compaction;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod ports;
pub mod service;

pub use config::TimelineConfig;
pub use domain::errors::{StoreError, TimelineError};
pub use ports::outbound::{
    FixedTimeSource, InMemoryKVStore, KeyValueStore, SystemTimeSource, TimeSource,
};
pub use service::{TableStats, TimelineService, TimelineStats, VerifyOutcome, VerifyRequest};
