//! # Ports
//!
//! Interfaces the timeline requires the host application to provide.

pub mod outbound;

pub use outbound::{FixedTimeSource, InMemoryKVStore, KeyValueStore, SystemTimeSource, TimeSource};
