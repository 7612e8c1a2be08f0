//! # Timeline Domain
//!
//! Error taxonomy and invariants for the commit timeline.

pub mod errors;
pub mod invariants;

pub use errors::{StoreError, TimelineError};
