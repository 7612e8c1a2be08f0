//! # Chronicle Index
//!
//! The ordered, hash-indexed structure under the commit timeline.
//!
//! ## Purpose
//!
//! Two cooperating structures over one commit sequence:
//!
//! - [`MerkleBPlusTree`] — an arena-allocated B+ tree keyed by
//!   [`CommitKey`](chronicle_types::CommitKey), giving O(log n) inserts,
//!   point lookups, and range queries. Every node caches a structural hash
//!   of its subtree, recomputed from the touched leaf up to the root,
//!   children before parents.
//! - [`CommitAccumulator`] — a Merkle mountain range over the commit
//!   hashes in key order. Its bagged-peaks root is a pure function of the
//!   ordered commit sequence, so it is invariant under physical
//!   reorganization: a bulk-loaded tree and an incrementally built tree
//!   over the same commits produce the same root.
//!
//! ## Module Structure
//!
//! ```text
//! chronicle-index/
//! ├── hashing.rs      # hash_pair / hash_children primitives
//! ├── accumulator.rs  # CommitAccumulator (mountain range)
//! ├── proofs.rs       # MerkleProof, ProofStep, Position
//! ├── tree.rs         # MerkleBPlusTree (arena B+ tree)
//! └── errors.rs       # IndexError
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accumulator;
pub mod errors;
pub mod hashing;
pub mod proofs;
pub mod tree;

pub use accumulator::CommitAccumulator;
pub use errors::IndexError;
pub use hashing::{hash_children, hash_pair};
pub use proofs::{MerkleProof, Position, ProofStep};
pub use tree::MerkleBPlusTree;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
