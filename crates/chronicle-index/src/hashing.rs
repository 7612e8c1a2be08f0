//! # Hash Primitives
//!
//! The deterministic combination of child hashes into a parent hash. Every
//! integrity guarantee in the engine rests on these three functions.

use sha2::{Digest, Sha256};

use chronicle_types::{Hash, EMPTY_ROOT};

/// Hash two child digests into a parent digest: SHA256(left || right).
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Hash an ordered child list into a node digest: SHA256 over the
/// concatenated child hashes. Empty input yields the empty-root constant.
pub fn hash_children(children: &[Hash]) -> Hash {
    if children.is_empty() {
        return EMPTY_ROOT;
    }
    let mut hasher = Sha256::new();
    for child in children {
        hasher.update(child);
    }
    hasher.finalize().into()
}
