//! # Merkle Proofs
//!
//! Self-contained inclusion proofs: a target hash plus the ordered sibling
//! hashes needed to recompute a root, each tagged with the side the
//! sibling sits on. Verification is a single leaf-to-root fold.

use serde::{Deserialize, Serialize};

use crate::hashing::hash_pair;
use chronicle_types::Hash;

/// Side a proof sibling sits on.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Position {
    /// Sibling is on the left: parent = H(sibling || current).
    Left,
    /// Sibling is on the right: parent = H(current || sibling).
    Right,
}

/// One step of a proof path.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofStep {
    /// Hash of the sibling subtree.
    pub hash: Hash,
    /// Which side the sibling is on.
    pub position: Position,
}

impl ProofStep {
    /// A left sibling.
    pub fn left(hash: Hash) -> Self {
        Self {
            hash,
            position: Position::Left,
        }
    }

    /// A right sibling.
    pub fn right(hash: Hash) -> Self {
        Self {
            hash,
            position: Position::Right,
        }
    }
}

/// Inclusion proof for one commit.
///
/// Self-contained: [`MerkleProof::compute_root`] folds the target through
/// the steps; no tree access is needed to verify.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof {
    /// Hash being proven (the commit hash).
    pub target: Hash,
    /// Ordered sibling steps, leaf to root.
    pub steps: Vec<ProofStep>,
    /// Root the proof was generated against.
    pub root: Hash,
}

impl MerkleProof {
    /// Create a proof.
    pub fn new(target: Hash, steps: Vec<ProofStep>, root: Hash) -> Self {
        Self {
            target,
            steps,
            root,
        }
    }

    /// Fold the target through the sibling steps.
    pub fn compute_root(&self) -> Hash {
        let mut current = self.target;
        for step in &self.steps {
            current = match step.position {
                Position::Left => hash_pair(&step.hash, &current),
                Position::Right => hash_pair(&current, &step.hash),
            };
        }
        current
    }

    /// True when the recomputed root equals `expected_root`.
    pub fn verify(&self, expected_root: &Hash) -> bool {
        self.compute_root() == *expected_root
    }

    /// True when the recomputed root equals the root carried at
    /// generation time.
    pub fn verify_self(&self) -> bool {
        self.verify(&self.root)
    }
}
