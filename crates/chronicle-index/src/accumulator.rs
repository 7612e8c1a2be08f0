//! # Commit Accumulator
//!
//! A Merkle mountain range over commit hashes in key order.
//!
//! ## Algorithm
//!
//! Leaves are appended left to right. Whenever two adjacent subtrees of
//! equal height exist, their parent is materialized, so the forest always
//! holds one perfect subtree per set bit of the leaf count ("peaks"). The
//! exposed root bags the peaks right to left with [`hash_pair`].
//!
//! Because the root depends only on the ordered leaf sequence, it is
//! invariant under any physical reorganization of the index that preserves
//! commit order — the property compaction relies on.
//!
//! Proofs climb the leaf's peak collecting siblings, then fold the other
//! peaks in as two further step groups, so a proof verifies with the same
//! plain leaf-to-root fold as any other Merkle proof.

use crate::errors::IndexError;
use crate::hashing::hash_pair;
use crate::proofs::ProofStep;
use chronicle_types::{Hash, EMPTY_ROOT};

/// Append-only Merkle accumulator over an ordered hash sequence.
#[derive(Debug, Clone, Default)]
pub struct CommitAccumulator {
    /// levels[0] holds the leaves; levels[h] holds parents of pairs at
    /// h - 1. Invariant: levels[h + 1].len() == levels[h].len() / 2.
    levels: Vec<Vec<Hash>>,
    /// Cached bag-of-peaks root.
    root: Hash,
}

impl CommitAccumulator {
    /// Create an empty accumulator. Its root is the zero constant.
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            root: EMPTY_ROOT,
        }
    }

    /// Build an accumulator from leaves in order.
    pub fn from_leaves<I: IntoIterator<Item = Hash>>(leaves: I) -> Self {
        let mut acc = Self::new();
        for leaf in leaves {
            acc.append(leaf);
        }
        acc
    }

    /// Number of leaves appended so far.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// True when no leaf has been appended.
    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }

    /// The cached root: zero for an empty accumulator, otherwise the
    /// peaks bagged right to left.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Append a leaf, materializing any newly completed parents.
    /// Returns the 0-based leaf index.
    pub fn append(&mut self, leaf: Hash) -> usize {
        if self.levels.is_empty() {
            self.levels.push(Vec::new());
        }
        self.levels[0].push(leaf);
        let index = self.levels[0].len() - 1;

        // Merge equal-height subtrees bottom-up.
        let mut h = 0;
        while self.levels[h].len() % 2 == 0 {
            let n = self.levels[h].len();
            let parent = hash_pair(&self.levels[h][n - 2], &self.levels[h][n - 1]);
            if self.levels.len() == h + 1 {
                self.levels.push(Vec::new());
            }
            self.levels[h + 1].push(parent);
            h += 1;
        }

        self.root = self.bag_peaks();
        index
    }

    /// Discard all state and rebuild from leaves in order. Used when a
    /// commit lands out of key order and the sequence must be re-derived.
    pub fn rebuild<I: IntoIterator<Item = Hash>>(&mut self, leaves: I) {
        *self = Self::from_leaves(leaves);
    }

    /// Current peaks, left to right: one perfect subtree per set bit of
    /// the leaf count.
    pub fn peaks(&self) -> Vec<Hash> {
        let n = self.leaf_count();
        let mut peaks = Vec::new();
        let mut consumed = 0usize;
        for h in (0..usize::BITS as usize).rev() {
            if n & (1 << h) != 0 {
                peaks.push(self.levels[h][consumed >> h]);
                consumed += 1 << h;
            }
        }
        peaks
    }

    /// Generate the proof steps for the leaf at `index`.
    pub fn proof_steps(&self, index: usize) -> Result<Vec<ProofStep>, IndexError> {
        let n = self.leaf_count();
        if index >= n {
            return Err(IndexError::LeafOutOfRange { index, count: n });
        }

        // Locate the peak subtree containing the leaf.
        let mut peak_height = 0;
        let mut peak_start = 0;
        let mut peak_ordinal = 0;
        let mut consumed = 0usize;
        let mut ordinal = 0usize;
        for h in (0..usize::BITS as usize).rev() {
            if n & (1 << h) != 0 {
                if index < consumed + (1 << h) {
                    peak_height = h;
                    peak_start = consumed;
                    peak_ordinal = ordinal;
                    break;
                }
                consumed += 1 << h;
                ordinal += 1;
            }
        }

        // Climb the peak, collecting the sibling at each level.
        let mut steps = Vec::with_capacity(peak_height + 2);
        let mut local = index - peak_start;
        for h in 0..peak_height {
            let sibling = self.levels[h][(peak_start >> h) + (local ^ 1)];
            if local % 2 == 0 {
                steps.push(ProofStep::right(sibling));
            } else {
                steps.push(ProofStep::left(sibling));
            }
            local >>= 1;
        }

        // Fold the remaining peaks in: the bag of everything to the right
        // as one right-sibling, then each peak to the left in turn.
        let peaks = self.peaks();
        if peak_ordinal + 1 < peaks.len() {
            let mut right_bag = peaks[peaks.len() - 1];
            for peak in peaks[peak_ordinal + 1..peaks.len() - 1].iter().rev() {
                right_bag = hash_pair(peak, &right_bag);
            }
            steps.push(ProofStep::right(right_bag));
        }
        for peak in peaks[..peak_ordinal].iter().rev() {
            steps.push(ProofStep::left(*peak));
        }

        Ok(steps)
    }

    /// Bag the peaks right to left into a single root.
    fn bag_peaks(&self) -> Hash {
        let peaks = self.peaks();
        match peaks.split_last() {
            None => EMPTY_ROOT,
            Some((last, rest)) => {
                let mut root = *last;
                for peak in rest.iter().rev() {
                    root = hash_pair(peak, &root);
                }
                root
            }
        }
    }
}
