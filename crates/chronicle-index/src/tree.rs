//! # Merkle-Indexed B+ Tree
//!
//! An arena-allocated B+ tree keyed by commit key, with a cached
//! structural hash on every node and a commit accumulator beside it.
//!
//! ## Structure
//!
//! Nodes live in a flat arena addressed by index; node lifetime is the
//! arena's lifetime, and rebuilding is "build new arena, swap". Leaves
//! hold sorted commits; internal nodes hold separator keys, child ids,
//! and each child's cached subtree hash. A node's stored hash always
//! equals the hash of its children's hashes in order once a mutation
//! completes — insert recomputes from the touched leaf up to the root,
//! children before parents.
//!
//! The separator convention: `keys[i]` is the smallest key reachable
//! under `children[i + 1]`, so descent takes `children[partition_point
//! (k <= key)]`.
//!
//! [`MerkleBPlusTree::root_hash`] is the accumulator root over the commit
//! sequence, not the physical root's structural hash — see the
//! [`accumulator`](crate::accumulator) module for why layout independence
//! matters.

use crate::accumulator::CommitAccumulator;
use crate::errors::IndexError;
use crate::hashing::hash_children;
use crate::proofs::MerkleProof;
use chronicle_types::{Commit, CommitKey, Hash, EMPTY_ROOT};

/// Arena index of a node.
type NodeId = usize;

/// Smallest supported node capacity.
const MIN_CAPACITY: usize = 3;

/// A tree node: a sorted run of commits, or separators over children.
#[derive(Debug, Clone)]
enum Node {
    Leaf {
        /// Commits in key order.
        entries: Vec<Commit>,
        /// Cached hash over the entry commit hashes.
        hash: Hash,
    },
    Internal {
        /// Separator keys; `keys[i]` = min key under `children[i + 1]`.
        keys: Vec<CommitKey>,
        /// Child node ids, one more than keys.
        children: Vec<NodeId>,
        /// Cached subtree hash per child, parallel to `children`.
        child_hashes: Vec<Hash>,
        /// Total commits under this subtree.
        count: usize,
        /// Cached hash over `child_hashes`.
        hash: Hash,
    },
}

/// Hash of a leaf: its entry commit hashes in order.
fn leaf_digest(entries: &[Commit]) -> Hash {
    let hashes: Vec<Hash> = entries.iter().map(Commit::commit_hash).collect();
    hash_children(&hashes)
}

/// Ordered commit index with Merkle hashing.
#[derive(Debug, Clone)]
pub struct MerkleBPlusTree {
    arena: Vec<Node>,
    root: NodeId,
    /// Total commits stored.
    len: usize,
    /// Number of leaf nodes.
    leaves: usize,
    /// Max entries per leaf and max keys per internal node.
    capacity: usize,
    /// Largest key inserted so far.
    max_key: Option<CommitKey>,
    /// Canonical accumulator over the commit sequence in key order.
    accumulator: CommitAccumulator,
}

impl MerkleBPlusTree {
    /// Create an empty tree with the given node capacity (clamped to a
    /// minimum of 3).
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: vec![Node::Leaf {
                entries: Vec::new(),
                hash: EMPTY_ROOT,
            }],
            root: 0,
            len: 0,
            leaves: 1,
            capacity: capacity.max(MIN_CAPACITY),
            max_key: None,
            accumulator: CommitAccumulator::new(),
        }
    }

    /// Number of commits stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no commit is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of leaf nodes.
    pub fn leaf_node_count(&self) -> usize {
        self.leaves
    }

    /// Node capacity this tree was built with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean leaf fill: stored commits over total leaf slots. An empty
    /// tree reports 1.0 so it never looks fragmented.
    pub fn utilization(&self) -> f64 {
        if self.len == 0 {
            return 1.0;
        }
        self.len as f64 / (self.leaves * self.capacity) as f64
    }

    /// Tree height: 1 for a single leaf.
    pub fn height(&self) -> usize {
        let mut node = self.root;
        let mut height = 1;
        loop {
            match &self.arena[node] {
                Node::Leaf { .. } => return height,
                Node::Internal { children, .. } => {
                    node = children[0];
                    height += 1;
                }
            }
        }
    }

    /// The canonical root hash over the commit sequence. Zero constant
    /// for an empty tree; invariant under physical reorganization.
    pub fn root_hash(&self) -> Hash {
        self.accumulator.root()
    }

    /// The physical root node's structural hash. Changes when the layout
    /// changes; used by the structural self-check, not by consumers.
    pub fn structure_hash(&self) -> Hash {
        self.node_hash(self.root)
    }

    /// Largest key inserted so far.
    pub fn max_key(&self) -> Option<&CommitKey> {
        self.max_key.as_ref()
    }

    fn node_hash(&self, id: NodeId) -> Hash {
        match &self.arena[id] {
            Node::Leaf { hash, .. } | Node::Internal { hash, .. } => *hash,
        }
    }

    fn node_len(&self, id: NodeId) -> usize {
        match &self.arena[id] {
            Node::Leaf { entries, .. } => entries.len(),
            Node::Internal { count, .. } => *count,
        }
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Insert a commit, rejecting duplicate keys.
    ///
    /// Descends by key order, splits a full leaf promoting a separator,
    /// and recomputes cached hashes from the new leaf up to the root. The
    /// accumulator appends in O(log n) when the key extends the sequence;
    /// an out-of-order key triggers a full accumulator rebuild.
    pub fn insert(&mut self, commit: Commit) -> Result<(), IndexError> {
        let key = commit.key.clone();
        let entry_hash = commit.commit_hash();
        let in_order = self.max_key.as_ref().is_none_or(|m| key > *m);

        if let Some((sep, right)) = self.insert_rec(self.root, commit)? {
            let left = self.root;
            let child_hashes = vec![self.node_hash(left), self.node_hash(right)];
            let count = self.node_len(left) + self.node_len(right);
            let hash = hash_children(&child_hashes);
            self.arena.push(Node::Internal {
                keys: vec![sep],
                children: vec![left, right],
                child_hashes,
                count,
                hash,
            });
            self.root = self.arena.len() - 1;
        }

        self.len += 1;
        if in_order {
            self.accumulator.append(entry_hash);
            self.max_key = Some(key);
        } else {
            let hashes = self.commit_hashes();
            self.accumulator.rebuild(hashes);
        }
        Ok(())
    }

    fn insert_rec(
        &mut self,
        node_id: NodeId,
        commit: Commit,
    ) -> Result<Option<(CommitKey, NodeId)>, IndexError> {
        let descend = match &self.arena[node_id] {
            Node::Leaf { .. } => None,
            Node::Internal { keys, children, .. } => {
                let idx = keys.partition_point(|k| *k <= commit.key);
                Some((idx, children[idx]))
            }
        };

        match descend {
            None => self.leaf_insert(node_id, commit),
            Some((idx, child)) => {
                let split = self.insert_rec(child, commit)?;
                Ok(self.internal_absorb(node_id, idx, child, split))
            }
        }
    }

    fn leaf_insert(
        &mut self,
        node_id: NodeId,
        commit: Commit,
    ) -> Result<Option<(CommitKey, NodeId)>, IndexError> {
        let capacity = self.capacity;
        let overflow = {
            let Node::Leaf { entries, hash } = &mut self.arena[node_id] else {
                unreachable!("descent resolved to a leaf");
            };
            match entries.binary_search_by(|e| e.key.cmp(&commit.key)) {
                Ok(_) => {
                    return Err(IndexError::DuplicateKey { key: commit.key });
                }
                Err(pos) => entries.insert(pos, commit),
            }
            if entries.len() > capacity {
                let right_entries = entries.split_off(entries.len() / 2);
                *hash = leaf_digest(entries);
                Some(right_entries)
            } else {
                *hash = leaf_digest(entries);
                None
            }
        };

        match overflow {
            None => Ok(None),
            Some(right_entries) => {
                let sep = right_entries[0].key.clone();
                let right_hash = leaf_digest(&right_entries);
                self.arena.push(Node::Leaf {
                    entries: right_entries,
                    hash: right_hash,
                });
                self.leaves += 1;
                Ok(Some((sep, self.arena.len() - 1)))
            }
        }
    }

    /// Refresh a child's cached hash after its mutation, absorb a child
    /// split if one happened, and split this node when it overflows.
    fn internal_absorb(
        &mut self,
        node_id: NodeId,
        idx: usize,
        child_id: NodeId,
        split: Option<(CommitKey, NodeId)>,
    ) -> Option<(CommitKey, NodeId)> {
        let capacity = self.capacity;
        let child_hash = self.node_hash(child_id);
        let new_child = split.map(|(sep, nid)| (sep, nid, self.node_hash(nid)));

        let overflow = {
            let Node::Internal {
                keys,
                children,
                child_hashes,
                count,
                hash,
            } = &mut self.arena[node_id]
            else {
                unreachable!("absorb called on an internal node");
            };

            child_hashes[idx] = child_hash;
            *count += 1;
            if let Some((sep, nid, nhash)) = new_child {
                keys.insert(idx, sep);
                children.insert(idx + 1, nid);
                child_hashes.insert(idx + 1, nhash);
            }

            if keys.len() > capacity {
                let mid = keys.len() / 2;
                let right_keys = keys.split_off(mid + 1);
                let promoted = keys.remove(mid);
                let right_children = children.split_off(mid + 1);
                let right_child_hashes = child_hashes.split_off(mid + 1);
                *hash = hash_children(child_hashes);
                Some((promoted, right_keys, right_children, right_child_hashes))
            } else {
                *hash = hash_children(child_hashes);
                None
            }
        };

        let (promoted, right_keys, right_children, right_child_hashes) = overflow?;
        let right_count: usize = right_children.iter().map(|&c| self.node_len(c)).sum();
        let right_hash = hash_children(&right_child_hashes);
        self.arena.push(Node::Internal {
            keys: right_keys,
            children: right_children,
            child_hashes: right_child_hashes,
            count: right_count,
            hash: right_hash,
        });
        let right_id = self.arena.len() - 1;
        if let Node::Internal { count, .. } = &mut self.arena[node_id] {
            *count -= right_count;
        }
        Some((promoted, right_id))
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Point lookup.
    pub fn get(&self, key: &CommitKey) -> Option<&Commit> {
        let mut node = self.root;
        loop {
            match &self.arena[node] {
                Node::Leaf { entries, .. } => {
                    return entries
                        .binary_search_by(|e| e.key.cmp(key))
                        .ok()
                        .map(|i| &entries[i]);
                }
                Node::Internal { keys, children, .. } => {
                    node = children[keys.partition_point(|k| k <= key)];
                }
            }
        }
    }

    /// All commits with `low <= key <= high`, in key order. Read-only;
    /// O(log n + k).
    pub fn range_query(&self, low: &CommitKey, high: &CommitKey) -> Vec<Commit> {
        let mut out = Vec::new();
        if low <= high {
            self.range_rec(self.root, low, high, &mut out);
        }
        out
    }

    fn range_rec(&self, node: NodeId, low: &CommitKey, high: &CommitKey, out: &mut Vec<Commit>) {
        match &self.arena[node] {
            Node::Leaf { entries, .. } => {
                let start = entries.partition_point(|e| e.key < *low);
                for entry in &entries[start..] {
                    if entry.key > *high {
                        break;
                    }
                    out.push(entry.clone());
                }
            }
            Node::Internal { keys, children, .. } => {
                for (i, &child) in children.iter().enumerate() {
                    let lower_overlaps = i == 0 || keys[i - 1] <= *high;
                    let upper_overlaps = i == keys.len() || keys[i] > *low;
                    if lower_overlaps && upper_overlaps {
                        self.range_rec(child, low, high, out);
                    }
                }
            }
        }
    }

    /// All commits in key order.
    pub fn entries(&self) -> Vec<Commit> {
        let mut out = Vec::with_capacity(self.len);
        self.collect_rec(self.root, &mut out);
        out
    }

    /// Commit hashes in key order — the accumulator's leaf sequence.
    pub fn commit_hashes(&self) -> Vec<Hash> {
        let mut out = Vec::with_capacity(self.len);
        self.hashes_rec(self.root, &mut out);
        out
    }

    fn collect_rec(&self, node: NodeId, out: &mut Vec<Commit>) {
        match &self.arena[node] {
            Node::Leaf { entries, .. } => out.extend(entries.iter().cloned()),
            Node::Internal { children, .. } => {
                for &child in children {
                    self.collect_rec(child, out);
                }
            }
        }
    }

    fn hashes_rec(&self, node: NodeId, out: &mut Vec<Hash>) {
        match &self.arena[node] {
            Node::Leaf { entries, .. } => out.extend(entries.iter().map(Commit::commit_hash)),
            Node::Internal { children, .. } => {
                for &child in children {
                    self.hashes_rec(child, out);
                }
            }
        }
    }

    /// 0-based position of `key` in the ordered commit sequence.
    pub fn rank(&self, key: &CommitKey) -> Option<usize> {
        let mut node = self.root;
        let mut rank = 0;
        loop {
            match &self.arena[node] {
                Node::Leaf { entries, .. } => {
                    return entries
                        .binary_search_by(|e| e.key.cmp(key))
                        .ok()
                        .map(|i| rank + i);
                }
                Node::Internal { keys, children, .. } => {
                    let idx = keys.partition_point(|k| k <= key);
                    for &child in &children[..idx] {
                        rank += self.node_len(child);
                    }
                    node = children[idx];
                }
            }
        }
    }

    // =========================================================================
    // PROOFS
    // =========================================================================

    /// Generate an inclusion proof for the commit under `key`, bound to
    /// the current root. Proofs are recomputed per call — never cached —
    /// so they cannot go stale silently.
    pub fn generate_proof(&self, key: &CommitKey) -> Result<MerkleProof, IndexError> {
        let commit = self.get(key).ok_or_else(|| IndexError::KeyNotFound {
            key: key.clone(),
        })?;
        let index = self.rank(key).ok_or_else(|| IndexError::KeyNotFound {
            key: key.clone(),
        })?;
        let steps = self.accumulator.proof_steps(index)?;
        Ok(MerkleProof::new(commit.commit_hash(), steps, self.root_hash()))
    }

    // =========================================================================
    // INTEGRITY
    // =========================================================================

    /// Recompute every cached hash bottom-up and compare against the
    /// stored values, and re-derive the accumulator root from the live
    /// entry sequence. False on any mismatch.
    pub fn verify_structure(&self) -> bool {
        match self.verify_rec(self.root) {
            None => false,
            Some((_, count)) => {
                count == self.len
                    && CommitAccumulator::from_leaves(self.commit_hashes()).root()
                        == self.root_hash()
            }
        }
    }

    fn verify_rec(&self, node: NodeId) -> Option<(Hash, usize)> {
        match &self.arena[node] {
            Node::Leaf { entries, hash } => {
                let sorted = entries.windows(2).all(|w| w[0].key < w[1].key);
                let recomputed = leaf_digest(entries);
                (sorted && recomputed == *hash).then_some((recomputed, entries.len()))
            }
            Node::Internal {
                keys,
                children,
                child_hashes,
                count,
                hash,
            } => {
                if children.len() != keys.len() + 1 || children.len() != child_hashes.len() {
                    return None;
                }
                let mut total = 0;
                for (i, &child) in children.iter().enumerate() {
                    let (child_hash, child_count) = self.verify_rec(child)?;
                    if child_hash != child_hashes[i] {
                        return None;
                    }
                    total += child_count;
                }
                let recomputed = hash_children(child_hashes);
                (recomputed == *hash && total == *count).then_some((recomputed, total))
            }
        }
    }

    // =========================================================================
    // BULK LOAD
    // =========================================================================

    /// Build a tree from commits already in strictly increasing key
    /// order, packing leaves to `fill` of capacity. The accumulator is
    /// rebuilt from the same sequence, so the root matches any other
    /// tree over these commits.
    pub fn bulk_load(
        commits: Vec<Commit>,
        capacity: usize,
        fill: f64,
    ) -> Result<Self, IndexError> {
        let capacity = capacity.max(MIN_CAPACITY);
        if let Some(position) = commits.windows(2).position(|w| w[0].key >= w[1].key) {
            return Err(IndexError::UnsortedLoad {
                position: position + 1,
            });
        }
        if commits.is_empty() {
            return Ok(Self::new(capacity));
        }

        let len = commits.len();
        let max_key = commits[len - 1].key.clone();
        let accumulator =
            CommitAccumulator::from_leaves(commits.iter().map(Commit::commit_hash));

        let leaf_target = ((capacity as f64 * fill).round() as usize).clamp(1, capacity);
        let fan_target = (((capacity + 1) as f64 * fill).round() as usize).clamp(2, capacity + 1);

        let mut arena = Vec::new();
        // (min key, node id, node hash, subtree count) per level item.
        let mut level: Vec<(CommitKey, NodeId, Hash, usize)> = Vec::new();

        let mut commits = commits;
        while !commits.is_empty() {
            let rest = commits.split_off(leaf_target.min(commits.len()));
            let entries = commits;
            commits = rest;
            let hash = leaf_digest(&entries);
            let min = entries[0].key.clone();
            let count = entries.len();
            arena.push(Node::Leaf { entries, hash });
            level.push((min, arena.len() - 1, hash, count));
        }
        let leaves = level.len();

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len() / 2 + 1);
            for group in level.chunks(fan_target) {
                let keys: Vec<CommitKey> = group[1..].iter().map(|(k, _, _, _)| k.clone()).collect();
                let children: Vec<NodeId> = group.iter().map(|&(_, id, _, _)| id).collect();
                let child_hashes: Vec<Hash> = group.iter().map(|&(_, _, h, _)| h).collect();
                let count = group.iter().map(|&(_, _, _, c)| c).sum();
                let hash = hash_children(&child_hashes);
                let min = group[0].0.clone();
                arena.push(Node::Internal {
                    keys,
                    children,
                    child_hashes,
                    count,
                    hash,
                });
                next.push((min, arena.len() - 1, hash, count));
            }
            level = next;
        }

        let root = level[0].1;
        Ok(Self {
            arena,
            root,
            len,
            leaves,
            capacity,
            max_key: Some(max_key),
            accumulator,
        })
    }
}
