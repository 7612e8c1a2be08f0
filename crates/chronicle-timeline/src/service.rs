//! # Timeline Service
//!
//! The main service implementing the commit-log API.
//!
//! ## Architecture
//!
//! This service:
//! 1. Appends commits and answers time-travel queries
//! 2. Tracks snapshots and per-consumer watermarks
//! 3. Verifies history integrity and generates inclusion proofs
//! 4. Triggers compaction once the index fragments
//! 5. Uses dependency injection for the store and the clock
//!
//! One logical tree per table. The engine root folds the per-table roots
//! (each bound to its table-name digest) in table-name order, so a proof
//! for any commit extends through its table digest up to one root hash
//! consumers can re-derive independently.
//!
//! The engine state sits behind a reader/writer lock: reads are pure over
//! the current trees and run concurrently; the single writer takes the
//! write guard for commits and for compaction's pointer swap.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use chronicle_index::{
    hash_pair, CommitAccumulator, IndexError, MerkleBPlusTree, MerkleProof, ProofStep,
};
use chronicle_types::{
    encode_changes, ChangeRecord, Commit, CommitId, CommitKey, Hash, Snapshot, TableName,
    Timestamp, Watermark, EMPTY_ROOT,
};

use crate::compaction;
use crate::config::TimelineConfig;
use crate::domain::errors::TimelineError;
use crate::domain::invariants::invariant_commit_non_empty;
use crate::persistence::{self, Manifest};
use crate::ports::outbound::{KeyValueStore, TimeSource};

/// Identifier for a verification request.
#[derive(Clone, Debug)]
pub enum VerifyRequest {
    /// Verify one commit by id.
    Commit(CommitId),
    /// Verify the latest commit at or before a timestamp.
    TableAt {
        /// Table to look in.
        table: TableName,
        /// Upper timestamp bound, inclusive.
        timestamp: Timestamp,
    },
}

/// Result of a verification request.
#[derive(Clone, Debug)]
pub struct VerifyOutcome {
    /// Whether payload and proof checked out against the current root.
    pub verified: bool,
    /// The proof that was checked, for the caller to keep or forward.
    pub proof: Option<MerkleProof>,
}

/// Per-table statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableStats {
    /// Table name.
    pub table: TableName,
    /// Commits stored.
    pub commits: usize,
    /// Nodes in the index arena.
    pub nodes: usize,
    /// Leaf nodes.
    pub leaf_nodes: usize,
    /// Mean leaf fill.
    pub utilization: f64,
    /// Index height.
    pub height: usize,
}

/// Engine-wide statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineStats {
    /// Number of tables.
    pub tables: usize,
    /// Total commits across tables.
    pub commits: u64,
    /// Total index nodes across tables.
    pub nodes: usize,
    /// Completed reorganizations.
    pub reorganizations: u64,
    /// Breakdown per table.
    pub per_table: Vec<TableStats>,
}

/// One table's index and its commit counter.
struct TableState {
    tree: MerkleBPlusTree,
    next_sequence: u64,
}

impl TableState {
    fn new(config: &TimelineConfig) -> Self {
        Self {
            tree: MerkleBPlusTree::new(config.node_capacity),
            next_sequence: 0,
        }
    }
}

/// All mutable engine state, guarded by one reader/writer lock.
struct EngineState {
    tables: BTreeMap<TableName, TableState>,
    snapshots: BTreeMap<String, Snapshot>,
    watermarks: BTreeMap<(String, TableName), Timestamp>,
    reorganizations: u64,
}

/// Bag a digest list right to left into one root.
fn bag_digests(digests: &[Hash]) -> Hash {
    match digests.split_last() {
        None => EMPTY_ROOT,
        Some((last, rest)) => {
            let mut root = *last;
            for digest in rest.iter().rev() {
                root = hash_pair(digest, &root);
            }
            root
        }
    }
}

impl EngineState {
    fn empty() -> Self {
        Self {
            tables: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            watermarks: BTreeMap::new(),
            reorganizations: 0,
        }
    }

    /// Per-table digests in table-name order: H(name digest || table root).
    fn table_digests(&self) -> Vec<(&TableName, Hash)> {
        self.tables
            .iter()
            .filter(|(_, st)| !st.tree.is_empty())
            .map(|(name, st)| (name, hash_pair(&name.digest(), &st.tree.root_hash())))
            .collect()
    }

    /// The engine root over all tables.
    fn root(&self) -> Hash {
        let digests: Vec<Hash> = self.table_digests().iter().map(|&(_, d)| d).collect();
        bag_digests(&digests)
    }

    /// The engine root over history up to and including `timestamp`,
    /// re-derived from commit contents.
    fn root_at(&self, timestamp: Timestamp) -> Hash {
        let mut digests = Vec::new();
        for (name, st) in &self.tables {
            let low = CommitKey::new(name.clone(), Timestamp::MIN, 0);
            let high = CommitKey::new(name.clone(), timestamp, u64::MAX);
            let commits = st.tree.range_query(&low, &high);
            if commits.is_empty() {
                continue;
            }
            let table_root =
                CommitAccumulator::from_leaves(commits.iter().map(Commit::commit_hash)).root();
            digests.push(hash_pair(&name.digest(), &table_root));
        }
        bag_digests(&digests)
    }

    /// Extend a table-level proof so it folds up to the engine root.
    fn extend_proof(&self, table: &TableName, proof: MerkleProof) -> MerkleProof {
        let digests = self.table_digests();
        let Some(position) = digests.iter().position(|(name, _)| *name == table) else {
            return proof;
        };

        let mut steps = proof.steps;
        steps.push(ProofStep::left(table.digest()));
        if position + 1 < digests.len() {
            let mut right_bag = digests[digests.len() - 1].1;
            for (_, digest) in digests[position + 1..digests.len() - 1].iter().rev() {
                right_bag = hash_pair(digest, &right_bag);
            }
            steps.push(ProofStep::right(right_bag));
        }
        for (_, digest) in digests[..position].iter().rev() {
            steps.push(ProofStep::left(*digest));
        }

        MerkleProof::new(proof.target, steps, self.root())
    }
}

/// The timeline service.
///
/// Generic over the persistence store and the time source so hosts and
/// tests inject their own.
pub struct TimelineService<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    state: RwLock<EngineState>,
    store: Mutex<KV>,
    time: TS,
    config: TimelineConfig,
}

impl<KV, TS> TimelineService<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    /// Create an empty timeline over a fresh store.
    pub fn new(store: KV, time: TS, config: TimelineConfig) -> Self {
        Self {
            state: RwLock::new(EngineState::empty()),
            store: Mutex::new(store),
            time,
            config,
        }
    }

    /// Rebuild a timeline from a persisted store.
    ///
    /// Commits are replayed per table in key order and every root is
    /// re-derived from commit contents — persisted roots are never
    /// trusted. Metadata records (snapshots, watermarks, manifest) fail
    /// the load on checksum mismatch; commit payload tampering loads and
    /// is reported by [`TimelineService::verify_integrity`] instead.
    pub fn load(store: KV, time: TS, config: TimelineConfig) -> Result<Self, TimelineError> {
        let mut grouped: BTreeMap<TableName, Vec<Commit>> = BTreeMap::new();
        for (key, value) in store.prefix_scan(persistence::COMMIT_PREFIX.as_bytes())? {
            let record = String::from_utf8_lossy(&key).into_owned();
            let commit: Commit = persistence::decode_record(&record, &value)?;
            grouped.entry(commit.key.table.clone()).or_default().push(commit);
        }

        let mut tables = BTreeMap::new();
        let mut total = 0usize;
        for (name, mut commits) in grouped {
            commits.sort_by(|a, b| a.key.cmp(&b.key));
            total += commits.len();
            let next_sequence = commits.iter().map(|c| c.key.sequence + 1).max().unwrap_or(0);
            let tree =
                MerkleBPlusTree::bulk_load(commits, config.node_capacity, config.compaction_fill)
                    .map_err(|source| TimelineError::Index {
                        table: name.clone(),
                        operation: "load",
                        source,
                    })?;
            tables.insert(
                name,
                TableState {
                    tree,
                    next_sequence,
                },
            );
        }

        let mut snapshots = BTreeMap::new();
        for (key, value) in store.prefix_scan(persistence::SNAPSHOT_PREFIX.as_bytes())? {
            let record = String::from_utf8_lossy(&key).into_owned();
            let snapshot: Snapshot = persistence::decode_framed(&record, &value)?;
            snapshots.insert(snapshot.name.clone(), snapshot);
        }

        let mut watermarks = BTreeMap::new();
        for (key, value) in store.prefix_scan(persistence::WATERMARK_PREFIX.as_bytes())? {
            let record = String::from_utf8_lossy(&key).into_owned();
            let watermark: Watermark = persistence::decode_framed(&record, &value)?;
            watermarks.insert(
                (watermark.consumer.clone(), watermark.table.clone()),
                watermark.timestamp,
            );
        }

        let reorganizations = match store.get(persistence::MANIFEST_KEY.as_bytes())? {
            Some(bytes) => {
                persistence::decode_framed::<Manifest>(persistence::MANIFEST_KEY, &bytes)?
                    .reorganizations
            }
            None => 0,
        };

        tracing::info!(
            tables = tables.len(),
            commits = total,
            "timeline loaded; roots re-derived from commit contents"
        );

        Ok(Self {
            state: RwLock::new(EngineState {
                tables,
                snapshots,
                watermarks,
                reorganizations,
            }),
            store: Mutex::new(store),
            time,
            config,
        })
    }

    /// Consume the service and hand the store back to the host.
    pub fn into_store(self) -> KV {
        self.store.into_inner()
    }

    /// The configuration in effect.
    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Append a commit.
    ///
    /// Serializes the changes, hashes the payload, assigns the next
    /// per-table sequence, persists the record, inserts it into the
    /// table's index, and finally considers compaction. Empty change
    /// lists are rejected before any mutation.
    pub fn commit(
        &self,
        table: impl Into<TableName>,
        changes: &[ChangeRecord],
        timestamp: Option<Timestamp>,
    ) -> Result<CommitId, TimelineError> {
        let table = table.into();
        invariant_commit_non_empty(&table, changes)?;
        let payload = encode_changes(changes).map_err(|source| TimelineError::Encode {
            table: table.clone(),
            source,
        })?;

        let mut state = self.state.write();
        let timestamp = timestamp.unwrap_or_else(|| self.time.now());
        let entry = state
            .tables
            .entry(table.clone())
            .or_insert_with(|| TableState::new(&self.config));
        let key = CommitKey {
            table: table.clone(),
            timestamp,
            sequence: entry.next_sequence,
        };
        let commit = Commit::new(key.clone(), payload);

        {
            let record_key = persistence::commit_record_key(&key);
            let record = String::from_utf8_lossy(&record_key).into_owned();
            let bytes = persistence::encode_record(&record, &commit)?;
            self.store.lock().put(&record_key, &bytes)?;
        }

        entry
            .tree
            .insert(commit)
            .map_err(|source| TimelineError::Index {
                table: table.clone(),
                operation: "commit",
                source,
            })?;
        entry.next_sequence += 1;

        tracing::info!(
            table = %table,
            timestamp,
            sequence = key.sequence,
            "commit appended"
        );

        if self.config.auto_compact {
            self.maybe_compact_locked(&mut state, &table);
        }
        Ok(key)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// All commits with timestamp at or before `timestamp`, in commit
    /// order — the "as of" view of the table's history.
    pub fn query_as_of(
        &self,
        table: &TableName,
        timestamp: Timestamp,
    ) -> Result<Vec<Commit>, TimelineError> {
        let state = self.state.read();
        let st = state
            .tables
            .get(table)
            .ok_or_else(|| TimelineError::TableNotFound {
                table: table.clone(),
            })?;
        let low = CommitKey::new(table.clone(), Timestamp::MIN, 0);
        let high = CommitKey::new(table.clone(), timestamp, u64::MAX);
        Ok(st.tree.range_query(&low, &high))
    }

    /// All commits with timestamp strictly after `since`, in commit
    /// order — the building block for incremental reads.
    pub fn get_commits_since(
        &self,
        table: &TableName,
        since: Timestamp,
    ) -> Result<Vec<Commit>, TimelineError> {
        let state = self.state.read();
        let st = state
            .tables
            .get(table)
            .ok_or_else(|| TimelineError::TableNotFound {
                table: table.clone(),
            })?;
        if since == Timestamp::MAX {
            return Ok(Vec::new());
        }
        let low = CommitKey::new(table.clone(), since + 1, 0);
        let high = CommitKey::new(table.clone(), Timestamp::MAX, u64::MAX);
        Ok(st.tree.range_query(&low, &high))
    }

    /// Fetch one commit by id.
    pub fn get_commit(&self, id: &CommitId) -> Result<Commit, TimelineError> {
        let state = self.state.read();
        state
            .tables
            .get(&id.table)
            .and_then(|st| st.tree.get(id).cloned())
            .ok_or_else(|| TimelineError::CommitNotFound { key: id.clone() })
    }

    /// Names of all tables with commits.
    pub fn tables(&self) -> Vec<TableName> {
        self.state.read().tables.keys().cloned().collect()
    }

    // =========================================================================
    // PROOFS & VERIFICATION
    // =========================================================================

    /// The engine root hash: the single value consumers re-derive to
    /// detect tampering. Zero constant while no commit exists.
    pub fn root_hash(&self) -> Hash {
        self.state.read().root()
    }

    /// Generate an inclusion proof for a commit, bound to the current
    /// engine root.
    pub fn get_commit_proof(&self, id: &CommitId) -> Result<MerkleProof, TimelineError> {
        let state = self.state.read();
        let st = state
            .tables
            .get(&id.table)
            .ok_or_else(|| TimelineError::CommitNotFound { key: id.clone() })?;
        let proof = st.tree.generate_proof(id).map_err(|source| match source {
            IndexError::KeyNotFound { key } => TimelineError::CommitNotFound { key },
            other => TimelineError::Index {
                table: id.table.clone(),
                operation: "proof",
                source: other,
            },
        })?;
        Ok(state.extend_proof(&id.table, proof))
    }

    /// Verify a commit: payload hash recheck plus proof fold against the
    /// current engine root.
    pub fn verify_commit(&self, id: &CommitId) -> Result<VerifyOutcome, TimelineError> {
        let state = self.state.read();
        let st = state
            .tables
            .get(&id.table)
            .ok_or_else(|| TimelineError::CommitNotFound { key: id.clone() })?;
        let commit = st
            .tree
            .get(id)
            .ok_or_else(|| TimelineError::CommitNotFound { key: id.clone() })?;
        let proof = st.tree.generate_proof(id).map_err(|source| match source {
            IndexError::KeyNotFound { key } => TimelineError::CommitNotFound { key },
            other => TimelineError::Index {
                table: id.table.clone(),
                operation: "verify",
                source: other,
            },
        })?;
        let proof = state.extend_proof(&id.table, proof);
        let verified = commit.payload_intact() && proof.verify(&state.root());
        if !verified {
            tracing::warn!(commit = %id, "commit failed verification");
        }
        Ok(VerifyOutcome {
            verified,
            proof: Some(proof),
        })
    }

    /// Verify by commit id or by (table, timestamp) — the latter checks
    /// the latest commit at or before the timestamp.
    pub fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, TimelineError> {
        match request {
            VerifyRequest::Commit(id) => self.verify_commit(id),
            VerifyRequest::TableAt { table, timestamp } => {
                let commits = self.query_as_of(table, *timestamp)?;
                let last = commits.last().ok_or_else(|| TimelineError::CommitNotFound {
                    key: CommitKey::new(table.clone(), *timestamp, 0),
                })?;
                self.verify_commit(&last.key)
            }
        }
    }

    /// The authoritative, cache-independent tamper check: recompute every
    /// payload hash from payload bytes, replay all commits into fresh
    /// trees and compare roots, and recheck every cached node hash
    /// bottom-up.
    ///
    /// A false return is the intended tamper signal, not an error — the
    /// caller decides severity.
    pub fn verify_integrity(&self) -> bool {
        let state = self.state.read();
        for (name, st) in &state.tables {
            let commits = st.tree.entries();
            for commit in &commits {
                if !commit.payload_intact() {
                    tracing::warn!(
                        table = %name,
                        commit = %commit.key,
                        "payload hash mismatch: stored payload was altered"
                    );
                    return false;
                }
            }

            let replayed =
                match MerkleBPlusTree::bulk_load(commits, self.config.node_capacity, 1.0) {
                    Ok(tree) => tree,
                    Err(e) => {
                        tracing::warn!(table = %name, error = %e, "replay failed");
                        return false;
                    }
                };
            if replayed.root_hash() != st.tree.root_hash() {
                tracing::warn!(table = %name, "replayed root differs from live root");
                return false;
            }

            if !st.tree.verify_structure() {
                tracing::warn!(table = %name, "cached node hashes inconsistent with structure");
                return false;
            }
        }
        true
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Record the engine root over history up to `timestamp` under a
    /// unique name.
    pub fn create_snapshot(
        &self,
        name: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<Snapshot, TimelineError> {
        let name = name.into();
        let mut state = self.state.write();
        if state.snapshots.contains_key(&name) {
            return Err(TimelineError::DuplicateSnapshot { name });
        }

        let root = state.root_at(timestamp);
        let snapshot = Snapshot::new(name.clone(), timestamp, root);

        let record_key = persistence::snapshot_record_key(&name);
        let record = String::from_utf8_lossy(&record_key).into_owned();
        let bytes = persistence::encode_framed(&record, &snapshot)?;
        self.store.lock().put(&record_key, &bytes)?;

        state.snapshots.insert(name.clone(), snapshot.clone());
        tracing::info!(snapshot = %name, timestamp, "snapshot created");
        Ok(snapshot)
    }

    /// Fetch a snapshot by name.
    pub fn get_snapshot(&self, name: &str) -> Result<Snapshot, TimelineError> {
        self.state
            .read()
            .snapshots
            .get(name)
            .cloned()
            .ok_or_else(|| TimelineError::SnapshotNotFound {
                name: name.to_string(),
            })
    }

    /// All snapshots, by name.
    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        self.state.read().snapshots.values().cloned().collect()
    }

    /// Replay history up to the snapshot's timestamp and compare the
    /// re-derived root with the recorded one.
    pub fn verify_snapshot(&self, name: &str) -> Result<bool, TimelineError> {
        let state = self.state.read();
        let snapshot = state
            .snapshots
            .get(name)
            .ok_or_else(|| TimelineError::SnapshotNotFound {
                name: name.to_string(),
            })?;
        let verified = state.root_at(snapshot.timestamp) == snapshot.root_hash;
        if !verified {
            tracing::warn!(snapshot = %name, "replayed root differs from snapshot root");
        }
        Ok(verified)
    }

    // =========================================================================
    // WATERMARKS
    // =========================================================================

    /// A consumer's stored watermark for a table, if any.
    ///
    /// Monotonicity is enforced by the owning consumer (the incremental
    /// processor); this store holds whatever was last set.
    pub fn get_watermark(&self, consumer: &str, table: &TableName) -> Option<Timestamp> {
        self.state
            .read()
            .watermarks
            .get(&(consumer.to_string(), table.clone()))
            .copied()
    }

    /// Persist and record a consumer's watermark for a table.
    pub fn set_watermark(
        &self,
        consumer: &str,
        table: &TableName,
        timestamp: Timestamp,
    ) -> Result<(), TimelineError> {
        let mut state = self.state.write();
        let record_key = persistence::watermark_record_key(consumer, table);
        let record = String::from_utf8_lossy(&record_key).into_owned();
        let watermark = Watermark {
            consumer: consumer.to_string(),
            table: table.clone(),
            timestamp,
        };
        let bytes = persistence::encode_framed(&record, &watermark)?;
        self.store.lock().put(&record_key, &bytes)?;
        state
            .watermarks
            .insert((consumer.to_string(), table.clone()), timestamp);
        tracing::debug!(consumer, table = %table, timestamp, "watermark stored");
        Ok(())
    }

    // =========================================================================
    // COMPACTION
    // =========================================================================

    /// Number of completed reorganizations.
    pub fn reorganization_count(&self) -> u64 {
        self.state.read().reorganizations
    }

    /// Explicitly compact one table's index.
    pub fn compact(&self, table: &TableName) -> Result<(), TimelineError> {
        let mut state = self.state.write();
        let st = state
            .tables
            .get(table)
            .ok_or_else(|| TimelineError::TableNotFound {
                table: table.clone(),
            })?;
        let rebuilt = compaction::rebuild_packed(table, &st.tree, &self.config)?;
        if let Some(st) = state.tables.get_mut(table) {
            st.tree = rebuilt;
        }
        state.reorganizations += 1;
        let reorganizations = state.reorganizations;
        tracing::info!(table = %table, reorganizations, "index compacted");
        drop(state);
        self.persist_manifest(reorganizations);
        Ok(())
    }

    /// Explicitly compact every table.
    pub fn compact_all(&self) -> Result<(), TimelineError> {
        for table in self.tables() {
            self.compact(&table)?;
        }
        Ok(())
    }

    /// Engine statistics.
    pub fn stats(&self) -> TimelineStats {
        let state = self.state.read();
        let per_table: Vec<TableStats> = state
            .tables
            .iter()
            .map(|(name, st)| TableStats {
                table: name.clone(),
                commits: st.tree.len(),
                nodes: st.tree.node_count(),
                leaf_nodes: st.tree.leaf_node_count(),
                utilization: st.tree.utilization(),
                height: st.tree.height(),
            })
            .collect();
        TimelineStats {
            tables: per_table.len(),
            commits: per_table.iter().map(|t| t.commits as u64).sum(),
            nodes: per_table.iter().map(|t| t.nodes).sum(),
            reorganizations: state.reorganizations,
            per_table,
        }
    }

    /// Compact after a commit when the trigger fires. Failures keep the
    /// live tree and never fail the surrounding commit.
    fn maybe_compact_locked(&self, state: &mut EngineState, table: &TableName) {
        let due = state
            .tables
            .get(table)
            .is_some_and(|st| compaction::should_compact(&st.tree, &self.config));
        if !due {
            return;
        }
        let rebuilt = match state.tables.get(table) {
            Some(st) => compaction::rebuild_packed(table, &st.tree, &self.config),
            None => return,
        };
        match rebuilt {
            Ok(tree) => {
                if let Some(st) = state.tables.get_mut(table) {
                    st.tree = tree;
                }
                state.reorganizations += 1;
                tracing::info!(
                    table = %table,
                    reorganizations = state.reorganizations,
                    "index compacted"
                );
                self.persist_manifest(state.reorganizations);
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "compaction aborted; keeping live tree");
            }
        }
    }

    fn persist_manifest(&self, reorganizations: u64) {
        let manifest = Manifest { reorganizations };
        match persistence::encode_framed(persistence::MANIFEST_KEY, &manifest) {
            Ok(bytes) => {
                if let Err(e) = self
                    .store
                    .lock()
                    .put(persistence::MANIFEST_KEY.as_bytes(), &bytes)
                {
                    tracing::warn!(error = %e, "manifest write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "manifest encode failed"),
        }
    }
}
