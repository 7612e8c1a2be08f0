//! # Incremental Processor
//!
//! Consumes the timeline to produce watermark-bounded, proof-carrying
//! change sets.
//!
//! Each processor instance acts for one named consumer; its watermarks
//! are stored per (consumer, table) through the timeline's watermark
//! store, so independent consumers progress independently and a restarted
//! consumer resumes from its persisted position.

use std::sync::Arc;

use chronicle_timeline::{KeyValueStore, TimeSource, TimelineService};
use chronicle_types::{decode_changes, TableName, Timestamp};

use crate::domain::change_set::{Change, ChangeSet, ChangeSetProof};
use crate::domain::errors::IncrementalError;

/// Result of one incremental processing pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Changes handed to the handler.
    pub changes_processed: usize,
    /// Watermark after the pass.
    pub watermark: Timestamp,
}

/// Change-data-capture processor over a shared timeline.
pub struct IncrementalProcessor<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    timeline: Arc<TimelineService<KV, TS>>,
    consumer: String,
}

impl<KV, TS> IncrementalProcessor<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    /// Create a processor acting for `consumer`.
    pub fn new(timeline: Arc<TimelineService<KV, TS>>, consumer: impl Into<String>) -> Self {
        Self {
            timeline,
            consumer: consumer.into(),
        }
    }

    /// The consumer this processor acts for.
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// The stored watermark for a table, or `Timestamp::MIN` before the
    /// first advance.
    pub fn watermark(&self, table: &TableName) -> Timestamp {
        self.timeline
            .get_watermark(&self.consumer, table)
            .unwrap_or(Timestamp::MIN)
    }

    /// Build the change set for everything after `since`.
    ///
    /// Commit payloads are decoded into typed changes here, exactly once;
    /// every change carries its owning commit's inclusion proof. The
    /// resulting watermark is the timestamp of the last included commit,
    /// or `since` unchanged when nothing qualified.
    pub fn get_changes_since(
        &self,
        table: &TableName,
        since: Timestamp,
    ) -> Result<ChangeSet, IncrementalError> {
        let commits = self
            .timeline
            .get_commits_since(table, since)
            .map_err(|source| IncrementalError::Timeline {
                table: table.clone(),
                operation: "get_changes_since",
                source,
            })?;

        let mut changes = Vec::new();
        let mut covered = Vec::with_capacity(commits.len());
        let mut watermark = since;
        for commit in &commits {
            let records =
                decode_changes(&commit.payload).map_err(|source| IncrementalError::Decode {
                    commit: commit.key.clone(),
                    source,
                })?;
            let proof = self
                .timeline
                .get_commit_proof(&commit.key)
                .map_err(|source| IncrementalError::Timeline {
                    table: table.clone(),
                    operation: "proof",
                    source,
                })?;
            for record in records {
                changes.push(Change {
                    commit: commit.key.clone(),
                    record,
                    proof: proof.clone(),
                });
            }
            covered.push(commit.key.clone());
            watermark = commit.key.timestamp;
        }

        tracing::debug!(
            table = %table,
            since,
            commits = covered.len(),
            changes = changes.len(),
            "change set assembled"
        );

        Ok(ChangeSet {
            table: table.clone(),
            since,
            watermark,
            changes,
            proof: ChangeSetProof {
                root: self.timeline.root_hash(),
                commits: covered,
            },
        })
    }

    /// Recompute every change's proof against the current engine root.
    ///
    /// Fails closed: a single missing commit, altered payload, or
    /// non-verifying proof makes the whole batch false.
    pub fn verify_changes_integrity(&self, change_set: &ChangeSet) -> bool {
        for change in &change_set.changes {
            let outcome = match self.timeline.verify_commit(&change.commit) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(
                        commit = %change.commit,
                        error = %e,
                        "change verification failed: commit unavailable"
                    );
                    return false;
                }
            };
            if !outcome.verified {
                tracing::warn!(commit = %change.commit, "change failed proof verification");
                return false;
            }
            // The carried proof must still describe the same commit the
            // timeline proves now.
            let matches_current = outcome
                .proof
                .as_ref()
                .is_some_and(|fresh| fresh.target == change.proof.target);
            if !matches_current {
                tracing::warn!(commit = %change.commit, "carried proof targets a different commit");
                return false;
            }
        }
        true
    }

    /// Advance the stored watermark. Values at or below the stored one
    /// are rejected — watermarks are monotonic by contract.
    pub fn update_watermark(
        &self,
        table: &TableName,
        new: Timestamp,
    ) -> Result<(), IncrementalError> {
        let current = self.watermark(table);
        if new <= current {
            return Err(IncrementalError::WatermarkRegression {
                table: table.clone(),
                requested: new,
                current,
            });
        }
        self.timeline
            .set_watermark(&self.consumer, table, new)
            .map_err(|source| IncrementalError::Timeline {
                table: table.clone(),
                operation: "update_watermark",
                source,
            })
    }

    /// One at-least-once processing pass: fetch changes since the stored
    /// watermark, invoke the handler, and advance the watermark only if
    /// the handler succeeds. Replay after a crash is therefore possible;
    /// handlers must be idempotent.
    pub fn process_table_incremental<F>(
        &self,
        table: &TableName,
        handler: F,
    ) -> Result<ProcessOutcome, IncrementalError>
    where
        F: FnOnce(&ChangeSet) -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
    {
        let since = self.watermark(table);
        let change_set = self.get_changes_since(table, since)?;
        if change_set.is_empty() {
            return Ok(ProcessOutcome {
                changes_processed: 0,
                watermark: since,
            });
        }

        handler(&change_set).map_err(|source| IncrementalError::Handler {
            table: table.clone(),
            source,
        })?;

        self.update_watermark(table, change_set.watermark)?;
        tracing::info!(
            table = %table,
            consumer = %self.consumer,
            changes = change_set.len(),
            watermark = change_set.watermark,
            "incremental pass complete"
        );
        Ok(ProcessOutcome {
            changes_processed: change_set.len(),
            watermark: change_set.watermark,
        })
    }
}
