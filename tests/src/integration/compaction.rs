//! # Compaction Flows
//!
//! Fragmentation-driven reorganization: trigger thresholds, counter
//! movement, and the root-preservation guarantee.

#[cfg(test)]
mod tests {
    use crate::{insert_row, users, TestTimeline};
    use chronicle_timeline::{
        FixedTimeSource, InMemoryKVStore, TimelineConfig, TimelineError, TimelineService,
    };

    fn timeline_with(auto_compact: bool) -> TestTimeline {
        let config = TimelineConfig {
            auto_compact,
            ..TimelineConfig::for_testing()
        };
        TimelineService::new(InMemoryKVStore::new(), FixedTimeSource::new(0), config)
    }

    #[test]
    fn test_fragmentation_triggers_exactly_one_pass() {
        // With auto-compaction off, fragment the index, then compact
        // explicitly: the counter moves by one and the root by zero.
        let timeline = timeline_with(false);
        for i in 0..40i64 {
            timeline
                .commit("users", &insert_row(i), Some(i * 100))
                .expect("commit");
        }
        let stats = timeline.stats();
        assert!(
            stats.per_table[0].utilization < 0.70,
            "expected a fragmented index, got {}",
            stats.per_table[0].utilization
        );

        let root = timeline.root_hash();
        assert_eq!(timeline.reorganization_count(), 0);
        timeline.compact(&users()).expect("compact");
        assert_eq!(timeline.reorganization_count(), 1);
        assert_eq!(timeline.root_hash(), root);
    }

    #[test]
    fn test_auto_compaction_keeps_history_valid() {
        let timeline = timeline_with(true);
        for i in 0..120i64 {
            timeline
                .commit("users", &insert_row(i), Some(i * 100))
                .expect("commit");
        }
        assert!(timeline.reorganization_count() >= 1);
        assert!(timeline.verify_integrity());

        // Every commit is still reachable and provable after the swaps.
        let view = timeline.query_as_of(&users(), i64::MAX).expect("query");
        assert_eq!(view.len(), 120);
        let proof = timeline.get_commit_proof(&view[57].key).expect("proof");
        assert!(proof.verify(&timeline.root_hash()));
    }

    #[test]
    fn test_compaction_packs_the_index() {
        let timeline = timeline_with(false);
        for i in 0..60i64 {
            timeline
                .commit("users", &insert_row(i), Some(i * 100))
                .expect("commit");
        }
        let before = timeline.stats();
        timeline.compact(&users()).expect("compact");
        let after = timeline.stats();

        assert!(after.nodes < before.nodes);
        assert!(after.per_table[0].utilization > before.per_table[0].utilization);
        assert_eq!(after.commits, before.commits);
    }

    #[test]
    fn test_compact_unknown_table_fails() {
        let timeline = timeline_with(false);
        let result = timeline.compact(&users());
        assert!(matches!(result, Err(TimelineError::TableNotFound { .. })));
    }

    #[test]
    fn test_compact_all_covers_every_table() {
        let timeline = timeline_with(false);
        for i in 0..30i64 {
            timeline
                .commit("users", &insert_row(i), Some(i * 100))
                .expect("commit");
            timeline
                .commit("orders", &insert_row(i), Some(i * 100))
                .expect("commit");
        }
        let root = timeline.root_hash();
        timeline.compact_all().expect("compact all");
        assert_eq!(timeline.reorganization_count(), 2);
        assert_eq!(timeline.root_hash(), root);
        assert!(timeline.verify_integrity());
    }

    #[test]
    fn test_snapshots_survive_compaction() {
        let timeline = timeline_with(false);
        for i in 0..40i64 {
            timeline
                .commit("users", &insert_row(i), Some(i * 100))
                .expect("commit");
        }
        timeline.create_snapshot("mid", 2000).expect("snapshot");
        timeline.compact(&users()).expect("compact");
        assert!(timeline.verify_snapshot("mid").expect("verify"));
    }

    #[test]
    fn test_reorganization_count_persists_across_reload() {
        let timeline = timeline_with(false);
        for i in 0..40i64 {
            timeline
                .commit("users", &insert_row(i), Some(i * 100))
                .expect("commit");
        }
        timeline.compact(&users()).expect("compact");
        let count = timeline.reorganization_count();

        let reloaded = TimelineService::load(
            timeline.into_store(),
            FixedTimeSource::new(0),
            TimelineConfig::for_testing(),
        )
        .expect("load");
        assert_eq!(reloaded.reorganization_count(), count);
    }
}
