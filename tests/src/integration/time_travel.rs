//! # Time Travel Flows
//!
//! As-of queries over the commit history: bounds, ordering, and the
//! prefix guarantee between earlier and later views.

#[cfg(test)]
mod tests {
    use crate::{insert_row, test_timeline, users};
    use chronicle_timeline::TimelineError;

    #[test]
    fn test_as_of_returns_exact_prefix() {
        // Three commits at 1000 / 2000 / 3000; "as of 2000" is exactly
        // the first two.
        let timeline = test_timeline();
        for ts in [1000, 2000, 3000] {
            timeline
                .commit("users", &insert_row(ts), Some(ts))
                .expect("commit");
        }

        let view = timeline.query_as_of(&users(), 2000).expect("query");
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].key.timestamp, 1000);
        assert_eq!(view[1].key.timestamp, 2000);
    }

    #[test]
    fn test_as_of_before_first_commit_is_empty() {
        let timeline = test_timeline();
        timeline
            .commit("users", &insert_row(1), Some(1000))
            .expect("commit");
        let view = timeline.query_as_of(&users(), 999).expect("query");
        assert!(view.is_empty());
    }

    #[test]
    fn test_as_of_unknown_table_fails() {
        let timeline = test_timeline();
        let result = timeline.query_as_of(&users(), 1000);
        assert!(matches!(result, Err(TimelineError::TableNotFound { .. })));
    }

    #[test]
    fn test_earlier_view_is_prefix_of_later_view() {
        let timeline = test_timeline();
        for i in 0..40i64 {
            timeline
                .commit("users", &insert_row(i), Some(i * 250))
                .expect("commit");
        }

        for (t1, t2) in [(0, 500), (1000, 5000), (3000, 9750), (0, 9750)] {
            let early = timeline.query_as_of(&users(), t1).expect("query");
            let late = timeline.query_as_of(&users(), t2).expect("query");
            assert!(
                early.len() <= late.len(),
                "as-of {t1} larger than as-of {t2}"
            );
            assert_eq!(&late[..early.len()], &early[..]);
        }
    }

    #[test]
    fn test_same_timestamp_commits_ordered_by_sequence() {
        let timeline = test_timeline();
        for i in 0..5i64 {
            timeline
                .commit("users", &insert_row(i), Some(1000))
                .expect("commit");
        }
        let view = timeline.query_as_of(&users(), 1000).expect("query");
        let sequences: Vec<u64> = view.iter().map(|c| c.key.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_tables_are_isolated() {
        let timeline = test_timeline();
        timeline
            .commit("users", &insert_row(1), Some(1000))
            .expect("commit");
        timeline
            .commit("orders", &insert_row(2), Some(1000))
            .expect("commit");

        let view = timeline.query_as_of(&users(), 5000).expect("query");
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].key.table, users());
    }

    #[test]
    fn test_out_of_order_timestamps_are_accepted_and_ordered() {
        // Caller-supplied timestamps may arrive out of order; reads are
        // still in key order and integrity holds.
        let timeline = test_timeline();
        for ts in [5000i64, 1000, 3000, 2000, 4000] {
            timeline
                .commit("users", &insert_row(ts), Some(ts))
                .expect("commit");
        }
        let view = timeline.query_as_of(&users(), 6000).expect("query");
        let timestamps: Vec<i64> = view.iter().map(|c| c.key.timestamp).collect();
        assert_eq!(timestamps, vec![1000, 2000, 3000, 4000, 5000]);
        assert!(timeline.verify_integrity());
    }
}
