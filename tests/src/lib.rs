//! # Chronicle Test Suite
//!
//! Unified test crate exercising the engine across crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── time_travel.rs   # As-of queries and ordering guarantees
//!     ├── integrity.rs     # Roots, proofs, snapshots, tamper detection
//!     ├── compaction.rs    # Reorganization triggers and root preservation
//!     └── incremental.rs   # Change sets, watermarks, consumer flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p chronicle-tests
//! cargo test -p chronicle-tests integration::integrity
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;

use std::sync::Arc;

use chronicle_timeline::{FixedTimeSource, InMemoryKVStore, TimelineConfig, TimelineService};
use chronicle_types::{ChangeRecord, ColumnValue, ScalarValue, TableName};

/// Timeline over the in-memory adapters used throughout the suite.
pub type TestTimeline = TimelineService<InMemoryKVStore, FixedTimeSource>;

/// Fresh timeline with the small test config.
pub fn test_timeline() -> TestTimeline {
    TimelineService::new(
        InMemoryKVStore::new(),
        FixedTimeSource::new(1_700_000_000),
        TimelineConfig::for_testing(),
    )
}

/// Fresh shared timeline for consumer tests.
pub fn shared_test_timeline() -> Arc<TestTimeline> {
    Arc::new(test_timeline())
}

/// A one-row insert change list.
pub fn insert_row(id: i64) -> Vec<ChangeRecord> {
    vec![ChangeRecord::Insert {
        key_columns: vec![ColumnValue::new("id", ScalarValue::Int(id))],
        values: vec![
            ColumnValue::new("name", ScalarValue::Text(format!("row-{id}"))),
            ColumnValue::new("active", ScalarValue::Bool(id % 2 == 0)),
        ],
    }]
}

/// An update + delete change list, for mixed payloads.
pub fn mixed_changes(id: i64) -> Vec<ChangeRecord> {
    vec![
        ChangeRecord::Update {
            key_columns: vec![ColumnValue::new("id", ScalarValue::Int(id))],
            values: vec![ColumnValue::new("score", ScalarValue::Float(id as f64 * 0.5))],
        },
        ChangeRecord::Delete {
            key_columns: vec![ColumnValue::new("id", ScalarValue::Int(id + 1))],
        },
    ]
}

/// The `users` table name.
pub fn users() -> TableName {
    TableName::new("users")
}
