//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the timeline service requires from its host: a byte-level
//! key-value store for persistence and a time source for commit
//! timestamps. Production adapters (an on-disk store, the system clock)
//! belong to the host process; in-memory implementations ship here for
//! tests and embedded use.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chronicle_types::Timestamp;

use crate::domain::errors::StoreError;

/// Abstract interface for key-value persistence.
///
/// The engine serializes tree records, the watermark table, and the
/// snapshot table as opaque byte records against this interface. On load
/// it re-derives every root hash rather than trusting a persisted value.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Put a single key-value pair, overwriting any existing value.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// Check whether a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, StoreError>;

    /// All pairs whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// Abstract interface for time, for testability.
pub trait TimeSource: Send + Sync {
    /// Current timestamp in the engine's unit (epoch seconds for the
    /// system adapter).
    fn now(&self) -> Timestamp;
}

// =============================================================================
// ADAPTER IMPLEMENTATIONS
// =============================================================================

/// In-memory key-value store over a sorted map.
#[derive(Debug, Default)]
pub struct InMemoryKVStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryKVStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no record is held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Wall-clock time source: seconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as Timestamp)
    }
}

/// Fixed, settable time source for tests.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    timestamp: AtomicI64,
}

impl FixedTimeSource {
    /// Create a time source pinned at `timestamp`.
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp: AtomicI64::new(timestamp),
        }
    }

    /// Move the clock.
    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        self.timestamp.load(Ordering::SeqCst)
    }
}
