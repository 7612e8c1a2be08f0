//! # Persistence
//!
//! Record layout for the key-value store.
//!
//! ## Key space
//!
//! ```text
//! commit/<table>/<timestamp>/<sequence>   bincode(Commit)
//! snapshot/<name>                         crc32 || bincode(Snapshot)
//! watermark/<consumer>/<table>            crc32 || bincode(Watermark)
//! meta/manifest                           crc32 || bincode(Manifest)
//! ```
//!
//! Metadata records carry a CRC32 frame and fail the load hard when the
//! checksum mismatches. Commit records deliberately do not: their
//! integrity anchor is the SHA-256 payload hash inside the record, so a
//! tampered payload loads and is then caught by `verify_integrity()` —
//! the cryptographic path, not the checksum path, decides tampering.

use serde::de::DeserializeOwned;
use serde::Serialize;

use chronicle_types::{CommitKey, TableName};

use crate::domain::errors::TimelineError;

/// Key prefix for commit records.
pub const COMMIT_PREFIX: &str = "commit/";
/// Key prefix for snapshot records.
pub const SNAPSHOT_PREFIX: &str = "snapshot/";
/// Key prefix for watermark records.
pub const WATERMARK_PREFIX: &str = "watermark/";
/// Key of the manifest record.
pub const MANIFEST_KEY: &str = "meta/manifest";

/// Engine-level metadata persisted alongside the records.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    /// Number of completed reorganizations.
    pub reorganizations: u64,
}

/// Store key for a commit record. Timestamps are offset into unsigned
/// space and zero-padded so lexicographic key order matches commit order
/// within a table.
pub fn commit_record_key(key: &CommitKey) -> Vec<u8> {
    format!(
        "{}{}/{:016x}/{:016x}",
        COMMIT_PREFIX,
        key.table,
        (key.timestamp as u64) ^ (1u64 << 63),
        key.sequence
    )
    .into_bytes()
}

/// Store key for a snapshot record.
pub fn snapshot_record_key(name: &str) -> Vec<u8> {
    format!("{SNAPSHOT_PREFIX}{name}").into_bytes()
}

/// Store key for a watermark record.
pub fn watermark_record_key(consumer: &str, table: &TableName) -> Vec<u8> {
    format!("{WATERMARK_PREFIX}{consumer}/{table}").into_bytes()
}

/// Encode a plain record.
pub fn encode_record<T: Serialize>(record: &str, value: &T) -> Result<Vec<u8>, TimelineError> {
    bincode::serialize(value).map_err(|e| TimelineError::DataCorruption {
        record: record.to_string(),
        message: format!("encode failed: {e}"),
    })
}

/// Decode a plain record.
pub fn decode_record<T: DeserializeOwned>(
    record: &str,
    bytes: &[u8],
) -> Result<T, TimelineError> {
    bincode::deserialize(bytes).map_err(|e| TimelineError::DataCorruption {
        record: record.to_string(),
        message: format!("decode failed: {e}"),
    })
}

/// Encode a metadata record with a CRC32 frame.
pub fn encode_framed<T: Serialize>(record: &str, value: &T) -> Result<Vec<u8>, TimelineError> {
    let body = encode_record(record, value)?;
    let checksum = crc32fast::hash(&body);
    let mut framed = Vec::with_capacity(body.len() + 4);
    framed.extend_from_slice(&checksum.to_le_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Decode a CRC32-framed metadata record, failing on checksum mismatch.
pub fn decode_framed<T: DeserializeOwned>(
    record: &str,
    bytes: &[u8],
) -> Result<T, TimelineError> {
    if bytes.len() < 4 {
        return Err(TimelineError::DataCorruption {
            record: record.to_string(),
            message: "record shorter than checksum frame".to_string(),
        });
    }
    let (frame, body) = bytes.split_at(4);
    let mut stored = [0u8; 4];
    stored.copy_from_slice(frame);
    let stored = u32::from_le_bytes(stored);
    let actual = crc32fast::hash(body);
    if stored != actual {
        return Err(TimelineError::DataCorruption {
            record: record.to_string(),
            message: format!("checksum mismatch: stored {stored:08x}, computed {actual:08x}"),
        });
    }
    decode_record(record, body)
}
