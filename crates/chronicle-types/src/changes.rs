//! # Change Records & Payload Codec
//!
//! The closed set of change operations a commit can carry, and the codec
//! that turns a change list into the opaque commit payload.
//!
//! Changes are represented as a tagged variant with explicit fields and
//! decoded exactly once, at the incremental-processor boundary, instead of
//! being re-parsed ad hoc by each consumer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::TypesError;
use crate::Hash;

/// A scalar cell value in an analytical table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ScalarValue {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

/// A named column value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColumnValue {
    /// Column name.
    pub name: String,
    /// Cell value.
    pub value: ScalarValue,
}

impl ColumnValue {
    /// Create a column value.
    pub fn new(name: impl Into<String>, value: ScalarValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One change against a table row.
///
/// Closed tagged variant: consumers match exhaustively and the compiler
/// flags any future extension.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ChangeRecord {
    /// A new row.
    Insert {
        /// Values identifying the row.
        key_columns: Vec<ColumnValue>,
        /// Remaining column values.
        values: Vec<ColumnValue>,
    },
    /// An update to an existing row.
    Update {
        /// Values identifying the row.
        key_columns: Vec<ColumnValue>,
        /// New column values.
        values: Vec<ColumnValue>,
    },
    /// A row deletion.
    Delete {
        /// Values identifying the row.
        key_columns: Vec<ColumnValue>,
    },
}

impl ChangeRecord {
    /// Short operation tag, for logs.
    pub fn op_name(&self) -> &'static str {
        match self {
            ChangeRecord::Insert { .. } => "INSERT",
            ChangeRecord::Update { .. } => "UPDATE",
            ChangeRecord::Delete { .. } => "DELETE",
        }
    }
}

/// Encode a change list into an opaque commit payload.
pub fn encode_changes(changes: &[ChangeRecord]) -> Result<Vec<u8>, TypesError> {
    bincode::serialize(changes).map_err(|e| TypesError::Encode {
        message: e.to_string(),
    })
}

/// Decode a commit payload back into its change list.
pub fn decode_changes(payload: &[u8]) -> Result<Vec<ChangeRecord>, TypesError> {
    bincode::deserialize(payload).map_err(|e| TypesError::Decode {
        message: e.to_string(),
    })
}

/// SHA-256 of a commit payload.
pub fn payload_hash(payload: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}
