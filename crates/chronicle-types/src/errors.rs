//! # Shared Type Errors
//!
//! Codec failures for the change-record payload.

use thiserror::Error;

/// Errors from the shared type layer.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Change list could not be serialized.
    #[error("Failed to encode change list: {message}")]
    Encode {
        /// Serializer message.
        message: String,
    },

    /// Commit payload could not be deserialized.
    #[error("Failed to decode commit payload: {message}")]
    Decode {
        /// Deserializer message.
        message: String,
    },
}
