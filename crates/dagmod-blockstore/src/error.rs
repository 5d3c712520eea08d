//! Error types for the dagmod-blockstore crate

use cid::Cid;
use thiserror::Error;

/// Result type alias using `BlockStoreError`
pub type Result<T> = std::result::Result<T, BlockStoreError>;

/// Errors that can occur during block storage operations
#[derive(Error, Debug)]
pub enum BlockStoreError {
    /// Block not found
    #[error("block not found: {0}")]
    NotFound(Cid),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Stored bytes no longer match their CID
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Pin operation failed
    #[error("pin operation failed: {0}")]
    PinFailed(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for BlockStoreError {
    fn from(err: serde_json::Error) -> Self {
        BlockStoreError::Serialization(err.to_string())
    }
}

impl From<serde_ipld_dagcbor::DecodeError<std::convert::Infallible>> for BlockStoreError {
    fn from(err: serde_ipld_dagcbor::DecodeError<std::convert::Infallible>) -> Self {
        BlockStoreError::Deserialization(err.to_string())
    }
}
