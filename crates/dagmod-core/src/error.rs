//! Error types for the dagmod-core crate

use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while mutating or reading a DAG file
#[derive(Error, Debug)]
pub enum CoreError {
    /// Block store error
    #[error("block store error: {0}")]
    BlockStore(#[from] dagmod_blockstore::BlockStoreError),

    /// The streaming reader did not land where the handle's cursor points
    #[error("failed to seek properly: requested offset {expected}, reader at {actual}")]
    SeekFailed { expected: u64, actual: u64 },

    /// Seeking relative to the end of the file
    #[error("seeking from the end is not implemented")]
    SeekEndNotImplemented,

    /// Raw whence value outside 0 (start), 1 (current), 2 (end)
    #[error("unrecognized whence: {0}")]
    UnrecognizedWhence(i32),

    /// Seek target before the start of the file
    #[error("invalid offset: {0}")]
    InvalidOffset(i64),

    /// Node shape contradicts its metadata
    #[error("tree corruption: {0}")]
    TreeCorruption(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// IO error from a splitter source
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
