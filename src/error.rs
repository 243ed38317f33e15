//! Error types for ThreadLens
//!
//! Engine operations are total and never fail. Errors only arise at the
//! boundaries: the storage backend and values decoded from the host.

use thiserror::Error;

/// Main error type for ThreadLens operations
#[derive(Error, Debug)]
pub enum LensError {
    /// The storage backend rejected a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// A persisted value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The host supplied a value the engine cannot interpret
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for ThreadLens operations
pub type Result<T> = std::result::Result<T, LensError>;
