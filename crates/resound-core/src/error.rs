//! Error types for Resound core.

use thiserror::Error;

/// Core error type for graph description handling.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Reference node without a key")]
    MissingReferenceKey,

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type alias for Resound core operations.
pub type Result<T> = std::result::Result<T, Error>;
