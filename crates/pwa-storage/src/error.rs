//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Only GET requests can be stored, got {0}")]
    UnsupportedMethod(String),

    #[error("Partial responses (206) cannot be stored: {0}")]
    PartialResponse(String),
}
