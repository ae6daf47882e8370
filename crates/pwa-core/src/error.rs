//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] pwa_storage::StorageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
