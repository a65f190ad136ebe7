//! Error type shared across the bridge crates.

use thiserror::Error;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top level bridge error.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<crate::storage::StorageError> for Error {
    fn from(e: crate::storage::StorageError) -> Self {
        match e {
            crate::storage::StorageError::Serialization(s) => Error::Serialization(s),
            crate::storage::StorageError::Configuration(s) => Error::Config(s),
            crate::storage::StorageError::KeyNotFound(s) => Error::NotFound(s),
            other => Error::Storage(other.to_string()),
        }
    }
}
