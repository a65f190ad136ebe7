//! Storage backend abstraction.
//!
//! Backends hold raw bytes under `(table, key)`. The bridge uses one table
//! per paired device (see `tuya_bridge_storage::DeviceStore`) and keeps JSON
//! values in it, so a backend never interprets what it stores.

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value is not valid JSON for the requested type.
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Unknown backend type or invalid backend options.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure reported by the storage engine itself.
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Storage error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Byte store keyed by table and key.
///
/// Implementations must be safe to share across device runtimes.
pub trait StorageBackend: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, table: &str, key: &str, value: &[u8]) -> Result<()>;

    fn read(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`. Returns whether it existed.
    fn delete(&self, table: &str, key: &str) -> Result<bool>;

    /// Entries whose key starts with `prefix`, in key order. An empty prefix
    /// lists the whole table.
    fn scan(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Write several entries of one table atomically.
    fn write_batch(&self, table: &str, items: Vec<(String, Vec<u8>)>) -> Result<()>;

    /// Whether stored data survives a restart.
    fn is_persistent(&self) -> bool;
}
