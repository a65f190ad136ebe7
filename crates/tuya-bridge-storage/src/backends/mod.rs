//! Storage backends, one module per enabled feature.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tuya_bridge_core::storage::{Result, StorageBackend, StorageError};

#[cfg(feature = "redb")]
pub mod redb;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redb")]
pub use self::redb::{RedbBackend, RedbBackendConfig};

#[cfg(feature = "memory")]
pub use memory::{MemoryBackend, MemoryBackendConfig};

fn parse_config<T: DeserializeOwned>(backend_type: &str, config: &Value) -> Result<T> {
    serde_json::from_value(config.clone())
        .map_err(|e| StorageError::Configuration(format!("Invalid {} config: {}", backend_type, e)))
}

/// Build the backend named by `backend_type` from its JSON options.
///
/// ```no_run
/// use tuya_bridge_storage::backends::create_backend;
/// use serde_json::json;
///
/// let backend = create_backend("redb", &json!({ "path": "./data/bridge.redb" })).unwrap();
/// assert!(backend.is_persistent());
/// ```
pub fn create_backend(backend_type: &str, config: &Value) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match backend_type {
        #[cfg(feature = "redb")]
        "redb" => Arc::new(RedbBackend::new(parse_config(backend_type, config)?)?),

        #[cfg(feature = "memory")]
        "memory" => Arc::new(MemoryBackend::new(parse_config(backend_type, config)?)),

        _ => {
            return Err(StorageError::Configuration(format!(
                "Unknown backend type: {}. Available backends: {}",
                backend_type,
                available_backends().join(", ")
            )))
        }
    };

    tracing::info!(
        backend = backend_type,
        persistent = backend.is_persistent(),
        "Storage backend ready"
    );
    Ok(backend)
}

/// Backend types compiled into this build.
pub fn available_backends() -> Vec<&'static str> {
    [
        #[cfg(feature = "redb")]
        "redb",
        #[cfg(feature = "memory")]
        "memory",
    ]
    .to_vec()
}
