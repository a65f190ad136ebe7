//! Storage layer for the Tuya bridge.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `redb` | ✅ | Persistent redb backend |
//! | `memory` | ✅ | Volatile in-memory backend |
//!
//! Paired devices keep their vendor capability list, numeric range metadata
//! and migration markers in a [`DeviceStore`] namespace.

pub mod backends;
pub mod device_store;

pub use backends::{available_backends, create_backend};
pub use device_store::DeviceStore;

#[cfg(feature = "memory")]
pub use backends::{MemoryBackend, MemoryBackendConfig};
#[cfg(feature = "redb")]
pub use backends::{RedbBackend, RedbBackendConfig};

pub use tuya_bridge_core::storage::{StorageBackend, StorageError};
