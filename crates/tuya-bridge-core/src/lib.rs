//! Core traits and types for the Tuya bridge.
//!
//! This crate defines the foundational abstractions shared by the storage and
//! device crates: the data point value model, the error type, configuration
//! defaults, logging bootstrap and the storage backend trait.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod value;

pub use error::{Error, Result};
pub use value::DataValue;

/// Re-exports commonly used types.
pub mod prelude {
    // Configuration
    pub use crate::config::{defaults, env_vars, BridgeConfig, LogFormat};

    // Error handling
    pub use crate::error::{Error, Result};

    // Values
    pub use crate::value::DataValue;

    // Storage
    pub use crate::storage::{StorageBackend, StorageError};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
