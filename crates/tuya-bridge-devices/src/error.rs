//! Error types for device translation.

use thiserror::Error;
use tuya_bridge_core::storage::StorageError;

use crate::sinks::SinkError;

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors raised while translating, migrating or running a device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A second outgoing handler was registered for one host capability.
    #[error("Duplicate listener for capability: {0}")]
    DuplicateListener(String),

    /// A host value could not be converted into a vendor command.
    #[error("Invalid value for '{capability}': {reason}")]
    InvalidValue { capability: String, reason: String },

    /// A class table failed validation at load.
    #[error("Invalid class table '{class}': {reason}")]
    InvalidDescriptor { class: String, reason: String },

    /// No device class claims the device.
    #[error("Unknown device class: {0}")]
    UnknownClass(String),

    /// Device is not registered.
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Steady-state handling requested before the migration phase ran.
    #[error("Device runtime not started: {0}")]
    NotStarted(String),

    /// Event loop has shut down.
    #[error("Device runtime stopped: {0}")]
    Stopped(String),

    /// Host or vendor boundary failure.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Persisted state could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<DeviceError> for tuya_bridge_core::Error {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Storage(s) => s.into(),
            DeviceError::NotFound(s) => tuya_bridge_core::Error::NotFound(s),
            DeviceError::InvalidValue { .. } | DeviceError::InvalidDescriptor { .. } => {
                tuya_bridge_core::Error::Validation(e.to_string())
            }
            other => tuya_bridge_core::Error::Other(anyhow::anyhow!(other.to_string())),
        }
    }
}
