//! Host platform and vendor cloud boundaries.
//!
//! A device runtime receives both sinks at construction; nothing is looked up
//! globally. Implementations own transport, authentication and retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tuya_bridge_core::DataValue;

use crate::vendor::{DataPoint, DeviceSpecification, VendorCommand};

/// Failure reported by a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The host refused a value (outside the capability's declared domain).
    #[error("Value rejected by '{capability}': {reason}")]
    Rejected { capability: String, reason: String },

    /// Vendor cloud call failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Capability, setting or flow card does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Numeric options of a host capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapabilityOptions {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Host-visible device object.
///
/// Capability and setting queries are synchronous views of host state; writes
/// are asynchronous and fallible.
#[async_trait]
pub trait HostDevice: Send + Sync {
    fn has_capability(&self, capability: &str) -> bool;

    fn capabilities(&self) -> Vec<String>;

    fn setting(&self, key: &str) -> Option<DataValue>;

    async fn set_capability_value(&self, capability: &str, value: DataValue) -> Result<(), SinkError>;

    async fn add_capability(&self, capability: &str) -> Result<(), SinkError>;

    async fn remove_capability(&self, capability: &str) -> Result<(), SinkError>;

    async fn set_capability_options(
        &self,
        capability: &str,
        options: CapabilityOptions,
    ) -> Result<(), SinkError>;

    async fn set_setting(&self, key: &str, value: DataValue) -> Result<(), SinkError>;

    /// Fire a device trigger card by name.
    async fn trigger_flow(&self, card: &str) -> Result<(), SinkError>;
}

/// Vendor cloud client, scoped per call by device id.
#[async_trait]
pub trait VendorClient: Send + Sync {
    async fn send_command(&self, device_id: &str, command: VendorCommand) -> Result<(), SinkError>;

    async fn get_status(&self, device_id: &str) -> Result<Vec<DataPoint>, SinkError>;

    async fn get_specification(&self, device_id: &str) -> Result<DeviceSpecification, SinkError>;
}
