//! Scripted vendor cloud client.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tuya_bridge_devices::sinks::{SinkError, VendorClient};
use tuya_bridge_devices::vendor::{DataPoint, DeviceSpecification, VendorCommand};

/// Vendor client answering from canned status and specifications.
#[derive(Debug, Default)]
pub struct MockVendorClient {
    status: RwLock<BTreeMap<String, Vec<DataPoint>>>,
    specifications: RwLock<BTreeMap<String, DeviceSpecification>>,
    commands: RwLock<Vec<(String, VendorCommand)>>,
    failing_codes: RwLock<BTreeSet<String>>,
    status_offline: AtomicBool,
    specification_offline: AtomicBool,
    status_calls: AtomicUsize,
    specification_calls: AtomicUsize,
}

impl MockVendorClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(self, device_id: &str, status: Vec<DataPoint>) -> Self {
        self.status.write().insert(device_id.to_string(), status);
        self
    }

    pub fn with_specification(self, device_id: &str, spec: DeviceSpecification) -> Self {
        self.specifications.write().insert(device_id.to_string(), spec);
        self
    }

    /// Commands for `code` fail with a network error.
    pub fn fail_commands(self, code: &str) -> Self {
        self.failing_codes.write().insert(code.to_string());
        self
    }

    pub fn set_status_offline(&self, offline: bool) {
        self.status_offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_specification_offline(&self, offline: bool) {
        self.specification_offline.store(offline, Ordering::SeqCst);
    }

    /// Sent commands in order, with their device id.
    pub fn commands(&self) -> Vec<(String, VendorCommand)> {
        self.commands.read().clone()
    }

    pub fn commands_for(&self, device_id: &str) -> Vec<VendorCommand> {
        self.commands
            .read()
            .iter()
            .filter(|(id, _)| id == device_id)
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn specification_calls(&self) -> usize {
        self.specification_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VendorClient for MockVendorClient {
    async fn send_command(&self, device_id: &str, command: VendorCommand) -> Result<(), SinkError> {
        if self.failing_codes.read().contains(&command.code) {
            return Err(SinkError::Network(format!("command '{}' timed out", command.code)));
        }
        self.commands.write().push((device_id.to_string(), command));
        Ok(())
    }

    async fn get_status(&self, device_id: &str) -> Result<Vec<DataPoint>, SinkError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.status_offline.load(Ordering::SeqCst) {
            return Err(SinkError::Network("status request failed".to_string()));
        }
        Ok(self.status.read().get(device_id).cloned().unwrap_or_default())
    }

    async fn get_specification(&self, device_id: &str) -> Result<DeviceSpecification, SinkError> {
        self.specification_calls.fetch_add(1, Ordering::SeqCst);
        if self.specification_offline.load(Ordering::SeqCst) {
            return Err(SinkError::Network("specification request failed".to_string()));
        }
        self.specifications
            .read()
            .get(device_id)
            .cloned()
            .ok_or_else(|| SinkError::NotFound(device_id.to_string()))
    }
}
