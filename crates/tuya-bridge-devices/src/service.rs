//! Bridge service: pairs devices and routes events to their runtimes.

use dashmap::DashMap;
use std::sync::Arc;
use tuya_bridge_core::config::{defaults, BridgeConfig};
use tuya_bridge_core::storage::StorageBackend;
use tuya_bridge_storage::{create_backend, DeviceStore};

use crate::classes::ClassRegistry;
use crate::error::{DeviceError, DeviceResult};
use crate::event::DeviceEvent;
use crate::pairing::{DiscoveredDevice, PairingProperties};
use crate::runtime::{DeviceHandle, DeviceRuntime};
use crate::sinks::{HostDevice, VendorClient};
use crate::state::DeviceState;

/// Result of pairing one discovered device.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedDevice {
    pub device_id: String,
    pub class_id: &'static str,
    pub properties: PairingProperties,
}

/// Owns the class registry, the shared storage backend and one runtime task
/// per attached device.
pub struct BridgeService {
    backend: Arc<dyn StorageBackend>,
    registry: ClassRegistry,
    vendor: Arc<dyn VendorClient>,
    devices: DashMap<String, DeviceHandle>,
    event_capacity: usize,
}

impl BridgeService {
    pub fn new(backend: Arc<dyn StorageBackend>, registry: ClassRegistry, vendor: Arc<dyn VendorClient>) -> Self {
        Self {
            backend,
            registry,
            vendor,
            devices: DashMap::new(),
            event_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Build the storage backend and built-in classes from configuration.
    pub fn from_config(config: &BridgeConfig, vendor: Arc<dyn VendorClient>) -> DeviceResult<Self> {
        let backend = create_backend(&config.storage_backend, &config.storage_config)?;
        let registry = ClassRegistry::with_builtin_classes()?;
        Ok(Self::new(backend, registry, vendor).with_event_capacity(config.event_channel_capacity))
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn store(&self, device_id: &str) -> DeviceStore {
        DeviceStore::new(self.backend.clone(), device_id)
    }

    /// Classify a discovered device and write its initial store.
    pub fn pair(&self, device: &DiscoveredDevice) -> DeviceResult<PairedDevice> {
        let strategy = self
            .registry
            .classify(device)
            .ok_or_else(|| DeviceError::UnknownClass(format!("{} ({})", device.id, device.category)))?;

        let properties = strategy.build_properties(device);
        properties.persist(&self.store(&device.id))?;

        tracing::info!(
            device_id = %device.id,
            class = %strategy.id(),
            "Paired device with {} capabilities",
            properties.capabilities.len()
        );
        Ok(PairedDevice {
            device_id: device.id.clone(),
            class_id: strategy.id(),
            properties,
        })
    }

    /// Start the runtime of a paired device on its own task.
    ///
    /// A runtime already attached under the same id is shut down first.
    pub async fn attach(&self, device_id: &str, class_id: &str, host: Arc<dyn HostDevice>) -> DeviceResult<()> {
        let strategy = self
            .registry
            .get(class_id)
            .ok_or_else(|| DeviceError::UnknownClass(class_id.to_string()))?;

        if let Some((_, previous)) = self.devices.remove(device_id) {
            previous.shutdown().await?;
        }

        let state = DeviceState::load(self.store(device_id))?;
        let runtime = DeviceRuntime::new(state, strategy, host, self.vendor.clone());
        self.devices
            .insert(device_id.to_string(), runtime.spawn(self.event_capacity));
        Ok(())
    }

    /// Queue an event for a device.
    pub async fn dispatch(&self, device_id: &str, event: DeviceEvent) -> DeviceResult<()> {
        let sender = self
            .devices
            .get(device_id)
            .map(|handle| handle.sender())
            .ok_or_else(|| DeviceError::NotFound(device_id.to_string()))?;

        sender
            .send(event)
            .await
            .map_err(|_| DeviceError::Stopped(device_id.to_string()))
    }

    /// Stop a device's runtime after its queued events are handled.
    pub async fn detach(&self, device_id: &str) -> DeviceResult<DeviceRuntime> {
        let (_, handle) = self
            .devices
            .remove(device_id)
            .ok_or_else(|| DeviceError::NotFound(device_id.to_string()))?;
        handle.shutdown().await
    }

    /// Detach a device and discard its persisted state.
    ///
    /// Returns the number of removed store keys.
    pub async fn unpair(&self, device_id: &str) -> DeviceResult<usize> {
        match self.detach(device_id).await {
            Ok(_) | Err(DeviceError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let removed = self.store(device_id).clear()?;
        tracing::info!(device_id = %device_id, "Unpaired device, removed {} keys", removed);
        Ok(removed)
    }

    pub fn is_attached(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Stop every runtime, draining each queue.
    pub async fn shutdown(&self) {
        let ids = self.device_ids();
        let handles: Vec<_> = ids
            .iter()
            .filter_map(|id| self.devices.remove(id).map(|(_, handle)| handle))
            .collect();

        let results = futures::future::join_all(handles.into_iter().map(DeviceHandle::shutdown)).await;
        for result in results {
            if let Err(e) = result {
                tracing::warn!("Device runtime did not stop cleanly: {}", e);
            }
        }
    }
}
