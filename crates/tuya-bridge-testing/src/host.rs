//! In-memory host device.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use tuya_bridge_core::DataValue;
use tuya_bridge_devices::sinks::{CapabilityOptions, HostDevice, SinkError};

/// Host device that records every write.
///
/// Capabilities marked with [`MockHostDevice::reject_values`] refuse value
/// writes the way the host rejects values outside a capability's domain.
#[derive(Debug, Default)]
pub struct MockHostDevice {
    capabilities: RwLock<BTreeSet<String>>,
    settings: RwLock<BTreeMap<String, DataValue>>,
    values: RwLock<BTreeMap<String, DataValue>>,
    options: RwLock<BTreeMap<String, CapabilityOptions>>,
    writes: RwLock<Vec<(String, DataValue)>>,
    flows: RwLock<Vec<String>>,
    rejecting: RwLock<BTreeSet<String>>,
}

impl MockHostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities<I, S>(self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .write()
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    pub fn with_setting(self, key: &str, value: impl Into<DataValue>) -> Self {
        self.settings.write().insert(key.to_string(), value.into());
        self
    }

    pub fn reject_values(self, capability: &str) -> Self {
        self.rejecting.write().insert(capability.to_string());
        self
    }

    /// Last value written to a capability.
    pub fn value(&self, capability: &str) -> Option<DataValue> {
        self.values.read().get(capability).cloned()
    }

    pub fn setting_value(&self, key: &str) -> Option<DataValue> {
        self.settings.read().get(key).cloned()
    }

    pub fn options(&self, capability: &str) -> Option<CapabilityOptions> {
        self.options.read().get(capability).copied()
    }

    /// Every capability write in order.
    pub fn writes(&self) -> Vec<(String, DataValue)> {
        self.writes.read().clone()
    }

    pub fn flows(&self) -> Vec<String> {
        self.flows.read().clone()
    }
}

#[async_trait]
impl HostDevice for MockHostDevice {
    fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.read().contains(capability)
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.read().iter().cloned().collect()
    }

    fn setting(&self, key: &str) -> Option<DataValue> {
        self.setting_value(key)
    }

    async fn set_capability_value(&self, capability: &str, value: DataValue) -> Result<(), SinkError> {
        if !self.has_capability(capability) {
            return Err(SinkError::NotFound(capability.to_string()));
        }
        if self.rejecting.read().contains(capability) {
            return Err(SinkError::Rejected {
                capability: capability.to_string(),
                reason: format!("value {} outside domain", value),
            });
        }

        self.writes.write().push((capability.to_string(), value.clone()));
        self.values.write().insert(capability.to_string(), value);
        Ok(())
    }

    async fn add_capability(&self, capability: &str) -> Result<(), SinkError> {
        self.capabilities.write().insert(capability.to_string());
        Ok(())
    }

    async fn remove_capability(&self, capability: &str) -> Result<(), SinkError> {
        self.capabilities.write().remove(capability);
        self.values.write().remove(capability);
        Ok(())
    }

    async fn set_capability_options(
        &self,
        capability: &str,
        options: CapabilityOptions,
    ) -> Result<(), SinkError> {
        if !self.has_capability(capability) {
            return Err(SinkError::NotFound(capability.to_string()));
        }
        self.options.write().insert(capability.to_string(), options);
        Ok(())
    }

    async fn set_setting(&self, key: &str, value: DataValue) -> Result<(), SinkError> {
        self.settings.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn trigger_flow(&self, card: &str) -> Result<(), SinkError> {
        self.flows.write().push(card.to_string());
        Ok(())
    }
}
