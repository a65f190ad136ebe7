//! Pairing filter and initial property builder.

use serde::{Deserialize, Serialize};
use tuya_bridge_storage::DeviceStore;

use crate::error::DeviceResult;
use crate::mapping::{DeviceClassDescriptor, Partition};
use crate::state::keys;
use crate::vendor::DataPoint;

/// A device listed by the vendor cloud during discovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: Vec<DataPoint>,
}

impl DiscoveredDevice {
    pub fn new(id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = product_id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_status(mut self, status: Vec<DataPoint>) -> Self {
        self.status = status;
        self
    }
}

/// Initial store written at pairing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingStore {
    pub tuya_capabilities: Vec<String>,
    pub tuya_category: String,
}

/// Host capabilities and store of a newly paired device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingProperties {
    pub capabilities: Vec<String>,
    pub store: PairingStore,
}

impl PairingProperties {
    /// Write the initial store of a device.
    pub fn persist(&self, store: &DeviceStore) -> DeviceResult<()> {
        store.set_many(vec![
            (
                keys::TUYA_CAPABILITIES.to_string(),
                serde_json::Value::from(self.store.tuya_capabilities.clone()),
            ),
            (
                keys::TUYA_CATEGORY.to_string(),
                serde_json::Value::String(self.store.tuya_category.clone()),
            ),
        ])?;
        Ok(())
    }
}

/// Product allow-list first, then the category set.
pub fn matches(descriptor: &DeviceClassDescriptor, device: &DiscoveredDevice) -> bool {
    if descriptor.product_ids.contains(&device.product_id.as_str()) {
        return true;
    }
    descriptor.categories.contains(&device.category.as_str())
}

/// Build capabilities and stored vendor codes from the reported status.
///
/// Mapped read-write and read-only codes add their host capability; read-write
/// and setting codes are recorded as declared vendor capabilities.
pub fn build_properties(descriptor: &DeviceClassDescriptor, device: &DiscoveredDevice) -> PairingProperties {
    let mut props = PairingProperties {
        capabilities: Vec::new(),
        store: PairingStore {
            tuya_capabilities: Vec::new(),
            tuya_category: device.category.clone(),
        },
    };

    for point in &device.status {
        let code = point.code.as_str();
        let partition = descriptor.partition(code);

        if matches!(partition, Some(Partition::ReadWrite | Partition::ReadOnly)) {
            if let Some(capability) = descriptor.lookup(code) {
                push_unique(&mut props.capabilities, capability);
                if partition == Some(Partition::ReadWrite) {
                    push_unique(&mut props.store.tuya_capabilities, code);
                }
            }
        }

        if partition == Some(Partition::Setting) {
            push_unique(&mut props.store.tuya_capabilities, code);
        }
    }

    props
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|i| i == item) {
        list.push(item.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CodeMapping;

    static CLASS: DeviceClassDescriptor = DeviceClassDescriptor {
        id: "air_purifier",
        name: "Air Purifier",
        categories: &["kj"],
        product_ids: &["vpb3fd5rhtgd7b4t"],
        mappings: &[
            CodeMapping::new("switch", "onoff"),
            CodeMapping::new("onoff", "onoff"),
            CodeMapping::new("pm25", "measure_pm25"),
        ],
        read_write: &["switch", "onoff"],
        read_only: &["pm25"],
        setting_only: &["child_lock_mode"],
    };

    #[test]
    fn test_allow_list_overrides_category() {
        let device = DiscoveredDevice::new("d1", "wk").with_product_id("vpb3fd5rhtgd7b4t");
        assert!(matches(&CLASS, &device));
        assert!(matches(&CLASS, &DiscoveredDevice::new("d2", "kj")));
        assert!(!matches(&CLASS, &DiscoveredDevice::new("d3", "fs").with_product_id("other")));
    }

    #[test]
    fn test_build_properties() {
        let device = DiscoveredDevice::new("d1", "kj").with_status(vec![
            DataPoint::new("switch", true),
            DataPoint::new("onoff", true),
            DataPoint::new("pm25", 8),
            DataPoint::new("child_lock_mode", false),
            DataPoint::new("unknown", 1),
        ]);

        let props = build_properties(&CLASS, &device);
        assert_eq!(props.capabilities, vec!["onoff", "measure_pm25"]);
        assert_eq!(
            props.store.tuya_capabilities,
            vec!["switch", "onoff", "child_lock_mode"]
        );
        assert_eq!(props.store.tuya_category, "kj");
    }
}
