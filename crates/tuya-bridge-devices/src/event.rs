//! Events delivered to a device runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tuya_bridge_core::DataValue;

use crate::vendor::DataPoint;

/// Host settings change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsEvent {
    pub changed_keys: Vec<String>,
    pub new_settings: BTreeMap<String, DataValue>,
}

impl SettingsEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a changed key and its new value.
    pub fn with_change(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        let key = key.into();
        if !self.changed_keys.contains(&key) {
            self.changed_keys.push(key.clone());
        }
        self.new_settings.insert(key, value.into());
        self
    }

    pub fn changed(&self, key: &str) -> bool {
        self.changed_keys.iter().any(|k| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.new_settings.get(key)
    }
}

/// One unit of work for a device. Events are processed strictly in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// The host wrote a capability value.
    HostWrite { capability: String, value: DataValue },
    /// The vendor pushed status, with the codes that changed.
    VendorStatus {
        status: Vec<DataPoint>,
        changed: Vec<String>,
    },
    SettingsChanged(SettingsEvent),
}

impl DeviceEvent {
    pub fn host_write(capability: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self::HostWrite {
            capability: capability.into(),
            value: value.into(),
        }
    }

    /// Status push where every reported code counts as changed.
    pub fn status(status: Vec<DataPoint>) -> Self {
        let changed = status.iter().map(|p| p.code.clone()).collect();
        Self::VendorStatus { status, changed }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::HostWrite { .. } => "host_write",
            Self::VendorStatus { .. } => "vendor_status",
            Self::SettingsChanged(_) => "settings_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_event_builder() {
        let event = SettingsEvent::new()
            .with_change("fan_direction", "backward")
            .with_change("fan_direction", "forward");
        assert_eq!(event.changed_keys, vec!["fan_direction".to_string()]);
        assert_eq!(event.get("fan_direction").and_then(|v| v.as_str()), Some("forward"));
        assert!(!event.changed("inverse"));
    }

    #[test]
    fn test_status_marks_all_changed() {
        let event = DeviceEvent::status(vec![DataPoint::new("switch", true), DataPoint::new("light", false)]);
        match event {
            DeviceEvent::VendorStatus { changed, .. } => assert_eq!(changed, vec!["switch", "light"]),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
