//! Per-class behavior.
//!
//! A [`ClassStrategy`] is picked by device class when a runtime is built. The
//! generic table driven translation lives in the [`Translator`]; strategies
//! only add what a table cannot express (category dependent routing, settings
//! side effects, migrations, flow triggers). [`TableStrategy`] is the default
//! and adds nothing.
//!
//! [`Translator`]: crate::translator::Translator

use std::fmt;
use tuya_bridge_core::DataValue;

use crate::event::SettingsEvent;
use crate::mapping::{CodeMapping, DeviceClassDescriptor};
use crate::migration::Migration;
use crate::pairing::{self, DiscoveredDevice, PairingProperties};
use crate::sinks::HostDevice;
use crate::state::DeviceState;
use crate::vendor::{DataPoint, VendorCommand};

/// Read-only view handed to strategies while they compute effects.
pub struct StrategyContext<'a> {
    pub state: &'a DeviceState,
    pub host: &'a dyn HostDevice,
}

impl<'a> StrategyContext<'a> {
    pub fn new(state: &'a DeviceState, host: &'a dyn HostDevice) -> Self {
        Self { state, host }
    }

    /// Host boolean setting; missing or non-boolean is `false`.
    pub fn setting_enabled(&self, key: &str) -> bool {
        self.host
            .setting(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// An action the runtime performs against the host or vendor.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetCapability { capability: String, value: DataValue },
    SetSetting { key: String, value: DataValue },
    SendCommand(VendorCommand),
    AddCapability(String),
    RemoveCapability(String),
    TriggerFlow(String),
}

impl Effect {
    pub fn set_capability(capability: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self::SetCapability {
            capability: capability.into(),
            value: value.into(),
        }
    }

    pub fn set_setting(key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self::SetSetting {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn command(code: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self::SendCommand(VendorCommand::new(code, value))
    }

    /// True when the effect changes the host capability set.
    pub fn alters_capabilities(&self) -> bool {
        matches!(self, Self::AddCapability(_) | Self::RemoveCapability(_))
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetCapability { capability, value } => write!(f, "set {} = {}", capability, value),
            Self::SetSetting { key, value } => write!(f, "setting {} = {}", key, value),
            Self::SendCommand(cmd) => write!(f, "command {} = {}", cmd.code, cmd.value),
            Self::AddCapability(c) => write!(f, "add capability {}", c),
            Self::RemoveCapability(c) => write!(f, "remove capability {}", c),
            Self::TriggerFlow(card) => write!(f, "trigger {}", card),
        }
    }
}

/// Device class behavior selected at construction.
pub trait ClassStrategy: Send + Sync {
    fn descriptor(&self) -> &'static DeviceClassDescriptor;

    fn id(&self) -> &'static str {
        self.descriptor().id
    }

    /// Effective mapping of a vendor code for this device.
    ///
    /// Strategies may retarget a code depending on persisted state. Unknown
    /// codes yield `None`.
    fn route(&self, code: &str, _state: &DeviceState) -> Option<CodeMapping> {
        self.descriptor().mapping(code).copied()
    }

    /// Extra effects for a status push, after table translation.
    fn status_effects(
        &self,
        _status: &[DataPoint],
        _changed: &[String],
        _ctx: &StrategyContext<'_>,
    ) -> Vec<Effect> {
        Vec::new()
    }

    /// Effects for a host settings change.
    fn settings_effects(&self, event: &SettingsEvent, _ctx: &StrategyContext<'_>) -> Vec<Effect> {
        forward_settings(self.descriptor(), event)
    }

    /// Migrations in execution order.
    fn migrations(&self) -> Vec<Box<dyn Migration>> {
        Vec::new()
    }

    fn matches(&self, device: &DiscoveredDevice) -> bool {
        pairing::matches(self.descriptor(), device)
    }

    fn build_properties(&self, device: &DiscoveredDevice) -> PairingProperties {
        pairing::build_properties(self.descriptor(), device)
    }
}

/// Forward changed settings whose keys are vendor setting codes, one command
/// per key.
pub fn forward_settings(descriptor: &DeviceClassDescriptor, event: &SettingsEvent) -> Vec<Effect> {
    event
        .changed_keys
        .iter()
        .filter(|key| descriptor.is_setting(key))
        .filter_map(|key| {
            event
                .get(key)
                .map(|value| Effect::command(key.as_str(), value.clone()))
        })
        .collect()
}

/// Table-only strategy.
#[derive(Debug, Clone, Copy)]
pub struct TableStrategy {
    descriptor: &'static DeviceClassDescriptor,
}

impl TableStrategy {
    pub const fn new(descriptor: &'static DeviceClassDescriptor) -> Self {
        Self { descriptor }
    }
}

impl ClassStrategy for TableStrategy {
    fn descriptor(&self) -> &'static DeviceClassDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CodeMapping;

    static CLASS: DeviceClassDescriptor = DeviceClassDescriptor {
        id: "blinds",
        name: "Blinds",
        categories: &["cl"],
        product_ids: &[],
        mappings: &[CodeMapping::new("control", "windowcoverings_state")],
        read_write: &["control"],
        read_only: &[],
        setting_only: &["opposite", "control_back"],
    };

    #[test]
    fn test_forward_settings_only_vendor_codes() {
        let event = SettingsEvent::new()
            .with_change("opposite", true)
            .with_change("inverse", true)
            .with_change("control_back", false);

        let effects = forward_settings(&CLASS, &event);
        assert_eq!(
            effects,
            vec![
                Effect::command("opposite", true),
                Effect::command("control_back", false),
            ]
        );
    }

    #[test]
    fn test_effect_display() {
        assert_eq!(
            Effect::set_capability("fan_speed", 0.5).to_string(),
            "set fan_speed = 0.5"
        );
        assert!(Effect::AddCapability("dim".into()).alters_capabilities());
        assert!(!Effect::TriggerFlow("x".into()).alters_capabilities());
    }

    #[test]
    fn test_table_strategy_routes_from_table() {
        let strategy = TableStrategy::new(&CLASS);
        assert_eq!(strategy.id(), "blinds");
        assert_eq!(
            strategy.descriptor().lookup("control"),
            Some("windowcoverings_state")
        );
        assert!(strategy.migrations().is_empty());
    }
}
