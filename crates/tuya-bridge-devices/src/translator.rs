//! Capability translation.
//!
//! For one device the translator decides which host capabilities get an
//! outgoing listener, converts vendor status into host capability writes and
//! host writes into vendor commands.
//!
//! Listener planning walks the class table once:
//!
//! ```text
//! host lacks capability                        -> Unmapped
//! code read-write and declared by the device   -> candidate
//! otherwise                                    -> Suppressed
//! best candidate per capability (fidelity, then table order) -> Listening
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tuya_bridge_core::DataValue;

use crate::error::{DeviceError, DeviceResult};
use crate::mapping::{enum_to_host, enum_to_vendor, CodeMapping, Conversion};
use crate::sinks::HostDevice;
use crate::state::DeviceState;
use crate::strategy::{ClassStrategy, Effect};
use crate::vendor::{DataPoint, VendorCommand};

/// Per-code listener state for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Host device does not have the target capability.
    Unmapped,
    /// This code owns the outgoing handler of its capability.
    Listening,
    /// Capability exists but writes are not routed through this code.
    Suppressed,
}

/// Outgoing handlers, at most one per host capability.
#[derive(Debug, Default, Clone)]
pub struct ListenerTable {
    states: BTreeMap<String, ListenerState>,
    active: BTreeMap<String, CodeMapping>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the outgoing handler of `mapping.capability` to `mapping.code`.
    pub fn register(&mut self, mapping: CodeMapping) -> DeviceResult<()> {
        if self.active.contains_key(mapping.capability) {
            return Err(DeviceError::DuplicateListener(mapping.capability.to_string()));
        }
        self.active.insert(mapping.capability.to_string(), mapping);
        self.states.insert(mapping.code.to_string(), ListenerState::Listening);
        Ok(())
    }

    fn mark(&mut self, code: &str, state: ListenerState) {
        self.states.entry(code.to_string()).or_insert(state);
    }

    pub fn state(&self, code: &str) -> Option<ListenerState> {
        self.states.get(code).copied()
    }

    /// Mapping owning the outgoing handler of a capability.
    pub fn listener(&self, capability: &str) -> Option<&CodeMapping> {
        self.active.get(capability)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Table driven translation for one device class.
#[derive(Clone)]
pub struct Translator {
    strategy: Arc<dyn ClassStrategy>,
}

impl Translator {
    pub fn new(strategy: Arc<dyn ClassStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &Arc<dyn ClassStrategy> {
        &self.strategy
    }

    /// Decide the outgoing listeners for the current host and vendor
    /// capability sets.
    pub fn plan_listeners(&self, state: &DeviceState, host: &dyn HostDevice) -> DeviceResult<ListenerTable> {
        let descriptor = self.strategy.descriptor();
        let mut table = ListenerTable::new();
        let mut best: Vec<CodeMapping> = Vec::new();

        for entry in descriptor.mappings {
            let Some(mapping) = self.strategy.route(entry.code, state) else {
                continue;
            };

            if !host.has_capability(mapping.capability) {
                table.mark(mapping.code, ListenerState::Unmapped);
                continue;
            }

            if !(descriptor.is_read_write(mapping.code) && state.has_vendor_capability(mapping.code)) {
                table.mark(mapping.code, ListenerState::Suppressed);
                continue;
            }

            match best.iter_mut().find(|b| b.capability == mapping.capability) {
                Some(current) if mapping.fidelity > current.fidelity => {
                    table.mark(current.code, ListenerState::Suppressed);
                    *current = mapping;
                }
                Some(_) => table.mark(mapping.code, ListenerState::Suppressed),
                None => best.push(mapping),
            }
        }

        for mapping in best {
            table.register(mapping)?;
        }

        tracing::debug!(
            device_id = %state.device_id(),
            class = %descriptor.id,
            "Registered {} capability listeners",
            table.len()
        );
        Ok(table)
    }

    /// Host capability writes for a status push.
    ///
    /// Unknown codes and codes whose capability the host lacks are skipped.
    pub fn status_effects(
        &self,
        status: &[DataPoint],
        state: &DeviceState,
        host: &dyn HostDevice,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        for point in status {
            let Some(mapping) = self.strategy.route(&point.code, state) else {
                tracing::trace!(device_id = %state.device_id(), "Ignoring unmapped code '{}'", point.code);
                continue;
            };
            if !host.has_capability(mapping.capability) {
                continue;
            }
            if self.outranked(&mapping, state) {
                continue;
            }

            let value = to_host_value(&mapping, &point.value, state);
            effects.push(Effect::SetCapability {
                capability: mapping.capability.to_string(),
                value,
            });
        }

        effects
    }

    /// A declared higher-fidelity code targets the same capability.
    fn outranked(&self, mapping: &CodeMapping, state: &DeviceState) -> bool {
        self.strategy
            .descriptor()
            .mappings
            .iter()
            .filter(|other| other.code != mapping.code && state.has_vendor_capability(other.code))
            .filter_map(|other| self.strategy.route(other.code, state))
            .any(|other| other.capability == mapping.capability && other.fidelity > mapping.fidelity)
    }

    /// Vendor command for a host write through a registered listener.
    pub fn command_for(
        &self,
        mapping: &CodeMapping,
        value: &DataValue,
        state: &DeviceState,
    ) -> DeviceResult<VendorCommand> {
        let value = to_vendor_value(mapping, value, state)?;
        Ok(VendorCommand::new(mapping.code, value))
    }
}

fn to_host_value(mapping: &CodeMapping, value: &DataValue, state: &DeviceState) -> DataValue {
    match mapping.conversion {
        Conversion::Range(default) => match value.as_f64() {
            Some(raw) => {
                let range = state.range_meta(mapping.code, default);
                DataValue::Float(range.to_normalized(raw))
            }
            None => value.clone(),
        },
        Conversion::Percent => match value.as_f64() {
            Some(raw) => DataValue::Float((raw / 100.0).clamp(0.0, 1.0)),
            None => value.clone(),
        },
        Conversion::LowercaseEnum => DataValue::String(value.to_status_string().to_lowercase()),
        Conversion::NumericString | Conversion::Stringify => DataValue::String(value.to_status_string()),
        Conversion::EnumTable(table) => value
            .as_str()
            .and_then(|v| enum_to_host(table, v))
            .map(DataValue::from)
            .unwrap_or_else(|| value.clone()),
        Conversion::BoolEnum { on, off } => match value.as_str() {
            Some(v) if v == on => DataValue::Boolean(true),
            Some(v) if v == off => DataValue::Boolean(false),
            _ => value.clone(),
        },
        Conversion::Passthrough | Conversion::Press => value.clone(),
    }
}

fn to_vendor_value(mapping: &CodeMapping, value: &DataValue, state: &DeviceState) -> DeviceResult<DataValue> {
    let invalid = |reason: &str| DeviceError::InvalidValue {
        capability: mapping.capability.to_string(),
        reason: reason.to_string(),
    };

    let converted = match mapping.conversion {
        Conversion::Range(default) => {
            let input = value.coerce_f64().ok_or_else(|| invalid("expected a number"))?;
            let range = state.range_meta(mapping.code, default);
            number(range.to_vendor_range(input))
        }
        Conversion::Percent => {
            let input = value.coerce_f64().ok_or_else(|| invalid("expected a number"))?;
            number((input.clamp(0.0, 1.0) * 100.0).round())
        }
        Conversion::NumericString => {
            let input = value.coerce_f64().ok_or_else(|| invalid("expected a numeric string"))?;
            number(input)
        }
        Conversion::Press => DataValue::Boolean(true),
        Conversion::EnumTable(table) => {
            let host = value.as_str().ok_or_else(|| invalid("expected a string"))?;
            let vendor = enum_to_vendor(table, host).ok_or_else(|| invalid("unknown enum value"))?;
            DataValue::from(vendor)
        }
        Conversion::BoolEnum { on, off } => {
            let flag = value.as_bool().ok_or_else(|| invalid("expected a boolean"))?;
            DataValue::from(if flag { on } else { off })
        }
        Conversion::Passthrough | Conversion::LowercaseEnum | Conversion::Stringify => value.clone(),
    };

    Ok(converted)
}

/// Integral values are sent as integers.
fn number(v: f64) -> DataValue {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        DataValue::Integer(v as i64)
    } else {
        DataValue::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::DeviceClassDescriptor;
    use crate::normalizer::RangeMeta;
    use crate::sinks::{CapabilityOptions, SinkError};
    use crate::strategy::TableStrategy;
    use async_trait::async_trait;
    use serde_json::json;
    use tuya_bridge_storage::{DeviceStore, MemoryBackend};

    struct Caps(Vec<&'static str>);

    #[async_trait]
    impl HostDevice for Caps {
        fn has_capability(&self, capability: &str) -> bool {
            self.0.contains(&capability)
        }
        fn capabilities(&self) -> Vec<String> {
            self.0.iter().map(|c| c.to_string()).collect()
        }
        fn setting(&self, _key: &str) -> Option<DataValue> {
            None
        }
        async fn set_capability_value(&self, _: &str, _: DataValue) -> Result<(), SinkError> {
            Ok(())
        }
        async fn add_capability(&self, _: &str) -> Result<(), SinkError> {
            Ok(())
        }
        async fn remove_capability(&self, _: &str) -> Result<(), SinkError> {
            Ok(())
        }
        async fn set_capability_options(&self, _: &str, _: CapabilityOptions) -> Result<(), SinkError> {
            Ok(())
        }
        async fn set_setting(&self, _: &str, _: DataValue) -> Result<(), SinkError> {
            Ok(())
        }
        async fn trigger_flow(&self, _: &str) -> Result<(), SinkError> {
            Ok(())
        }
    }

    const COVER_STATE: &[(&str, &str)] = &[("up", "open"), ("idle", "stop"), ("down", "close")];

    static CLASS: DeviceClassDescriptor = DeviceClassDescriptor {
        id: "test",
        name: "Test",
        categories: &[],
        product_ids: &[],
        mappings: &[
            CodeMapping::new("switch", "onoff"),
            CodeMapping::new("fan_speed", "fan_speed").legacy(),
            CodeMapping::new("fan_speed_percent", "fan_speed")
                .with_conversion(Conversion::Range(RangeMeta::new(1.0, 100.0, 1.0)))
                .preferred(),
            CodeMapping::new("mode", "fan_mode").with_conversion(Conversion::LowercaseEnum),
            CodeMapping::new("led_bright", "display").with_conversion(Conversion::NumericString),
            CodeMapping::new("filter_reset", "reset_filter").with_conversion(Conversion::Press),
            CodeMapping::new("control", "windowcoverings_state")
                .with_conversion(Conversion::EnumTable(COVER_STATE)),
            CodeMapping::new("border", "lock_up").with_conversion(Conversion::BoolEnum { on: "up", off: "down" }),
            CodeMapping::new("pm25", "measure_pm25"),
        ],
        read_write: &[
            "switch",
            "fan_speed",
            "fan_speed_percent",
            "mode",
            "led_bright",
            "filter_reset",
            "control",
            "border",
        ],
        read_only: &["pm25"],
        setting_only: &[],
    };

    fn translator() -> Translator {
        Translator::new(Arc::new(TableStrategy::new(&CLASS)))
    }

    fn state(codes: &[&str]) -> DeviceState {
        let store = DeviceStore::new(Arc::new(MemoryBackend::default()), "dev");
        store.set_value("tuya_capabilities", &json!(codes)).unwrap();
        DeviceState::load(store).unwrap()
    }

    #[test]
    fn test_plan_prefers_higher_fidelity() {
        let host = Caps(vec!["onoff", "fan_speed"]);
        let table = translator()
            .plan_listeners(&state(&["switch", "fan_speed", "fan_speed_percent"]), &host)
            .unwrap();

        assert_eq!(table.listener("fan_speed").unwrap().code, "fan_speed_percent");
        assert_eq!(table.state("fan_speed"), Some(ListenerState::Suppressed));
        assert_eq!(table.state("fan_speed_percent"), Some(ListenerState::Listening));
        assert_eq!(table.state("mode"), Some(ListenerState::Unmapped));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_plan_falls_back_to_legacy() {
        let host = Caps(vec!["fan_speed"]);
        let table = translator()
            .plan_listeners(&state(&["fan_speed"]), &host)
            .unwrap();
        assert_eq!(table.listener("fan_speed").unwrap().code, "fan_speed");
        assert_eq!(table.state("fan_speed_percent"), Some(ListenerState::Suppressed));
    }

    #[test]
    fn test_plan_skips_read_only_and_undeclared() {
        let host = Caps(vec!["onoff", "measure_pm25"]);
        let table = translator().plan_listeners(&state(&["pm25"]), &host).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.state("pm25"), Some(ListenerState::Suppressed));
        assert_eq!(table.state("switch"), Some(ListenerState::Suppressed));
    }

    #[test]
    fn test_register_rejects_second_listener() {
        let mut table = ListenerTable::new();
        table.register(CodeMapping::new("switch", "onoff")).unwrap();
        let err = table.register(CodeMapping::new("onoff", "onoff")).unwrap_err();
        assert!(matches!(err, DeviceError::DuplicateListener(c) if c == "onoff"));
    }

    #[test]
    fn test_status_conversions() {
        let host = Caps(vec!["onoff", "fan_speed", "fan_mode", "display", "windowcoverings_state", "lock_up"]);
        let state = state(&["switch", "fan_speed_percent"]);
        let effects = translator().status_effects(
            &[
                DataPoint::new("switch", true),
                DataPoint::new("fan_speed_percent", 45),
                DataPoint::new("fan_speed", "3"),
                DataPoint::new("mode", "SLEEP"),
                DataPoint::new("led_bright", 100),
                DataPoint::new("control", "stop"),
                DataPoint::new("border", "up"),
                DataPoint::new("pm25", 12),
                DataPoint::new("mystery_code", 1),
            ],
            &state,
            &host,
        );

        let speed = effects
            .iter()
            .find_map(|e| match e {
                Effect::SetCapability { capability, value } if capability == "fan_speed" => value.as_f64(),
                _ => None,
            })
            .unwrap();
        assert!((speed - 44.0 / 99.0).abs() < 1e-9);

        assert!(effects.contains(&Effect::set_capability("onoff", true)));
        assert!(effects.contains(&Effect::set_capability("fan_mode", "sleep")));
        assert!(effects.contains(&Effect::set_capability("display", "100")));
        assert!(effects.contains(&Effect::set_capability("windowcoverings_state", "idle")));
        assert!(effects.contains(&Effect::set_capability("lock_up", true)));
        // legacy fan_speed is outranked, pm25 has no host capability
        assert_eq!(effects.len(), 6);
    }

    #[test]
    fn test_status_uses_stored_range() {
        let host = Caps(vec!["fan_speed"]);
        let state = state(&["fan_speed_percent"]);
        state
            .set_range_meta("fan_speed_percent", RangeMeta::new(1.0, 6.0, 1.0))
            .unwrap();
        let effects = translator().status_effects(&[DataPoint::new("fan_speed_percent", 6)], &state, &host);
        assert_eq!(effects, vec![Effect::set_capability("fan_speed", 1.0)]);
    }

    #[test]
    fn test_commands() {
        let t = translator();
        let state = state(&[]);
        let cmd = |code: &str, v: DataValue| t.command_for(CLASS.mapping(code).unwrap(), &v, &state);

        assert_eq!(
            cmd("fan_speed_percent", DataValue::Float(0.5)).unwrap(),
            VendorCommand::new("fan_speed_percent", 51i64)
        );
        assert_eq!(
            cmd("filter_reset", DataValue::Boolean(false)).unwrap().value,
            DataValue::Boolean(true)
        );
        assert_eq!(cmd("led_bright", "75".into()).unwrap().value, DataValue::Integer(75));
        assert_eq!(cmd("mode", "Sleep".into()).unwrap().value, DataValue::from("Sleep"));
        assert_eq!(cmd("control", "down".into()).unwrap().value, DataValue::from("close"));
        assert_eq!(cmd("border", false.into()).unwrap().value, DataValue::from("down"));

        assert!(matches!(
            cmd("fan_speed_percent", "fast".into()),
            Err(DeviceError::InvalidValue { .. })
        ));
        assert!(cmd("control", "sideways".into()).is_err());
    }
}
