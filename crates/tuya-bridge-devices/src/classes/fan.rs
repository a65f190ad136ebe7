//! Fans (`fs`) and ceiling fan lights (`fsd`).
//!
//! Fan speed comes either from the percent based `fan_speed_percent` code,
//! normalized into the host's `[0, 1]` `fan_speed`, or from the legacy enum
//! `fan_speed` code. Ceiling fan lights without a percent code drive the host
//! `fan_speed` from the legacy code directly; every other fan exposes it as
//! `legacy_fan_speed`.

use anyhow::Context;
use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::event::SettingsEvent;
use crate::mapping::{CodeMapping, Conversion, DeviceClassDescriptor};
use crate::migration::{Migration, MigrationContext};
use crate::normalizer::RangeMeta;
use crate::pairing::{self, DiscoveredDevice, PairingProperties};
use crate::sinks::CapabilityOptions;
use crate::state::DeviceState;
use crate::strategy::{forward_settings, ClassStrategy, Effect, StrategyContext};
use crate::vendor::DataPoint;

pub const CATEGORIES: &[&str] = &["fs", "fsd"];

pub const CEILING_FAN_LIGHT: &str = "fsd";

pub const FAN_SPEED_PERCENT: &str = "fan_speed_percent";
pub const FAN_DIRECTION: &str = "fan_direction";
pub const ENABLE_LIGHT_SUPPORT: &str = "enable_light_support";

const DEFAULT_REVERSED_DIRECTION: &str = "backward";

/// Vendor light codes and the host capability each provisions.
const LIGHT_CAPABILITIES: &[(&str, &str)] = &[
    ("light", "onoff.light"),
    ("switch_led", "onoff.light"),
    ("bright_value", "dim"),
    ("temp_value", "light_temperature"),
];

const COLOUR_CODE: &str = "colour_data";
const COLOUR_CAPABILITIES: &[&str] = &["light_hue", "light_saturation", "dim"];

/// Light codes with no table mapping, declared at pairing and by the
/// capabilities migration so light support can provision them.
const UNMAPPED_LIGHT_CODES: &[&str] = &["temp_value", COLOUR_CODE];

/// Every host light capability, removed together.
const HOST_LIGHT_CAPABILITIES: &[&str] = &[
    "onoff.light",
    "dim",
    "light_mode",
    "light_temperature",
    "light_hue",
    "light_saturation",
];

/// Light codes whose changes fire `fan_light_onoff_<value>`.
const LIGHT_FLOW_CODES: &[&str] = &["light", "switch_led"];

static MAPPINGS: &[CodeMapping] = &[
    CodeMapping::new("switch", "onoff"),
    CodeMapping::new(FAN_SPEED_PERCENT, "fan_speed")
        .with_conversion(Conversion::Range(RangeMeta::new(1.0, 100.0, 1.0)))
        .preferred(),
    CodeMapping::new("fan_speed", "legacy_fan_speed").with_conversion(Conversion::Stringify),
    CodeMapping::new("light", "onoff.light"),
    CodeMapping::new("switch_led", "onoff.light"),
    CodeMapping::new("bright_value", "dim")
        .with_conversion(Conversion::Range(RangeMeta::new(10.0, 1000.0, 1.0))),
];

pub static FAN: DeviceClassDescriptor = DeviceClassDescriptor {
    id: "fan",
    name: "Fan",
    categories: CATEGORIES,
    product_ids: &[],
    mappings: MAPPINGS,
    read_write: &[
        "switch",
        FAN_SPEED_PERCENT,
        "fan_speed",
        "light",
        "switch_led",
        "bright_value",
    ],
    read_only: &[],
    setting_only: &[FAN_DIRECTION],
};

#[derive(Debug, Default, Clone, Copy)]
pub struct FanStrategy;

impl FanStrategy {
    /// Legacy speed drives the host `fan_speed` directly.
    fn legacy_speed_is_primary(state: &DeviceState) -> bool {
        state.category() == Some(CEILING_FAN_LIGHT) && !state.has_vendor_capability(FAN_SPEED_PERCENT)
    }

    fn light_effects(enabled: bool, ctx: &StrategyContext<'_>) -> Vec<Effect> {
        if !enabled {
            return HOST_LIGHT_CAPABILITIES
                .iter()
                .filter(|c| ctx.host.has_capability(c))
                .map(|c| Effect::RemoveCapability(c.to_string()))
                .collect();
        }

        let mut present: BTreeSet<String> = ctx.host.capabilities().into_iter().collect();
        let mut effects = Vec::new();

        for (code, capability) in LIGHT_CAPABILITIES {
            if ctx.state.has_vendor_capability(code) {
                add_missing(&mut present, &mut effects, capability);
            }
        }
        if ctx.state.has_vendor_capability(COLOUR_CODE) {
            for capability in COLOUR_CAPABILITIES {
                add_missing(&mut present, &mut effects, capability);
            }
        }
        if present.contains("light_temperature") && present.contains("light_hue") {
            add_missing(&mut present, &mut effects, "light_mode");
        }

        effects
    }
}

fn add_missing(present: &mut BTreeSet<String>, effects: &mut Vec<Effect>, capability: &str) {
    if present.insert(capability.to_string()) {
        effects.push(Effect::AddCapability(capability.to_string()));
    }
}

impl ClassStrategy for FanStrategy {
    fn descriptor(&self) -> &'static DeviceClassDescriptor {
        &FAN
    }

    fn route(&self, code: &str, state: &DeviceState) -> Option<CodeMapping> {
        if code == "fan_speed" && Self::legacy_speed_is_primary(state) {
            return Some(CodeMapping::new("fan_speed", "fan_speed").legacy());
        }
        FAN.mapping(code).copied()
    }

    fn status_effects(
        &self,
        status: &[DataPoint],
        changed: &[String],
        ctx: &StrategyContext<'_>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        if let Some(point) = status.iter().find(|p| p.code == FAN_DIRECTION) {
            let direction = if point.value.as_str() == Some("forward") {
                "forward"
            } else {
                "backward"
            };
            effects.push(Effect::set_setting(FAN_DIRECTION, direction));
        }

        if ctx.setting_enabled(ENABLE_LIGHT_SUPPORT) {
            for code in LIGHT_FLOW_CODES {
                if !changed.iter().any(|c| c == code) {
                    continue;
                }
                if let Some(point) = status.iter().find(|p| p.code == *code) {
                    effects.push(Effect::TriggerFlow(format!("fan_light_onoff_{}", point.value)));
                }
            }
        }

        effects
    }

    fn settings_effects(&self, event: &SettingsEvent, ctx: &StrategyContext<'_>) -> Vec<Effect> {
        let mut effects = Vec::new();

        if event.changed(ENABLE_LIGHT_SUPPORT) {
            let enabled = event
                .get(ENABLE_LIGHT_SUPPORT)
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            effects.extend(Self::light_effects(enabled, ctx));
        }

        for effect in forward_settings(&FAN, event) {
            match effect {
                Effect::SendCommand(mut command)
                    if command.code == FAN_DIRECTION && command.value.as_str() == Some("backward") =>
                {
                    let reversed = ctx
                        .state
                        .reversed_fan_direction()
                        .unwrap_or_else(|| DEFAULT_REVERSED_DIRECTION.to_string());
                    command.value = reversed.into();
                    effects.push(Effect::SendCommand(command));
                }
                other => effects.push(other),
            }
        }

        effects
    }

    fn build_properties(&self, device: &DiscoveredDevice) -> PairingProperties {
        let mut props = pairing::build_properties(&FAN, device);
        for point in &device.status {
            let code = point.code.as_str();
            if UNMAPPED_LIGHT_CODES.contains(&code)
                && !props.store.tuya_capabilities.iter().any(|c| c == code)
            {
                props.store.tuya_capabilities.push(code.to_string());
            }
        }
        props
    }

    fn migrations(&self) -> Vec<Box<dyn Migration>> {
        vec![
            Box::new(TuyaCapabilitiesMigration),
            Box::new(ReversedFanDirectionMigration),
            Box::new(FanSpeedPercentRangeMigration),
        ]
    }
}

/// Codes recorded from live status for fans paired before the declared
/// capability list existed.
const MIGRATED_CODES: &[&str] = &[
    "switch",
    FAN_SPEED_PERCENT,
    "fan_speed",
    "light",
    "switch_led",
    "bright_value",
    "temp_value",
    COLOUR_CODE,
];

/// Record declared vendor codes from the device's live status.
pub struct TuyaCapabilitiesMigration;

#[async_trait]
impl Migration for TuyaCapabilitiesMigration {
    fn name(&self) -> &'static str {
        "fan_tuya_capabilities"
    }

    async fn migrate(&self, ctx: &mut MigrationContext<'_>) -> anyhow::Result<()> {
        let status = ctx.vendor.get_status(ctx.state.device_id()).await?;
        let codes: Vec<String> = status
            .into_iter()
            .map(|p| p.code)
            .filter(|code| MIGRATED_CODES.contains(&code.as_str()))
            .collect();

        let added = ctx.state.add_vendor_capabilities(codes)?;
        tracing::info!(device_id = %ctx.device_id(), "Tuya capabilities added: {:?}", added);
        Ok(())
    }
}

/// Store the vendor value meaning "backward" for this model.
pub struct ReversedFanDirectionMigration;

#[async_trait]
impl Migration for ReversedFanDirectionMigration {
    fn name(&self) -> &'static str {
        "reversed_fan_direction"
    }

    async fn migrate(&self, ctx: &mut MigrationContext<'_>) -> anyhow::Result<()> {
        let spec = ctx.specification().await;
        let range = match spec.as_ref().and_then(|s| s.status_entry(FAN_DIRECTION)) {
            Some(entry) => entry
                .enum_range()
                .context("invalid fan_direction specification")?,
            None => None,
        };
        let reversed = range
            .and_then(|range| range.get(1).cloned())
            .unwrap_or_else(|| DEFAULT_REVERSED_DIRECTION.to_string());

        ctx.state.set_reversed_fan_direction(&reversed)?;
        tracing::info!(device_id = %ctx.device_id(), "Reverse fan direction set: {}", reversed);
        Ok(())
    }
}

/// Store the device's `fan_speed_percent` range and align the host
/// `fan_speed` step with it.
pub struct FanSpeedPercentRangeMigration;

#[async_trait]
impl Migration for FanSpeedPercentRangeMigration {
    fn name(&self) -> &'static str {
        "fan_speed_percent_range"
    }

    async fn migrate(&self, ctx: &mut MigrationContext<'_>) -> anyhow::Result<()> {
        if !ctx.host.has_capability("fan_speed") || !ctx.state.has_vendor_capability(FAN_SPEED_PERCENT) {
            return Ok(());
        }

        let Some(spec) = ctx.specification().await else {
            return Ok(());
        };
        let Some(entry) = spec.status_entry(FAN_SPEED_PERCENT) else {
            return Ok(());
        };
        let Some(range) = entry
            .range_meta(RangeMeta::default())
            .context("invalid fan_speed_percent specification")?
        else {
            return Ok(());
        };

        ctx.state.set_range_meta(FAN_SPEED_PERCENT, range)?;

        let options = CapabilityOptions {
            min: 0.0,
            max: 1.0,
            step: range.normalized_step(),
        };
        if let Err(e) = ctx.host.set_capability_options("fan_speed", options).await {
            tracing::warn!(device_id = %ctx.device_id(), "Failed to set fan_speed options: {}", e);
        }

        tracing::info!(
            device_id = %ctx.device_id(),
            min = range.min,
            max = range.max,
            step = range.step,
            normalized_step = options.step,
            "Fan speed percent range set"
        );
        Ok(())
    }
}
