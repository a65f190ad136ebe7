//! Curtains, blinds and motorised screens (`cl`).

use crate::event::SettingsEvent;
use crate::mapping::{CodeMapping, Conversion, DeviceClassDescriptor};
use crate::strategy::{forward_settings, ClassStrategy, Effect, StrategyContext};

pub const CATEGORIES: &[&str] = &["cl"];

/// Vividstorm motorised screens.
pub const PRODUCT_IDS: &[&str] = &["lfkr93x0ukp5gaia"];

/// Host setting that flips the motor direction.
pub const INVERSE_SETTING: &str = "inverse";

/// Vendor codes accepting the inverse flag, in preference order.
const INVERSE_CODES: &[&str] = &["opposite", "control_back"];

const CONTROL_STATES: &[(&str, &str)] = &[("up", "open"), ("idle", "stop"), ("down", "close")];
const MACH_OPERATE_STATES: &[(&str, &str)] = &[("up", "FZ"), ("idle", "STOP"), ("down", "ZZ")];

static MAPPINGS: &[CodeMapping] = &[
    CodeMapping::new("control", "windowcoverings_state")
        .with_conversion(Conversion::EnumTable(CONTROL_STATES)),
    CodeMapping::new("mach_operate", "windowcoverings_state")
        .with_conversion(Conversion::EnumTable(MACH_OPERATE_STATES)),
    CodeMapping::new("position", "windowcoverings_set").with_conversion(Conversion::Percent),
    CodeMapping::new("percent_control", "windowcoverings_set").with_conversion(Conversion::Percent),
    CodeMapping::new("percent_state", "windowcoverings_set").with_conversion(Conversion::Percent),
    CodeMapping::new("border", "vividstorm_lock_up")
        .with_conversion(Conversion::BoolEnum { on: "up", off: "down" }),
];

pub static WINDOW_COVERINGS: DeviceClassDescriptor = DeviceClassDescriptor {
    id: "window_coverings",
    name: "Window Coverings",
    categories: CATEGORIES,
    product_ids: PRODUCT_IDS,
    mappings: MAPPINGS,
    read_write: &["control", "position", "mach_operate", "percent_control", "border"],
    read_only: &["percent_state"],
    setting_only: &["opposite", "control_back"],
};

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowCoveringsStrategy;

impl ClassStrategy for WindowCoveringsStrategy {
    fn descriptor(&self) -> &'static DeviceClassDescriptor {
        &WINDOW_COVERINGS
    }

    fn settings_effects(&self, event: &SettingsEvent, ctx: &StrategyContext<'_>) -> Vec<Effect> {
        let mut effects = forward_settings(&WINDOW_COVERINGS, event);

        if event.changed(INVERSE_SETTING) {
            let target = INVERSE_CODES
                .iter()
                .find(|code| ctx.state.has_vendor_capability(code));
            match (target, event.get(INVERSE_SETTING)) {
                (Some(code), Some(value)) => effects.push(Effect::command(*code, value.clone())),
                (None, _) => tracing::debug!(
                    device_id = %ctx.state.device_id(),
                    "No vendor code accepts the inverse setting"
                ),
                _ => {}
            }
        }

        effects
    }
}
