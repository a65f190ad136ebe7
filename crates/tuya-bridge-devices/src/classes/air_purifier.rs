//! Air purifiers (`kj`), including Jafanda units listed under other categories.

use crate::mapping::{CodeMapping, Conversion, DeviceClassDescriptor};
use crate::strategy::TableStrategy;

pub const CATEGORIES: &[&str] = &["kj"];

/// Jafanda JF260S and JF500.
pub const PRODUCT_IDS: &[&str] = &["vpb3fd5rhtgd7b4t", "az2mhfjoivlaqays"];

static MAPPINGS: &[CodeMapping] = &[
    CodeMapping::new("onoff", "onoff"),
    CodeMapping::new("switch", "onoff"),
    CodeMapping::new("switch_led", "jafanda_light"),
    CodeMapping::new("light", "jafanda_light"),
    CodeMapping::new("mode", "fan_mode").with_conversion(Conversion::LowercaseEnum),
    CodeMapping::new("fan_speed_enum", "fan_speed").with_conversion(Conversion::LowercaseEnum),
    CodeMapping::new("child_lock", "child_lock"),
    CodeMapping::new("pm25", "measure_pm25"),
    CodeMapping::new("filter", "filter_life_percentage"),
    CodeMapping::new("temp_current", "measure_temperature"),
    CodeMapping::new("humidity_value", "measure_humidity"),
    CodeMapping::new("countdown", "jafanda_countdown"),
    CodeMapping::new("countdown_1", "jafanda_countdown"),
    CodeMapping::new("get_countdown", "jafanda_countdown"),
    CodeMapping::new("filter_reset", "jafanda_reset_filter").with_conversion(Conversion::Press),
    // atmosphere and display dimming are numeric enums on the host
    CodeMapping::new("bright_value", "jafanda_atmosphere").with_conversion(Conversion::NumericString),
    CodeMapping::new("led_bright", "jafanda_display").with_conversion(Conversion::NumericString),
];

pub static AIR_PURIFIER: DeviceClassDescriptor = DeviceClassDescriptor {
    id: "air_purifier",
    name: "Air Purifier",
    categories: CATEGORIES,
    product_ids: PRODUCT_IDS,
    mappings: MAPPINGS,
    read_write: &[
        "onoff",
        "switch",
        "fan_speed_enum",
        "mode",
        "child_lock",
        "light",
        "switch_led",
        "countdown",
        "countdown_1",
        "filter_reset",
        "bright_value",
        "led_bright",
    ],
    read_only: &["pm25", "filter", "temp_current", "humidity_value"],
    setting_only: &[],
};

pub fn strategy() -> TableStrategy {
    TableStrategy::new(&AIR_PURIFIER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid() {
        AIR_PURIFIER.validate().unwrap();
        assert_eq!(AIR_PURIFIER.lookup("led_bright"), Some("jafanda_display"));
        // status only
        assert_eq!(AIR_PURIFIER.lookup("get_countdown"), Some("jafanda_countdown"));
        assert!(AIR_PURIFIER.partition("get_countdown").is_none());
    }
}
