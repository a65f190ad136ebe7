//! Canned vendor payloads.

use serde_json::json;
use tuya_bridge_devices::vendor::{DeviceSpecification, SpecEntry};

/// Fan specification with a `fan_speed_percent` range and a `fan_direction`
/// enum.
pub fn fan_specification(min: i64, max: i64, step: i64, directions: &[&str]) -> DeviceSpecification {
    DeviceSpecification {
        category: "fs".to_string(),
        functions: Vec::new(),
        status: vec![
            SpecEntry::new("switch", "Boolean", "{}"),
            SpecEntry::new(
                "fan_speed_percent",
                "Integer",
                json!({"min": min, "max": max, "scale": 0, "step": step, "unit": ""}).to_string(),
            ),
            SpecEntry::new(
                "fan_direction",
                "Enum",
                json!({ "range": directions }).to_string(),
            ),
        ],
    }
}

/// Specification whose entries carry unparseable `values`.
pub fn malformed_specification() -> DeviceSpecification {
    DeviceSpecification {
        category: "fs".to_string(),
        functions: Vec::new(),
        status: vec![
            SpecEntry::new("fan_speed_percent", "Integer", "{min:1"),
            SpecEntry::new("fan_direction", "Enum", "not json"),
        ],
    }
}
