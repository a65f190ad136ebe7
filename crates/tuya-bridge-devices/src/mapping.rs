//! Static capability mapping tables.
//!
//! Each device class authors one [`DeviceClassDescriptor`]: which vendor codes
//! it understands, which host capability each code drives, how the value is
//! converted on the way, and which codes accept writes. Tables are plain
//! `static` data and are validated once when the class registry is built.

use std::collections::BTreeSet;

use crate::error::{DeviceError, DeviceResult};
use crate::normalizer::RangeMeta;

/// Preference among vendor codes that drive the same host capability.
///
/// When several declared codes target one capability, the highest fidelity
/// code owns the outgoing listener and its status reports win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Fidelity {
    Legacy,
    Standard,
    Preferred,
}

/// Value conversion between a vendor code and its host capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// Value forwarded unchanged in both directions.
    Passthrough,
    /// Device specific numeric range normalized to `[0, 1]`.
    ///
    /// The default range is used until per-device metadata is stored.
    Range(RangeMeta),
    /// Vendor percentage `0..=100` against a host fraction.
    Percent,
    /// Vendor enum shown to the host lowercased. Commands pass through.
    LowercaseEnum,
    /// Vendor number shown to the host as an exact decimal string.
    /// Commands are sent back as numbers.
    NumericString,
    /// Status stringified; commands pass through.
    Stringify,
    /// Button style code: every write sends `true`.
    Press,
    /// Enum translation table of `(host, vendor)` pairs.
    EnumTable(&'static [(&'static str, &'static str)]),
    /// Host boolean against two vendor enum values.
    BoolEnum {
        on: &'static str,
        off: &'static str,
    },
}

/// One vendor code to host capability association.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodeMapping {
    pub code: &'static str,
    pub capability: &'static str,
    pub conversion: Conversion,
    pub fidelity: Fidelity,
}

impl CodeMapping {
    pub const fn new(code: &'static str, capability: &'static str) -> Self {
        Self {
            code,
            capability,
            conversion: Conversion::Passthrough,
            fidelity: Fidelity::Standard,
        }
    }

    pub const fn with_conversion(self, conversion: Conversion) -> Self {
        Self { conversion, ..self }
    }

    pub const fn preferred(self) -> Self {
        Self {
            fidelity: Fidelity::Preferred,
            ..self
        }
    }

    pub const fn legacy(self) -> Self {
        Self {
            fidelity: Fidelity::Legacy,
            ..self
        }
    }

    pub fn default_range(&self) -> Option<RangeMeta> {
        match self.conversion {
            Conversion::Range(range) => Some(range),
            _ => None,
        }
    }
}

/// Partition a vendor code belongs to within a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    ReadWrite,
    ReadOnly,
    Setting,
}

/// Immutable description of one device class.
#[derive(Debug)]
pub struct DeviceClassDescriptor {
    /// Stable identifier, e.g. `"fan"`.
    pub id: &'static str,
    pub name: &'static str,
    /// Vendor category codes handled by this class.
    pub categories: &'static [&'static str],
    /// Product ids accepted regardless of category.
    pub product_ids: &'static [&'static str],
    pub mappings: &'static [CodeMapping],
    pub read_write: &'static [&'static str],
    pub read_only: &'static [&'static str],
    pub setting_only: &'static [&'static str],
}

impl DeviceClassDescriptor {
    /// Host capability driven by a vendor code.
    pub fn lookup(&self, code: &str) -> Option<&'static str> {
        self.mapping(code).map(|m| m.capability)
    }

    pub fn mapping(&self, code: &str) -> Option<&'static CodeMapping> {
        self.mappings.iter().find(|m| m.code == code)
    }

    pub fn is_read_write(&self, code: &str) -> bool {
        self.read_write.contains(&code)
    }

    pub fn is_read_only(&self, code: &str) -> bool {
        self.read_only.contains(&code)
    }

    pub fn is_setting(&self, code: &str) -> bool {
        self.setting_only.contains(&code)
    }

    pub fn partition(&self, code: &str) -> Option<Partition> {
        if self.is_read_write(code) {
            Some(Partition::ReadWrite)
        } else if self.is_read_only(code) {
            Some(Partition::ReadOnly)
        } else if self.is_setting(code) {
            Some(Partition::Setting)
        } else {
            None
        }
    }

    /// All mappings targeting a host capability, in table order.
    pub fn sources_for<'a>(&'a self, capability: &'a str) -> impl Iterator<Item = &'static CodeMapping> + 'a {
        self.mappings.iter().filter(move |m| m.capability == capability)
    }

    /// Check the table's structural invariants.
    pub fn validate(&self) -> DeviceResult<()> {
        let invalid = |reason: String| DeviceError::InvalidDescriptor {
            class: self.id.to_string(),
            reason,
        };

        let mut codes = BTreeSet::new();
        for mapping in self.mappings {
            if mapping.code.is_empty() || mapping.capability.is_empty() {
                return Err(invalid("empty code or capability".to_string()));
            }
            if !codes.insert(mapping.code) {
                return Err(invalid(format!("code '{}' mapped twice", mapping.code)));
            }
            validate_conversion(mapping).map_err(invalid)?;
        }

        let partitions = [self.read_write, self.read_only, self.setting_only];
        let mut seen = BTreeSet::new();
        for partition in partitions {
            for code in partition.iter() {
                if !seen.insert(*code) {
                    return Err(invalid(format!("code '{}' is in more than one partition", code)));
                }
            }
        }

        for code in self.setting_only {
            if codes.contains(code) {
                return Err(invalid(format!("setting code '{}' must not map to a capability", code)));
            }
        }

        Ok(())
    }
}

fn validate_conversion(mapping: &CodeMapping) -> Result<(), String> {
    match mapping.conversion {
        Conversion::Range(range) => {
            let valid = range.span() > 0.0 && range.step > 0.0;
            if !valid {
                return Err(format!(
                    "invalid default range for '{}': {:?}",
                    mapping.code, range
                ));
            }
        }
        Conversion::EnumTable(table) => {
            let hosts: BTreeSet<_> = table.iter().map(|(h, _)| *h).collect();
            let vendors: BTreeSet<_> = table.iter().map(|(_, v)| *v).collect();
            if hosts.len() != table.len() || vendors.len() != table.len() {
                return Err(format!("ambiguous enum table for '{}'", mapping.code));
            }
        }
        Conversion::BoolEnum { on, off } => {
            if on == off {
                return Err(format!("boolean enum for '{}' maps both states to '{}'", mapping.code, on));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Host value for a vendor enum value.
pub(crate) fn enum_to_host(table: &[(&'static str, &'static str)], vendor: &str) -> Option<&'static str> {
    table.iter().find(|(_, v)| *v == vendor).map(|(h, _)| *h)
}

/// Vendor value for a host enum value.
pub(crate) fn enum_to_vendor(table: &[(&'static str, &'static str)], host: &str) -> Option<&'static str> {
    table.iter().find(|(h, _)| *h == host).map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    static MAPPINGS: &[CodeMapping] = &[
        CodeMapping::new("switch", "onoff"),
        CodeMapping::new("fan_speed_percent", "fan_speed")
            .with_conversion(Conversion::Range(RangeMeta::new(1.0, 100.0, 1.0)))
            .preferred(),
        CodeMapping::new("fan_speed", "fan_speed").legacy(),
        CodeMapping::new("temp_current", "measure_temperature"),
    ];

    static CLASS: DeviceClassDescriptor = DeviceClassDescriptor {
        id: "test",
        name: "Test",
        categories: &["fs"],
        product_ids: &[],
        mappings: MAPPINGS,
        read_write: &["switch", "fan_speed_percent", "fan_speed"],
        read_only: &["temp_current"],
        setting_only: &["fan_direction"],
    };

    #[test]
    fn test_lookup() {
        assert_eq!(CLASS.lookup("switch"), Some("onoff"));
        assert_eq!(CLASS.lookup("fan_speed_percent"), Some("fan_speed"));
        assert_eq!(CLASS.lookup("unknown_code"), None);
        assert!(CLASS.is_read_write("switch"));
        assert!(!CLASS.is_read_write("temp_current"));
        assert!(CLASS.is_read_only("temp_current"));
        assert_eq!(CLASS.partition("fan_direction"), Some(Partition::Setting));
        assert_eq!(CLASS.partition("unknown_code"), None);
    }

    #[test]
    fn test_sources_in_table_order() {
        let sources: Vec<_> = CLASS.sources_for("fan_speed").map(|m| m.code).collect();
        assert_eq!(sources, vec!["fan_speed_percent", "fan_speed"]);
        assert!(Fidelity::Preferred > Fidelity::Legacy);
    }

    #[test]
    fn test_validate() {
        CLASS.validate().unwrap();

        static DUPLICATE: &[CodeMapping] = &[
            CodeMapping::new("switch", "onoff"),
            CodeMapping::new("switch", "onoff.light"),
        ];
        let bad = DeviceClassDescriptor {
            mappings: DUPLICATE,
            ..copy(&CLASS)
        };
        assert!(matches!(bad.validate(), Err(DeviceError::InvalidDescriptor { .. })));

        let overlapping = DeviceClassDescriptor {
            read_only: &["switch"],
            ..copy(&CLASS)
        };
        assert!(overlapping.validate().is_err());

        static DEGENERATE: &[CodeMapping] = &[CodeMapping::new("bright_value", "dim")
            .with_conversion(Conversion::Range(RangeMeta::new(10.0, 10.0, 1.0)))];
        let degenerate = DeviceClassDescriptor {
            mappings: DEGENERATE,
            ..copy(&CLASS)
        };
        assert!(degenerate.validate().is_err());
    }

    #[test]
    fn test_enum_table_lookup() {
        const TABLE: &[(&str, &str)] = &[("up", "open"), ("idle", "stop"), ("down", "close")];
        assert_eq!(enum_to_host(TABLE, "stop"), Some("idle"));
        assert_eq!(enum_to_vendor(TABLE, "down"), Some("close"));
        assert_eq!(enum_to_vendor(TABLE, "sideways"), None);
    }

    fn copy(d: &DeviceClassDescriptor) -> DeviceClassDescriptor {
        DeviceClassDescriptor {
            id: d.id,
            name: d.name,
            categories: d.categories,
            product_ids: d.product_ids,
            mappings: d.mappings,
            read_write: d.read_write,
            read_only: d.read_only,
            setting_only: d.setting_only,
        }
    }
}
