//! Vendor cloud wire types.
//!
//! Status pushes, outgoing commands and the device specification document as
//! exchanged with the vendor platform.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tuya_bridge_core::DataValue;

use crate::normalizer::RangeMeta;

/// One `{code, value}` entry of a vendor status push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub code: String,
    pub value: DataValue,
}

impl DataPoint {
    pub fn new(code: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }
}

/// Outgoing vendor command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorCommand {
    pub code: String,
    pub value: DataValue,
}

impl VendorCommand {
    pub fn new(code: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }
}

/// Specification entry for one data point.
///
/// `values` is a JSON document encoded as a string, e.g.
/// `{"min":1,"max":100,"scale":0,"step":1,"unit":"%"}` or
/// `{"range":["forward","reverse"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecEntry {
    pub code: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub values: String,
}

impl SpecEntry {
    pub fn new(code: impl Into<String>, kind: impl Into<String>, values: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            kind: kind.into(),
            values: values.into(),
        }
    }

    /// Decoded `values` document.
    ///
    /// Empty values and non-object documents are `None`; unparseable JSON is
    /// an error so callers can retry on a later startup.
    pub fn values_json(&self) -> Result<Option<Value>, serde_json::Error> {
        if self.values.trim().is_empty() {
            return Ok(None);
        }
        let values: Value = serde_json::from_str(&self.values)?;
        Ok(values.is_object().then_some(values))
    }

    /// Numeric range of this entry, missing fields taken from `fallback`.
    pub fn range_meta(&self, fallback: RangeMeta) -> Result<Option<RangeMeta>, serde_json::Error> {
        Ok(self
            .values_json()?
            .map(|values| RangeMeta::from_spec_values(&values, fallback)))
    }

    /// Enumerated `range` array of this entry.
    pub fn enum_range(&self) -> Result<Option<Vec<String>>, serde_json::Error> {
        let Some(values) = self.values_json()? else {
            return Ok(None);
        };
        Ok(values.get("range").and_then(|r| r.as_array()).map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        }))
    }
}

/// Device specification response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSpecification {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub functions: Vec<SpecEntry>,
    #[serde(default)]
    pub status: Vec<SpecEntry>,
}

impl DeviceSpecification {
    pub fn status_entry(&self, code: &str) -> Option<&SpecEntry> {
        self.status.iter().find(|entry| entry.code == code)
    }
}
