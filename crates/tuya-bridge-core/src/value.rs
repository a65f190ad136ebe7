//! Data point values exchanged with the vendor cloud and the host platform.
//!
//! Vendor status pushes and host capability writes both carry loosely typed
//! JSON scalars. `DataValue` keeps the original shape (an integer stays an
//! integer, a numeric-looking string stays a string) so translation rules can
//! decide how to coerce.

use serde::{Deserialize, Serialize};

/// A single data point value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Null,
    /// Structured payloads (colour data, schedules) kept verbatim
    Json(serde_json::Value),
}

impl DataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Interpret the value as a number, parsing numeric strings.
    ///
    /// Booleans coerce to `1`/`0`. Non-finite results are rejected.
    pub fn coerce_f64(&self) -> Option<f64> {
        let v = match self {
            Self::Float(v) => *v,
            Self::Integer(v) => *v as f64,
            Self::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Render the value the way a status string is expected by the host.
    ///
    /// Strings are returned untouched, so `"1.50"` stays `"1.50"`. Integral
    /// floats drop the fractional part (`100.0` -> `"100"`).
    pub fn to_status_string(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::Json(v) => v.to_string(),
            Self::Null => "null".to_string(),
        }
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_status_string())
    }
}

impl From<serde_json::Value> for DataValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    n.as_f64().map(Self::Float).unwrap_or(Self::Null)
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}
