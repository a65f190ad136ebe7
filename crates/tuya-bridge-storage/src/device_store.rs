//! Per-device key/value store.
//!
//! Every paired device owns one namespace (`device:<id>`) on the shared
//! backend. Values are JSON so the store stays readable across versions of
//! the translation tables.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tuya_bridge_core::storage::{Result, StorageBackend};

const TABLE_PREFIX: &str = "device";

/// JSON key/value store scoped to one device.
#[derive(Clone)]
pub struct DeviceStore {
    backend: Arc<dyn StorageBackend>,
    device_id: String,
    table: String,
}

impl std::fmt::Debug for DeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStore")
            .field("device_id", &self.device_id)
            .field("persistent", &self.backend.is_persistent())
            .finish()
    }
}

impl DeviceStore {
    pub fn new(backend: Arc<dyn StorageBackend>, device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        let table = format!("{}:{}", TABLE_PREFIX, device_id);
        Self {
            backend,
            device_id,
            table,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Raw JSON value for a key.
    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        match self.backend.read(&self.table, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Typed value for a key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_value(key)? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    pub fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.write(&self.table, key, &bytes)
    }

    /// Write several keys in one transaction.
    pub fn set_many(&self, items: Vec<(String, Value)>) -> Result<()> {
        let mut encoded = Vec::with_capacity(items.len());
        for (key, value) in items {
            encoded.push((key, serde_json::to_vec(&value)?));
        }
        self.backend.write_batch(&self.table, encoded)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.backend.delete(&self.table, key)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.backend.read(&self.table, key)?.is_some())
    }

    /// Numeric value for a key, or `fallback`.
    ///
    /// Accepts finite JSON numbers and strings that parse to a finite number.
    /// Anything else, including read failures, yields the fallback.
    pub fn get_number(&self, key: &str, fallback: f64) -> f64 {
        let value = match self.get_value(key) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(device_id = %self.device_id, "Failed to read '{}': {}", key, e);
                None
            }
        };

        let parsed = match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        parsed.filter(|v| v.is_finite()).unwrap_or(fallback)
    }

    /// String value for a key. Non-string values yield `None`.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.get_value(key)? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }

    /// List of strings for a key; missing or malformed entries are skipped.
    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>> {
        Ok(match self.get_value(key)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .scan(&self.table, "")?
            .into_iter()
            .map(|(k, _)| k)
            .collect())
    }

    /// All entries, decoded. Entries that fail to decode are skipped.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Value>> {
        Ok(self
            .backend
            .scan(&self.table, "")?
            .into_iter()
            .filter_map(|(k, bytes)| serde_json::from_slice(&bytes).ok().map(|v| (k, v)))
            .collect())
    }

    /// Remove every key of this device. Returns the number of removed keys.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.keys()? {
            if self.backend.delete(&self.table, &key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use serde_json::json;

    fn store() -> DeviceStore {
        DeviceStore::new(Arc::new(MemoryBackend::default()), "bf123")
    }

    #[test]
    fn test_get_number_accepts_numeric_strings() {
        let store = store();
        store.set_value("fan_speed_percent_max", &json!("60")).unwrap();
        store.set_value("fan_speed_percent_step", &json!(5)).unwrap();
        store.set_value("fan_speed_percent_min", &json!("low")).unwrap();

        assert_eq!(store.get_number("fan_speed_percent_max", 100.0), 60.0);
        assert_eq!(store.get_number("fan_speed_percent_step", 1.0), 5.0);
        assert_eq!(store.get_number("fan_speed_percent_min", 1.0), 1.0);
        assert_eq!(store.get_number("missing", 7.0), 7.0);
    }

    #[test]
    fn test_string_list_skips_non_strings() {
        let store = store();
        store
            .set_value("tuya_capabilities", &json!(["switch", 3, "fan_speed_percent"]))
            .unwrap();
        assert_eq!(
            store.get_string_list("tuya_capabilities").unwrap(),
            vec!["switch".to_string(), "fan_speed_percent".to_string()]
        );
        assert!(store.get_string_list("missing").unwrap().is_empty());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
        let a = DeviceStore::new(backend.clone(), "a");
        let b = DeviceStore::new(backend, "b");
        a.set_value("tuya_category", "fs").unwrap();

        assert_eq!(a.get_string("tuya_category").unwrap().as_deref(), Some("fs"));
        assert_eq!(b.get_string("tuya_category").unwrap(), None);
        assert_eq!(a.clear().unwrap(), 1);
        assert!(a.keys().unwrap().is_empty());
    }
}
