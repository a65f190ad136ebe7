//! In-memory storage backend.
//!
//! Volatile; used by tests and by bridges that re-pair on every start.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use tuya_bridge_core::storage::{Result, StorageBackend};

/// Configuration for MemoryBackend.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct MemoryBackendConfig {}

/// Ordered map keyed by `(table, key)`.
#[derive(Default)]
pub struct MemoryBackend {
    data: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new(_config: MemoryBackendConfig) -> Self {
        Self::default()
    }

    /// Number of stored entries across all tables.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn write(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        self.data
            .write()
            .insert((table.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    fn read(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .data
            .read()
            .get(&(table.to_string(), key.to_string()))
            .cloned())
    }

    fn delete(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self
            .data
            .write()
            .remove(&(table.to_string(), key.to_string()))
            .is_some())
    }

    fn scan(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .range((table.to_string(), prefix.to_string())..)
            .take_while(|((t, k), _)| t == table && k.starts_with(prefix))
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, table: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut data = self.data.write();
        for (key, value) in items {
            data.insert((table.to_string(), key), value);
        }
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_prefix() {
        let backend = MemoryBackend::default();
        backend.write("device:a", "fan_speed_percent_min", b"1").unwrap();
        backend.write("device:a", "fan_speed_percent_step", b"5").unwrap();
        backend.write("device:a", "tuya_category", b"\"fs\"").unwrap();
        backend.write("device:b", "fan_speed_percent_min", b"2").unwrap();

        let found = backend.scan("device:a", "fan_speed").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(backend.len(), 4);
    }

    #[test]
    fn test_delete_reports_presence() {
        let backend = MemoryBackend::default();
        backend.write("t", "k", b"v").unwrap();
        assert!(backend.delete("t", "k").unwrap());
        assert!(!backend.delete("t", "k").unwrap());
        assert!(backend.is_empty());
    }
}
