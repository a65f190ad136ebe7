//! Persisted per-device instance state.
//!
//! Backed by a [`DeviceStore`] namespace. The declared vendor capability set,
//! category and completed migrations are cached after load; every write goes
//! through to the store before the cache is updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tuya_bridge_storage::DeviceStore;

use crate::error::DeviceResult;
use crate::normalizer::RangeMeta;

/// Store keys.
pub mod keys {
    pub const TUYA_CAPABILITIES: &str = "tuya_capabilities";
    pub const TUYA_CATEGORY: &str = "tuya_category";
    pub const REVERSED_FAN_DIRECTION: &str = "reversed_fan_direction";
    pub const MIGRATIONS: &str = "migrations";

    pub fn range_min(code: &str) -> String {
        format!("{}_min", code)
    }

    pub fn range_max(code: &str) -> String {
        format!("{}_max", code)
    }

    pub fn range_step(code: &str) -> String {
        format!("{}_step", code)
    }
}

/// Completion marker of one migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub name: String,
    pub completed_at: DateTime<Utc>,
}

/// State of one paired device.
#[derive(Debug, Clone)]
pub struct DeviceState {
    store: DeviceStore,
    vendor_capabilities: Vec<String>,
    category: Option<String>,
    migrations: Vec<MigrationRecord>,
}

impl DeviceState {
    /// Load the cached view of a device's store.
    pub fn load(store: DeviceStore) -> DeviceResult<Self> {
        let vendor_capabilities = dedup(store.get_string_list(keys::TUYA_CAPABILITIES)?);
        let category = store.get_string(keys::TUYA_CATEGORY)?;
        let migrations = match store.get_value(keys::MIGRATIONS)? {
            Some(value) => parse_migration_records(value),
            None => Vec::new(),
        };

        Ok(Self {
            store,
            vendor_capabilities,
            category,
            migrations,
        })
    }

    pub fn device_id(&self) -> &str {
        self.store.device_id()
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    /// Vendor codes this unit exposes, in discovery order.
    pub fn vendor_capabilities(&self) -> &[String] {
        &self.vendor_capabilities
    }

    pub fn has_vendor_capability(&self, code: &str) -> bool {
        self.vendor_capabilities.iter().any(|c| c == code)
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Add vendor codes to the declared set, keeping existing entries.
    ///
    /// Returns the codes that were not declared before.
    pub fn add_vendor_capabilities<I, S>(&mut self, codes: I) -> DeviceResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged = self.vendor_capabilities.clone();
        let mut added = Vec::new();
        for code in codes {
            let code = code.into();
            if !merged.contains(&code) {
                merged.push(code.clone());
                added.push(code);
            }
        }

        if !added.is_empty() {
            self.store.set_value(keys::TUYA_CAPABILITIES, &merged)?;
            self.vendor_capabilities = merged;
        }
        Ok(added)
    }

    pub fn set_category(&mut self, category: &str) -> DeviceResult<()> {
        self.store.set_value(keys::TUYA_CATEGORY, category)?;
        self.category = Some(category.to_string());
        Ok(())
    }

    /// Numeric range of a vendor code, stored metadata over `default`.
    pub fn range_meta(&self, code: &str, default: RangeMeta) -> RangeMeta {
        RangeMeta {
            min: self.store.get_number(&keys::range_min(code), default.min),
            max: self.store.get_number(&keys::range_max(code), default.max),
            step: self.store.get_number(&keys::range_step(code), default.step),
        }
    }

    pub fn set_range_meta(&self, code: &str, range: RangeMeta) -> DeviceResult<()> {
        self.store.set_many(vec![
            (keys::range_min(code), Value::from(range.min)),
            (keys::range_max(code), Value::from(range.max)),
            (keys::range_step(code), Value::from(range.step)),
        ])?;
        Ok(())
    }

    pub fn reversed_fan_direction(&self) -> Option<String> {
        match self.store.get_string(keys::REVERSED_FAN_DIRECTION) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(device_id = %self.device_id(), "Failed to read reversed fan direction: {}", e);
                None
            }
        }
    }

    pub fn set_reversed_fan_direction(&self, direction: &str) -> DeviceResult<()> {
        self.store.set_value(keys::REVERSED_FAN_DIRECTION, direction)?;
        Ok(())
    }

    pub fn is_migration_completed(&self, name: &str) -> bool {
        self.migrations.iter().any(|r| r.name == name)
    }

    pub fn completed_migrations(&self) -> &[MigrationRecord] {
        &self.migrations
    }

    /// Append a completion marker and persist it. Already completed names
    /// are left untouched.
    pub fn mark_migration_completed(&mut self, name: &str) -> DeviceResult<()> {
        if self.is_migration_completed(name) {
            return Ok(());
        }

        let mut records = self.migrations.clone();
        records.push(MigrationRecord {
            name: name.to_string(),
            completed_at: Utc::now(),
        });
        self.store.set_value(keys::MIGRATIONS, &records)?;
        self.migrations = records;
        Ok(())
    }
}

fn dedup(codes: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    codes.into_iter().filter(|c| seen.insert(c.clone())).collect()
}

/// Accepts both full records and bare migration names.
fn parse_migration_records(value: Value) -> Vec<MigrationRecord> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(MigrationRecord {
                name,
                completed_at: DateTime::<Utc>::default(),
            }),
            other => serde_json::from_value(other).ok(),
        })
        .collect()
}
