//! Persistent backend on the redb embedded database.
//!
//! Every device table lives in one redb table under `"<table>:<key>"`, so a
//! device's keys sort together and a prefix range scans them.

use lru::LruCache;
use parking_lot::Mutex;
use redb::{Database, ReadOnlyTable, TableDefinition};
use std::num::NonZeroUsize;
use std::path::Path;
use tuya_bridge_core::storage::{Result, StorageBackend, StorageError};

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("tuya_bridge_entries");

const DEFAULT_CACHE_CAPACITY: usize = 256;

const MEMORY_PATH: &str = ":memory:";

/// Options of [`RedbBackend`], deserialized from the `storage_config` JSON.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct RedbBackendConfig {
    /// Database file, or `":memory:"` for a volatile database.
    pub path: String,

    #[serde(default = "default_create_dirs")]
    pub create_dirs: bool,

    /// Entries kept in the read cache; `0` disables it.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_create_dirs() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl RedbBackendConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create_dirs: default_create_dirs(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Volatile database without a cache.
    pub fn memory() -> Self {
        Self {
            path: MEMORY_PATH.to_string(),
            create_dirs: false,
            cache_capacity: 0,
        }
    }
}

fn entry_key(table: &str, key: &str) -> String {
    format!("{}:{}", table, key)
}

fn backend_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// redb store with a write-through LRU read cache.
pub struct RedbBackend {
    db: Database,
    persistent: bool,
    cache: Option<Mutex<LruCache<String, Vec<u8>>>>,
}

impl RedbBackend {
    pub fn new(config: RedbBackendConfig) -> Result<Self> {
        let persistent = config.path != MEMORY_PATH;
        let db = if persistent {
            let path = Path::new(&config.path);
            if config.create_dirs {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Database::create(path).map_err(backend_err)?
        } else {
            Database::builder()
                .create_with_backend(redb::backends::InMemoryBackend::new())
                .map_err(backend_err)?
        };

        tracing::debug!(
            path = %config.path,
            cache_capacity = config.cache_capacity,
            "Opened redb device store"
        );

        Ok(Self {
            db,
            persistent,
            cache: NonZeroUsize::new(config.cache_capacity).map(|n| Mutex::new(LruCache::new(n))),
        })
    }

    /// Entries table for reading; `None` until the first write creates it.
    fn read_table(&self) -> Result<Option<ReadOnlyTable<&'static str, &'static [u8]>>> {
        let txn = self.db.begin_read().map_err(backend_err)?;
        match txn.open_table(ENTRIES) {
            Ok(t) => Ok(Some(t)),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(backend_err(e)),
        }
    }

    fn cache_put(&self, key: String, value: Vec<u8>) {
        if let Some(cache) = &self.cache {
            cache.lock().put(key, value);
        }
    }
}

impl StorageBackend for RedbBackend {
    fn write(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        self.write_batch(table, vec![(key.to_string(), value.to_vec())])
    }

    fn read(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let key = entry_key(table, key);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().get(&key) {
                return Ok(Some(hit.clone()));
            }
        }

        let Some(t) = self.read_table()? else {
            return Ok(None);
        };
        let Some(value) = t.get(key.as_str()).map_err(backend_err)? else {
            return Ok(None);
        };

        let data = value.value().to_vec();
        self.cache_put(key, data.clone());
        Ok(Some(data))
    }

    fn delete(&self, table: &str, key: &str) -> Result<bool> {
        let key = entry_key(table, key);
        if let Some(cache) = &self.cache {
            cache.lock().pop(&key);
        }

        let txn = self.db.begin_write().map_err(backend_err)?;
        let existed = {
            let mut t = txn.open_table(ENTRIES).map_err(backend_err)?;
            let removed = t.remove(key.as_str()).map_err(backend_err)?;
            removed.is_some()
        };
        txn.commit().map_err(backend_err)?;
        Ok(existed)
    }

    fn scan(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let start = entry_key(table, prefix);
        let skip = table.len() + 1;

        let Some(t) = self.read_table()? else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for item in t.range(start.as_str()..).map_err(backend_err)? {
            let (key, value) = item.map_err(backend_err)?;
            let key = key.value();
            if !key.starts_with(&start) {
                break;
            }
            found.push((key[skip..].to_string(), value.value().to_vec()));
        }
        Ok(found)
    }

    fn write_batch(&self, table: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        let txn = self.db.begin_write().map_err(backend_err)?;
        {
            let mut t = txn.open_table(ENTRIES).map_err(backend_err)?;
            for (key, value) in &items {
                t.insert(entry_key(table, key).as_str(), value.as_slice())
                    .map_err(backend_err)?;
            }
        }
        txn.commit().map_err(backend_err)?;

        for (key, value) in items {
            self.cache_put(entry_key(table, &key), value);
        }
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        self.persistent
    }
}
