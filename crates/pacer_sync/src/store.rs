//! Local persistent key-value store
//!
//! Values are serialized text stored under string keys, one store per
//! workspace (the equivalent of a browser origin). The backend is injected
//! through [`KeyValueStore`] so tests run against [`MemoryStore`] and the
//! CLI against [`FileStore`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Capacity assumed when a backend does not declare one (5 MiB)
pub const DEFAULT_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

const FILE_EXTENSION: &str = "json";

/// Errors raised by the storage medium
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded: {needed} bytes needed, {capacity} bytes capacity")]
    QuotaExceeded { needed: u64, capacity: u64 },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("stored value under {key} is unreadable: {reason}")]
    Unreadable { key: String, reason: String },
}

/// Synchronous get/set/remove storage keyed by string
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Capacity ceiling in bytes, if the medium has one
    fn capacity(&self) -> Option<u64> {
        None
    }
}

/// Estimated footprint of one entry, counted as UTF-16 code units
fn entry_cost(key: &str, value_len: usize) -> u64 {
    ((key.len() + value_len) as u64) * 2
}

fn check_quota(capacity: Option<u64>, used_by_others: u64, key: &str, value: &str) -> Result<(), StoreError> {
    if let Some(capacity) = capacity {
        let needed = used_by_others + entry_cost(key, value.len());
        if needed > capacity {
            return Err(StoreError::QuotaExceeded { needed, capacity });
        }
    }
    Ok(())
}

/// In-process store, optionally capped
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity: Some(capacity),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // Entries stay consistent even if a holder panicked: every write is a single insert
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries();
        let used_by_others: u64 = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_cost(k, v.len()))
            .sum();
        check_quota(self.capacity, used_by_others, key, value)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries().keys().cloned().collect())
    }

    fn capacity(&self) -> Option<u64> {
        self.capacity
    }
}

/// Directory-backed store: one `<key>.json` file per entry
///
/// Writes go to a hidden temp file first and are renamed into place, so a
/// reader never observes a partially written value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    capacity: Option<u64>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            capacity: Some(DEFAULT_CAPACITY_BYTES),
        }
    }

    pub fn with_capacity(mut self, capacity: Option<u64>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", key, FILE_EXTENSION)))
    }

    fn used_by_others(&self, key: &str) -> Result<u64, StoreError> {
        let mut used = 0;
        for other in self.keys()? {
            if other == key {
                continue;
            }
            let len = fs::metadata(self.path_for(&other)?)?.len();
            used += entry_cost(&other, len as usize);
        }
        Ok(used)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        check_quota(self.capacity, self.used_by_others(key)?, key, value)?;

        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, FILE_EXTENSION));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        tracing::trace!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                if path.extension().and_then(|s| s.to_str()) != Some(FILE_EXTENSION) {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?.to_string();
                (!stem.starts_with('.')).then_some(stem)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn capacity(&self) -> Option<u64> {
        self.capacity
    }
}

/// Storage availability and usage, in KiB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStatus {
    pub available: bool,
    pub capacity_kb: u64,
    pub used_kb: u64,
    pub percent_used: u64,
}

/// Typed access to a [`KeyValueStore`]
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

impl LocalStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Uncapped in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Serialize `value` and write it under `key`
    ///
    /// Serialization and quota failures come back as `Err`; the caller
    /// decides whether to log and continue.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)?;
        self.backend.set(key, &text)
    }

    /// Stored value for `key`, or `None` if absent or unreadable
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_load(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ignoring value under {}: {}", key, e);
                None
            }
        }
    }

    /// Stored value for `key`; a value that exists but does not parse is an error
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(text) = self.backend.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Unreadable {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Remove `key`; absent keys are fine
    pub fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.backend.remove(key)
    }

    /// Raw serialized text under `key`
    pub fn raw(&self, key: &str) -> Option<String> {
        self.backend.get(key).ok().flatten()
    }

    pub fn status(&self) -> StorageStatus {
        let capacity = self.backend.capacity().unwrap_or(DEFAULT_CAPACITY_BYTES);
        let capacity_kb = capacity / 1024;

        let used = self.backend.keys().and_then(|keys| {
            let mut used = 0u64;
            for key in keys {
                if let Some(value) = self.backend.get(&key)? {
                    used += entry_cost(&key, value.len());
                }
            }
            Ok(used)
        });

        match used {
            Ok(used) => {
                let used_kb = (used + 512) / 1024;
                let percent_used = if capacity_kb == 0 {
                    0
                } else {
                    (used_kb * 100 + capacity_kb / 2) / capacity_kb
                };
                StorageStatus {
                    available: true,
                    capacity_kb,
                    used_kb,
                    percent_used,
                }
            }
            Err(e) => {
                tracing::warn!("Storage status unavailable: {}", e);
                StorageStatus {
                    available: false,
                    capacity_kb: 0,
                    used_kb: 0,
                    percent_used: 0,
                }
            }
        }
    }
}
