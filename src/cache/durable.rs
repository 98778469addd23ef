//! Durable Tier Module
//!
//! Persistent key-value backends that survive a process restart.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

// == Durable Storage ==
/// A per-origin string key-value store.
///
/// Implementations hold raw text only; encoding records is the store's job.
pub trait DurableStorage: Send + Sync + Debug {
    /// Reads the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every key currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Removes every key.
    fn clear(&self) -> Result<(), StorageError>;
}

// == Memory Storage ==
/// In-process durable backend.
///
/// Clones share the same map, so a clone handed to a second `CacheStore`
/// behaves like storage that outlived the first one.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, as a full quota would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.lock().map(|items| items.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.items
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))
    }
}

impl DurableStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("quota exceeded".to_string()));
        }
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock()?.clear();
        Ok(())
    }
}

// == File Storage ==
/// Directory-backed durable backend: one file per key.
///
/// File names are the SHA-256 digest of the key, so names stay short and flat
/// however long the key is. Each file carries its key next to the value.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

const FILE_EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredItem {
    key: String,
    value: String,
}

impl FileStorage {
    /// Creates a backend rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{}.{}", digest, FILE_EXTENSION))
    }

    fn read_item(path: &Path) -> Result<Option<StoredItem>, StorageError> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Every record file in the directory with the key it holds.
    ///
    /// Files that do not parse as records are not ours and are skipped.
    fn records(&self) -> Result<Vec<(PathBuf, String)>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != FILE_EXTENSION) {
                continue;
            }
            if let Ok(Some(item)) = Self::read_item(&path) {
                records.push((path, item.key));
            }
        }
        Ok(records)
    }
}

impl DurableStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(Self::read_item(&self.path_for(key))?
            .filter(|item| item.key == key)
            .map(|item| item.value))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let item = StoredItem {
            key: key.to_string(),
            value: value.to_string(),
        };
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), serde_json::to_string(&item)?)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.records()?.into_iter().map(|(_, key)| key).collect())
    }

    fn clear(&self) -> Result<(), StorageError> {
        for (path, _) in self.records()? {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
