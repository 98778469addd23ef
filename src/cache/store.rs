//! Cache Store Module
//!
//! Dual-tier cache engine: a volatile in-memory map written through to a
//! durable key-value backend, with lazy TTL expiry on access.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, DurableRecord, DurableStorage, DURABLE_PREFIX};
use crate::error::StorageError;

// == Cache Store ==
/// Keyed entry table spanning a volatile and a durable tier.
///
/// Writes go to both tiers. Reads check memory first and promote valid
/// durable entries into memory; nothing is ever copied from memory back
/// to the durable tier except by `set`. Durable failures are logged and
/// swallowed, so no operation here returns an error.
#[derive(Debug)]
pub struct CacheStore {
    /// Volatile tier
    entries: HashMap<String, CacheEntry>,
    /// Durable tier
    durable: Arc<dyn DurableStorage>,
    /// Performance statistics
    stats: CacheStats,
    /// TTL applied when `set` is called without one
    default_ttl: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store over the given durable backend.
    ///
    /// # Arguments
    /// * `durable` - Backend for the durable tier
    /// * `default_ttl` - Validity window for writes without an explicit TTL
    pub fn new(durable: Arc<dyn DurableStorage>, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            durable,
            stats: CacheStats::new(),
            default_ttl,
        }
    }

    // == Get ==
    /// Retrieves and decodes a valid entry.
    ///
    /// Returns `None` when the key is absent, expired, unreadable from the
    /// durable tier, or does not decode as `T`.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let entry = self.load(key)?;

        match T::deserialize(&entry.payload) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "Cached payload does not match requested type");
                None
            }
        }
    }

    // == Set ==
    /// Stores a value, replacing any previous entry and resetting its age.
    ///
    /// The volatile write always stands. A failed durable write is logged and
    /// any older durable copy is dropped, so a restart cannot resurrect it.
    ///
    /// # Arguments
    /// * `key` - Cache key
    /// * `value` - Serializable payload
    /// * `ttl` - Optional validity window (uses the default if None)
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T, ttl: Option<Duration>) {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, error = %err, "Refusing to cache unserializable payload");
                return;
            }
        };

        let entry = CacheEntry::new(payload, ttl.unwrap_or(self.default_ttl));

        if let Err(err) = self.write_durable(key, &entry) {
            warn!(key, error = %err, "Durable write failed, entry kept in memory only");
            self.stats.record_storage_error();
            self.remove_durable(key);
        }

        self.entries.insert(key.to_string(), entry);
        self.stats.set_resident_entries(self.entries.len());
        debug!(key, "Cache entry stored");
    }

    // == Has ==
    /// Returns true if a valid entry exists in either tier.
    ///
    /// Applies the same promotion and expiry side effects as `get`.
    pub fn has(&mut self, key: &str) -> bool {
        self.load(key).is_some()
    }

    // == Invalidate ==
    /// Removes a key from both tiers. Absent keys are a no-op.
    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
        self.stats.set_resident_entries(self.entries.len());
        self.remove_durable(key);
        debug!(key, "Cache entry invalidated");
    }

    // == Invalidate Pattern ==
    /// Removes every key whose string form matches `pattern`.
    ///
    /// Both resident keys and keys only present in the durable tier are
    /// scanned. If the durable tier cannot be listed, only resident keys
    /// are matched.
    ///
    /// Returns the number of keys invalidated.
    pub fn invalidate_pattern(&mut self, pattern: &Regex) -> usize {
        let mut matched: BTreeSet<String> = self
            .entries
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect();

        match self.durable_keys() {
            Ok(keys) => matched.extend(keys.into_iter().filter(|key| pattern.is_match(key))),
            Err(err) => {
                warn!(error = %err, "Durable tier not listable, invalidating resident keys only");
                self.stats.record_storage_error();
            }
        }

        for key in &matched {
            self.invalidate(key);
        }

        debug!(pattern = pattern.as_str(), count = matched.len(), "Pattern invalidation");
        matched.len()
    }

    // == Clear ==
    /// Empties both tiers.
    ///
    /// Only records under the cache prefix are removed from the durable
    /// backend; unrelated keys sharing the same origin are left alone.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_resident_entries(0);

        match self.durable_keys() {
            Ok(keys) => {
                for key in keys {
                    self.remove_durable(&key);
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to list durable tier during clear");
                self.stats.record_storage_error();
            }
        }
    }

    // == Volatile Tier Helpers ==
    /// Returns true if the key is present in the volatile tier, without
    /// checking validity or touching the durable tier.
    pub fn is_resident(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drops the volatile tier only, as a process restart would.
    pub fn clear_volatile(&mut self) {
        self.entries.clear();
        self.stats.set_resident_entries(0);
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_resident_entries(self.entries.len());
        stats
    }

    /// Returns the TTL applied to writes without an explicit one.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Length ==
    /// Returns the number of entries in the volatile tier.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the volatile tier is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Tier Lookup ==
    /// Finds a valid entry, promoting it from the durable tier if needed.
    ///
    /// Invalid entries discovered here are deleted from both tiers.
    fn load(&mut self, key: &str) -> Option<&CacheEntry> {
        match self.entries.get(key).map(|entry| entry.is_valid()) {
            Some(true) => {
                self.stats.record_hit();
                return self.entries.get(key);
            }
            Some(false) => {
                debug!(key, "Resident entry expired");
                self.entries.remove(key);
                self.stats.set_resident_entries(self.entries.len());
                self.remove_durable(key);
                self.stats.record_expiration();
                self.stats.record_miss();
                return None;
            }
            None => {}
        }

        match self.read_durable(key) {
            Ok(Some(entry)) if entry.is_valid() => {
                debug!(key, "Promoting durable entry to memory");
                self.stats.record_hit();
                self.stats.record_promotion();
                self.entries.insert(key.to_string(), entry);
                self.stats.set_resident_entries(self.entries.len());
                self.entries.get(key)
            }
            Ok(Some(_)) => {
                debug!(key, "Durable entry expired");
                self.remove_durable(key);
                self.stats.record_expiration();
                self.stats.record_miss();
                None
            }
            Ok(None) => {
                self.stats.record_miss();
                None
            }
            Err(err) => {
                warn!(key, error = %err, "Durable read failed, discarding record");
                self.stats.record_storage_error();
                self.remove_durable(key);
                self.stats.record_miss();
                None
            }
        }
    }

    // == Durable Tier Access ==
    fn read_durable(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let Some(raw) = self.durable.get_item(&durable_key(key))? else {
            return Ok(None);
        };
        let record = DurableRecord::decode(&raw)?;
        Ok(Some(CacheEntry::from_record(&record)?))
    }

    fn write_durable(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        let raw = entry.to_record()?.encode()?;
        self.durable.set_item(&durable_key(key), &raw)
    }

    fn remove_durable(&mut self, key: &str) {
        if let Err(err) = self.durable.remove_item(&durable_key(key)) {
            warn!(key, error = %err, "Failed to remove durable record");
            self.stats.record_storage_error();
        }
    }

    /// Cache keys present in the durable tier, prefix stripped.
    fn durable_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .durable
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(DURABLE_PREFIX).map(str::to_string))
            .collect())
    }
}

fn durable_key(key: &str) -> String {
    format!("{}{}", DURABLE_PREFIX, key)
}
