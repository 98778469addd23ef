//! Cache Entry Module
//!
//! Defines cache entries with TTL validity and their durable record layout.

use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::StorageError;

// == Cache Entry ==
/// A single cached payload with its write time and validity window.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T = serde_json::Value> {
    /// Decoded response body
    pub payload: T,
    /// Write timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Validity window
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(payload: T, ttl: Duration) -> Self {
        Self {
            payload,
            created_at: current_timestamp_ms(),
            ttl,
        }
    }

    // == Validity ==
    /// Checks validity against an explicit clock reading.
    ///
    /// Boundary condition: an entry whose age equals its TTL is still valid.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        let age = now_ms.saturating_sub(self.created_at);
        age <= ttl_ms(self.ttl)
    }

    /// Checks validity against the current time.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(current_timestamp_ms())
    }

    /// Returns remaining validity in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> i64 {
        let expires = self.created_at.saturating_add(ttl_ms(self.ttl));
        (expires - current_timestamp_ms()).max(0)
    }
}

impl<T: Serialize> CacheEntry<T> {
    // == To Record ==
    /// Encodes the entry into its durable record layout.
    pub fn to_record(&self) -> Result<DurableRecord, StorageError> {
        Ok(DurableRecord {
            data: serde_json::to_string(&self.payload)?,
            timestamp: self.created_at,
            ttl: ttl_ms(self.ttl) as u64,
        })
    }
}

impl<T: DeserializeOwned> CacheEntry<T> {
    // == From Record ==
    /// Decodes a durable record, keeping its original write time.
    pub fn from_record(record: &DurableRecord) -> Result<Self, StorageError> {
        Ok(Self {
            payload: serde_json::from_str(&record.data)?,
            created_at: record.timestamp,
            ttl: Duration::from_millis(record.ttl),
        })
    }
}

// == Durable Record ==
/// Persisted form of an entry.
///
/// `data` holds the payload as JSON text nested inside the outer JSON
/// record, so the record shape stays the same for every payload type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurableRecord {
    /// JSON-encoded payload
    pub data: String,
    /// Write timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Validity window in milliseconds
    pub ttl: u64,
}

impl DurableRecord {
    /// Parses a record from its stored text.
    pub fn decode(raw: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serializes the record to its stored text.
    pub fn encode(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn ttl_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}
