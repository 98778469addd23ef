//! Cache Module
//!
//! Provides the dual-tier response cache with lazy TTL expiry.

mod durable;
mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use durable::{DurableStorage, FileStorage, MemoryStorage};
pub use entry::{current_timestamp_ms, CacheEntry, DurableRecord};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Namespace prefix for records in the durable tier
pub const DURABLE_PREFIX: &str = "api_cache_";

/// Validity window applied when no TTL is given (5 minutes)
pub const DEFAULT_TTL_SECS: u64 = 300;
