//! API Cache - client-side data layer for a JSON backend
//!
//! Provides a dual-tier response cache with TTL expiry, stale-on-failure
//! fallback and pattern-based invalidation, a cache-aware fetcher, and a
//! reactive binding for consumers.

pub mod api;
pub mod binding;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;

pub use api::AppState;
pub use binding::{QueryBinding, QueryOptions, QueryState};
pub use cache::{CacheStore, DurableStorage, FileStorage, MemoryStorage};
pub use config::Config;
pub use error::{FetchError, StorageError};
pub use fetch::{CachedFetcher, FetchRequest, FetcherConfig};
