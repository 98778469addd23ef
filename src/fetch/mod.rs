//! Fetch Module
//!
//! Cache-aware HTTP fetching against the backend service.

mod fetcher;
mod request;

pub use fetcher::{CachedFetcher, FetcherConfig};
pub use request::{cache_key, FetchRequest};
