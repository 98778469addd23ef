//! Binding Module
//!
//! Consumer-facing reactive wrapper around the cached fetcher.

mod query;

pub use query::{QueryBinding, QueryOptions, QueryState};
