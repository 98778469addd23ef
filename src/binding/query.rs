//! Query Binding
//!
//! Declarative `{data, loading, error}` state over the cached fetcher.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::debug;

use crate::error::FetchError;
use crate::fetch::{cache_key, CachedFetcher, FetchRequest};

// == Query State ==
/// Observable state of a bound query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    /// Last successfully fetched value
    pub data: Option<T>,
    /// True while a fetch is running
    pub loading: bool,
    /// Failure of the most recent fetch, cleared when a new one starts
    pub error: Option<FetchError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

// == Query Options ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Disabled bindings never fetch
    pub enabled: bool,
    /// TTL for responses cached by this binding
    pub ttl: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: None,
        }
    }
}

// == Query Binding ==
/// Binds one GET endpoint to an observable [`QueryState`].
///
/// A fetch runs once per distinct `(url, enabled)` target; beyond that the
/// binding only fetches when asked to. All caching decisions are left to
/// the [`CachedFetcher`], so `refetch` still returns a cached value unless
/// the entry was invalidated first.
pub struct QueryBinding<T> {
    fetcher: CachedFetcher,
    url: String,
    options: QueryOptions,
    last_target: Option<(String, bool)>,
    state: watch::Sender<QueryState<T>>,
}

impl<T> QueryBinding<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    // == Bind ==
    /// Creates the binding and runs its first fetch if enabled.
    pub async fn bind(
        fetcher: CachedFetcher,
        url: impl Into<String>,
        options: QueryOptions,
    ) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        let mut binding = Self {
            fetcher,
            url: url.into(),
            options,
            last_target: None,
            state,
        };
        binding.sync().await;
        binding
    }

    // == Set Target ==
    /// Points the binding at a new URL or toggles it.
    ///
    /// Fetches only if the `(url, enabled)` pair changed and is enabled.
    pub async fn set_target(&mut self, url: impl Into<String>, enabled: bool) {
        self.url = url.into();
        self.options.enabled = enabled;
        self.sync().await;
    }

    // == Refetch ==
    /// Runs the fetch again. A valid cache entry still short-circuits it.
    pub async fn refetch(&self) {
        if self.options.enabled {
            self.run_fetch().await;
        }
    }

    // == Invalidate ==
    /// Drops the cache entry backing this binding.
    pub async fn invalidate(&self) {
        self.fetcher.store().write().await.invalidate(&self.cache_key());
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Returns a receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache_key(&self) -> String {
        cache_key(&Method::GET, &self.url)
    }

    async fn sync(&mut self) {
        let target = (self.url.clone(), self.options.enabled);
        if self.last_target.as_ref() == Some(&target) {
            return;
        }
        self.last_target = Some(target);

        if self.options.enabled {
            self.run_fetch().await;
        }
    }

    async fn run_fetch(&self) {
        debug!(url = %self.url, "Query binding fetching");
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self
            .fetcher
            .fetch::<T>(FetchRequest::get(self.url.as_str()), self.options.ttl)
            .await;

        self.state.send_modify(|state| {
            state.loading = false;
            match result {
                Ok(data) => state.data = Some(data),
                Err(err) => state.error = Some(err),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryStorage};
    use crate::fetch::FetcherConfig;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn offline_fetcher() -> CachedFetcher {
        let store = CacheStore::new(Arc::new(MemoryStorage::new()), Duration::from_secs(60));
        // Port 9 (discard) is never expected to answer
        CachedFetcher::new(
            Arc::new(RwLock::new(store)),
            FetcherConfig::new("http://127.0.0.1:9"),
        )
    }

    #[test]
    fn test_state_default() {
        let state: QueryState<u32> = QueryState::default();
        assert!(state.data.is_none());
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_disabled_binding_never_fetches() {
        let options = QueryOptions {
            enabled: false,
            ttl: None,
        };
        let binding: QueryBinding<u32> =
            QueryBinding::bind(offline_fetcher(), "/api/team", options).await;

        binding.refetch().await;

        assert_eq!(binding.snapshot(), QueryState::default());
    }

    #[tokio::test]
    async fn test_binding_serves_cached_value() {
        let fetcher = offline_fetcher();
        fetcher
            .store()
            .write()
            .await
            .set("GET_/api/team", &vec![1u32, 2], None);

        let binding: QueryBinding<Vec<u32>> =
            QueryBinding::bind(fetcher, "/api/team", QueryOptions::default()).await;

        let state = binding.snapshot();
        assert_eq!(state.data, Some(vec![1, 2]));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_binding_invalidate_uses_get_key() {
        let fetcher = offline_fetcher();
        fetcher.store().write().await.set("GET_/api/shop", &1u32, None);

        let binding: QueryBinding<u32> =
            QueryBinding::bind(fetcher.clone(), "/api/shop", QueryOptions::default()).await;
        assert_eq!(binding.cache_key(), "GET_/api/shop");

        binding.invalidate().await;
        assert!(!fetcher.store().write().await.has("GET_/api/shop"));
    }
}
