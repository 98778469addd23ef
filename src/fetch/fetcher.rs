//! Cached Fetcher
//!
//! Wraps backend HTTP calls with the cache store: valid hits short-circuit
//! the network, misses populate the store, and failures fall back to any
//! value still readable from the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::error::FetchError;
use crate::fetch::FetchRequest;

type InFlight = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

/// Requests coalesce only when both the cache key and the TTL match.
type InFlightKey = (String, Option<Duration>);

// == Fetcher Config ==
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Base URL prepended to relative endpoint URLs
    pub base_url: String,
    /// Share one network request between concurrent misses on the same key
    pub coalesce: bool,
}

impl FetcherConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Resolves an endpoint URL against the base URL.
    ///
    /// Absolute URLs are returned unchanged.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if url.starts_with('/') {
            format!("{}{}", base, url)
        } else {
            format!("{}/{}", base, url)
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            coalesce: true,
        }
    }
}

// == Cached Fetcher ==
/// HTTP client backed by a shared [`CacheStore`].
///
/// Cheap to clone; clones share the store, the HTTP connection pool and
/// the in-flight request table.
#[derive(Clone)]
pub struct CachedFetcher {
    client: Client,
    store: Arc<RwLock<CacheStore>>,
    config: FetcherConfig,
    in_flight: Arc<Mutex<HashMap<InFlightKey, InFlight>>>,
}

impl std::fmt::Debug for CachedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFetcher")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl CachedFetcher {
    // == Constructor ==
    pub fn new(store: Arc<RwLock<CacheStore>>, config: FetcherConfig) -> Self {
        Self::with_client(Client::new(), store, config)
    }

    /// Creates a fetcher reusing an existing HTTP client.
    pub fn with_client(
        client: Client,
        store: Arc<RwLock<CacheStore>>,
        config: FetcherConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<RwLock<CacheStore>> {
        &self.store
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    // == Get ==
    /// Cached GET of `url` with the store's default TTL.
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.fetch(FetchRequest::get(url), None).await
    }

    // == Fetch ==
    /// Returns the cached value for the request, fetching it on a miss.
    ///
    /// # Arguments
    /// * `request` - Backend call; its method and URL form the cache key
    /// * `ttl` - Optional validity window for a newly cached response
    ///
    /// # Errors
    /// Returns [`FetchError`] only when the request failed and the store
    /// holds no value for the key. A cached payload that does not decode
    /// as `T` yields [`FetchError::Parse`].
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        request: FetchRequest,
        ttl: Option<Duration>,
    ) -> Result<T, FetchError> {
        let value = self.fetch_value(request, ttl).await?;
        serde_json::from_value(value).map_err(|err| FetchError::Parse(err.to_string()))
    }

    async fn fetch_value(
        &self,
        request: FetchRequest,
        ttl: Option<Duration>,
    ) -> Result<Value, FetchError> {
        let key = request.cache_key();

        let cached = self.store.write().await.get::<Value>(&key);
        if let Some(value) = cached {
            debug!(key = %key, "Cache hit");
            return Ok(value);
        }
        debug!(key = %key, "Cache miss, fetching");

        let outcome = if self.config.coalesce {
            self.join_in_flight(&key, request, ttl).await
        } else {
            populate(
                self.client.clone(),
                Arc::clone(&self.store),
                self.config.resolve(&request.url),
                request,
                key.clone(),
                ttl,
            )
            .await
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                let stale = self.store.write().await.get::<Value>(&key);
                match stale {
                    Some(value) => {
                        warn!(key = %key, error = %err, "Fetch failed, serving cached value");
                        Ok(value)
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Awaits the in-flight request for `key` and `ttl`, starting one if none
    /// exists.
    ///
    /// A joining caller's headers and body are not sent; the response is the
    /// one produced by the request that started the flight.
    async fn join_in_flight(
        &self,
        key: &str,
        request: FetchRequest,
        ttl: Option<Duration>,
    ) -> Result<Value, FetchError> {
        let shared = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let flight = (key.to_string(), ttl);
            match in_flight.get(&flight).cloned() {
                Some(existing) => {
                    debug!(key, "Joining in-flight request");
                    existing
                }
                None => {
                    let registry = Arc::clone(&self.in_flight);
                    let owned_flight = flight.clone();
                    let task = populate(
                        self.client.clone(),
                        Arc::clone(&self.store),
                        self.config.resolve(&request.url),
                        request,
                        key.to_string(),
                        ttl,
                    );

                    let shared = async move {
                        let result = task.await;
                        registry
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&owned_flight);
                        result
                    }
                    .boxed()
                    .shared();

                    in_flight.insert(flight, shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// Number of requests currently awaiting a backend response.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// == Network ==
/// Performs the request and writes a successful response to the store.
async fn populate(
    client: Client,
    store: Arc<RwLock<CacheStore>>,
    url: String,
    request: FetchRequest,
    key: String,
    ttl: Option<Duration>,
) -> Result<Value, FetchError> {
    let value = send(&client, &url, request).await?;
    store.write().await.set(&key, &value, ttl);
    Ok(value)
}

/// Sends the request and classifies the response.
async fn send(client: &Client, url: &str, request: FetchRequest) -> Result<Value, FetchError> {
    let mut builder = client
        .request(request.method, url)
        .headers(request.headers);
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        });
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.contains("application/json"));
    if !is_json {
        return Err(FetchError::InvalidContentType);
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| FetchError::Parse(err.to_string()))
}
