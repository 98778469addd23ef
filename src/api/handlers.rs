//! API Handlers
//!
//! HTTP request handlers for each cache service endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::Uri,
    Json,
};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{CacheStore, FileStorage};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::fetch::CachedFetcher;
use crate::models::{
    ClearResponse, HealthResponse, InvalidatePatternRequest, InvalidatePatternResponse,
    InvalidateResponse, KeyQuery, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The fetcher owns the one process-wide store; handlers reach the store
/// through it so that every path shares the same tiers.
#[derive(Clone)]
pub struct AppState {
    /// Cache-aware backend client
    pub fetcher: CachedFetcher,
}

impl AppState {
    /// Creates a new AppState around an existing fetcher.
    pub fn new(fetcher: CachedFetcher) -> Self {
        Self { fetcher }
    }

    /// Creates a new AppState from configuration.
    ///
    /// The durable tier lives in `config.cache_dir`.
    pub fn from_config(config: &Config) -> Self {
        let durable = Arc::new(FileStorage::new(&config.cache_dir));
        let store = CacheStore::new(durable, config.default_ttl());
        let fetcher = CachedFetcher::new(Arc::new(RwLock::new(store)), config.fetcher_config());
        Self::new(fetcher)
    }

    /// Returns the shared store.
    pub fn cache(&self) -> &Arc<RwLock<CacheStore>> {
        self.fetcher.store()
    }
}

/// Handler for GET /api/*path
///
/// Serves the backend response for the same path and query, from cache
/// when a valid entry exists.
pub async fn proxy_handler(State(state): State<AppState>, uri: Uri) -> Result<Json<Value>> {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let value = state.fetcher.get::<Value>(url).await?;
    Ok(Json(value))
}

/// Handler for DELETE /cache/entry?key=...
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    state.cache().write().await.invalidate(&query.key);

    Ok(Json(InvalidateResponse::new(query.key)))
}

/// Handler for POST /cache/invalidate
///
/// Removes every key matching the regex in the request body.
pub async fn invalidate_pattern_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidatePatternRequest>,
) -> Result<Json<InvalidatePatternResponse>> {
    let pattern = req.compile().map_err(ApiError::InvalidRequest)?;

    let removed = state.cache().write().await.invalidate_pattern(&pattern);
    info!(pattern = %req.pattern, removed, "Pattern invalidation requested");

    Ok(Json(InvalidatePatternResponse::new(req.pattern, removed)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache().write().await.clear();
    info!("Cache cleared");

    Json(ClearResponse::new())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    // Acquire read lock for stats
    let stats = state.cache().read().await.stats();

    Json(StatsResponse::new(&stats, state.fetcher.in_flight_count()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::fetch::FetcherConfig;
    use serde_json::json;
    use std::time::Duration;

    fn test_state() -> AppState {
        let store = CacheStore::new(Arc::new(MemoryStorage::new()), Duration::from_secs(300));
        let fetcher = CachedFetcher::new(
            Arc::new(RwLock::new(store)),
            FetcherConfig::new("http://127.0.0.1:9"),
        );
        AppState::new(fetcher)
    }

    #[tokio::test]
    async fn test_proxy_handler_serves_cache_hit() {
        let state = test_state();
        state
            .cache()
            .write()
            .await
            .set("GET_/api/team?page=2", &json!({"page": 2}), None);

        let uri: Uri = "/api/team?page=2".parse().unwrap();
        let response = proxy_handler(State(state), uri).await.unwrap();
        assert_eq!(response.0, json!({"page": 2}));
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let state = test_state();
        state.cache().write().await.set("GET_/api/team", &json!([]), None);

        let query = KeyQuery {
            key: "GET_/api/team".to_string(),
        };
        let result = invalidate_handler(State(state.clone()), Query(query)).await;
        assert!(result.is_ok());
        assert!(!state.cache().write().await.has("GET_/api/team"));
    }

    #[tokio::test]
    async fn test_invalidate_handler_empty_key() {
        let state = test_state();

        let query = KeyQuery { key: "".to_string() };
        let result = invalidate_handler(State(state), Query(query)).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_invalidate_pattern_handler() {
        let state = test_state();
        {
            let mut cache = state.cache().write().await;
            cache.set("GET_/api/team", &json!([]), None);
            cache.set("GET_/api/team/1", &json!({}), None);
            cache.set("GET_/api/shop", &json!([]), None);
        }

        let req = InvalidatePatternRequest {
            pattern: "/api/team".to_string(),
        };
        let response = invalidate_pattern_handler(State(state.clone()), Json(req))
            .await
            .unwrap();

        assert_eq!(response.removed, 2);
        assert!(state.cache().write().await.has("GET_/api/shop"));
    }

    #[tokio::test]
    async fn test_clear_and_stats_handlers() {
        let state = test_state();
        state.cache().write().await.set("GET_/a", &json!(1), None);

        clear_handler(State(state.clone())).await;

        let response = stats_handler(State(state)).await;
        assert_eq!(response.resident_entries, 0);
        assert_eq!(response.in_flight, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
