//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_TTL_SECS;
use crate::fetch::FetcherConfig;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in seconds for responses cached without an explicit TTL
    pub default_ttl: u64,
    /// Directory holding the durable tier
    pub cache_dir: PathBuf,
    /// Backend service base URL
    pub backend_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Whether concurrent misses on one key share a single backend request
    pub coalesce_requests: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_DIR` - Durable tier directory (default: .api_cache)
    /// - `BACKEND_URL` - Backend base URL (default: http://127.0.0.1:8080)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `COALESCE_REQUESTS` - Share in-flight requests (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env::var("DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            backend_url: env::var("BACKEND_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.backend_url),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            coalesce_requests: env::var("COALESCE_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.coalesce_requests),
        }
    }

    /// Default TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// Fetcher settings derived from this configuration.
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            base_url: self.backend_url.clone(),
            coalesce: self.coalesce_requests,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL_SECS,
            cache_dir: PathBuf::from(".api_cache"),
            backend_url: "http://127.0.0.1:8080".to_string(),
            server_port: 3000,
            coalesce_requests: true,
        }
    }
}
