//! Fetch Request
//!
//! Describes one backend call and derives its cache key.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;

// == Fetch Request ==
/// Method, URL, headers and body of a backend call, forwarded unmodified.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// HTTP method, GET unless set otherwise
    pub method: Method,
    /// Endpoint URL as given by the caller, query string included
    pub url: String,
    /// Extra request headers
    pub headers: HeaderMap,
    /// Raw request body
    pub body: Option<String>,
}

impl FetchRequest {
    // == Constructors ==
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    // == Builders ==
    /// Adds a request header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a raw request body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON request body and its content-type.
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, serde_json::Error> {
        let encoded = serde_json::to_string(body)?;
        Ok(self
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(encoded))
    }

    // == Cache Key ==
    /// Returns `"{METHOD}_{url}"`.
    ///
    /// The body is not part of the key: two calls with the same method and
    /// URL share one entry regardless of payload.
    pub fn cache_key(&self) -> String {
        cache_key(&self.method, &self.url)
    }
}

/// Builds the cache key for a method and endpoint URL.
pub fn cache_key(method: &Method, url: &str) -> String {
    format!("{}_{}", method.as_str(), url)
}
