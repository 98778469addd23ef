//! Request DTOs for the cache service API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use regex::Regex;
use serde::Deserialize;

/// Request body for pattern invalidation (POST /cache/invalidate)
///
/// # Fields
/// - `pattern`: Regular expression matched against cache keys
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidatePatternRequest {
    /// Regex matched against `"{METHOD}_{url}"` keys
    pub pattern: String,
}

impl InvalidatePatternRequest {
    /// Compiles the pattern.
    ///
    /// Returns an error message if the pattern is empty or not a valid regex.
    pub fn compile(&self) -> Result<Regex, String> {
        if self.pattern.is_empty() {
            return Err("Pattern cannot be empty".to_string());
        }
        Regex::new(&self.pattern).map_err(|err| format!("Invalid pattern: {}", err))
    }
}

/// Query string for single-key invalidation (DELETE /cache/entry?key=...)
#[derive(Debug, Clone, Deserialize)]
pub struct KeyQuery {
    /// Full cache key, e.g. `GET_/api/team`
    pub key: String,
}

impl KeyQuery {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        None
    }
}
