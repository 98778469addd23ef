//! API Module
//!
//! HTTP handlers and routing for the local cache service.
//!
//! # Endpoints
//! - `GET /api/*path` - Cached backend GET
//! - `DELETE /cache` - Clear the cache
//! - `DELETE /cache/entry?key=...` - Invalidate one key
//! - `POST /cache/invalidate` - Invalidate keys matching a pattern
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
