//! HTTP middleware. Trimmed down to the one layer the reliability gateway
//! still needs directly: CORS. Timeout is applied via `tower_http`'s
//! `TimeoutLayer` in `server.rs` rather than a custom middleware fn.

use crate::config::CorsConfig;
use axum::http;
use tower_http::cors::{Any, CorsLayer};

/// Build a `CorsLayer` from route configuration: wildcard origins use
/// `Any`, otherwise each configured origin is parsed individually.
pub fn cors_middleware(cors_config: &CorsConfig) -> CorsLayer {
    if !cors_config.enabled {
        return CorsLayer::new();
    }

    let mut cors = CorsLayer::new();

    if cors_config.allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(Any);
    } else {
        for origin in &cors_config.allowed_origins {
            if let Ok(origin) = origin.parse::<http::header::HeaderValue>() {
                cors = cors.allow_origin(origin);
            }
        }
    }

    cors = cors.allow_methods(Any).allow_headers(Any);

    cors
}
