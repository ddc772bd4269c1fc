//! # Bungee Gateway
//!
//! The HTTP surface for the Bungee reverse proxy: configuration loading,
//! the Axum server and its routes, and the gateway-facing error type. The
//! reliability subsystem itself — health tracking, the selector, the
//! failover driver, active probing — lives in `bungee-core`; this crate
//! wires it to an HTTP listener.
//!
//! ## Architecture
//!
//! - [`config`]: server/route/logging/metrics configuration, TOML-backed
//!   with environment variable overrides.
//! - [`server`]: `AppState` and `create_server`, which builds the registry,
//!   starts active probers, and assembles the router.
//! - [`handlers`]: `/health`, `/admin/upstreams`, and the proxy catch-all.
//! - [`middleware`]: the CORS layer.
//! - [`gateway_error`]: maps `bungee_core::ReliabilityError` (and local
//!   config/routing errors) to HTTP responses.

pub mod config;
pub mod gateway_error;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::create_server;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let config = Config::default();
        let (app, prober) = create_server(config).await.unwrap();
        let server = TestServer::new(app).unwrap();
        let response = server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["status"], "healthy");
        prober.stop_all();
    }

    #[tokio::test]
    async fn admin_upstreams_returns_empty_routes_with_no_config() {
        let config = Config::default();
        let (app, prober) = create_server(config).await.unwrap();
        let server = TestServer::new(app).unwrap();
        let response = server.get("/admin/upstreams").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<serde_json::Value>();
        assert!(body["routes"].as_array().unwrap().is_empty());
        prober.stop_all();
    }
}
