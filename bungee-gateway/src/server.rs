//! HTTP server setup: builds the runtime registry from configuration,
//! starts active health probing per route, and assembles the Axum router
//! that fronts the failover driver.
//!
//! ## Architecture
//!
//! - [`AppState`]: shared state across handlers — the registry, the
//!   failover driver, the prober, configured plugins, and the config itself.
//! - Route registration: `/health`, `/admin/upstreams`, and a catch-all proxy
//!   route that hands every other path to the failover driver.
//! - Middleware: CORS and request timeout, layered outermost first.

use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;
use bungee_core::{FailoverDriver, PluginHooks, Prober, Registry};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::handlers;
use crate::middleware::cors_middleware;

/// Application state shared across all HTTP handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<Registry>,
    pub driver: Arc<FailoverDriver>,
    pub prober: Arc<Prober>,
    pub plugins: Arc<Vec<Box<dyn PluginHooks>>>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            registry: self.registry.clone(),
            driver: self.driver.clone(),
            prober: self.prober.clone(),
            plugins: self.plugins.clone(),
        }
    }
}

/// Create and configure the HTTP server: build the registry, start probers
/// for every route with health checking enabled, and assemble the router.
/// Returns the router alongside the prober handle so the caller can stop
/// every running probe on shutdown.
pub async fn create_server(config: Config) -> anyhow::Result<(Router, Arc<Prober>)> {
    let registry = Arc::new(Registry::new());
    registry.build_from_config(&config.routes);

    let prober = Arc::new(Prober::new());
    registry.for_each_route(|route| prober.start(route.clone()));

    if config.server.cors.enabled && config.server.cors.allowed_origins.iter().any(|o| o == "*") {
        tracing::warn!(
            "CORS is enabled with wildcard origins. This is unsafe for production. Configure explicit allowed_origins."
        );
    }

    let prober_handle = prober.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        driver: Arc::new(FailoverDriver::new()),
        prober,
        plugins: Arc::new(Vec::new()),
    };

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/admin/upstreams", get(handlers::admin_upstreams))
        .fallback(any(handlers::proxy))
        .layer(
            ServiceBuilder::new()
                .layer(cors_middleware(&config.server.cors))
                .layer(TimeoutLayer::new(config.server.timeout)),
        )
        .with_state(state);

    Ok((app, prober_handle))
}
