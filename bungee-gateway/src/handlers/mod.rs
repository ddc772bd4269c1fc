//! HTTP handlers: health check, admin upstream introspection, and the proxy
//! catch-all that hands every other request to the failover driver.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bungee_core::snapshot::RequestSnapshot;
use serde_json::{json, Value};

use crate::gateway_error::GatewayError;
use crate::server::AppState;

pub async fn health_check() -> Result<Json<Value>, GatewayError> {
    let uptime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    Ok(Json(json!({
        "status": "healthy",
        "uptime": uptime,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// Dumps the current registry generation: one entry per route, one entry
/// per upstream, with its weight, priority, status, and health counters.
pub async fn admin_upstreams(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    let mut routes = Vec::new();
    state.registry.for_each_route(|route| {
        let now = std::time::Instant::now();
        let upstreams: Vec<Value> = route
            .upstreams
            .iter()
            .map(|upstream| {
                let guard = upstream.state.lock().expect("upstream lock poisoned");
                let slow_start = route
                    .failover
                    .slow_start
                    .as_ref()
                    .map(|cfg| guard.slow_start_progress(now, cfg.duration))
                    .unwrap_or(100.0);
                json!({
                    "target": upstream.target,
                    "weight": upstream.weight,
                    "priority": upstream.priority,
                    "disabled": upstream.disabled,
                    "status": guard.status,
                    "consecutiveFailures": guard.consecutive_failures,
                    "consecutiveSuccesses": guard.consecutive_successes,
                    "healthCheckSuccesses": guard.health_check_successes,
                    "healthCheckFailures": guard.health_check_failures,
                    "slowStartProgress": slow_start,
                })
            })
            .collect();
        routes.push(json!({
            "path": route.path,
            "upstreams": upstreams,
        }));
    });

    Ok(Json(json!({ "routes": routes })))
}

/// Catch-all proxy handler: builds a [`RequestSnapshot`] from the incoming
/// request and hands it to the failover driver for the longest-matching
/// configured route.
pub async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let route = match find_route(&state, &path) {
        Some(route) => route,
        None => {
            return GatewayError::RouteNotFound { path }.into_response();
        }
    };

    let method = request.method().clone();
    let headers: HeaderMap = request.headers().clone();
    let body = match axum::body::to_bytes(request.into_body(), state.config.server.max_body_size)
        .await
    {
        Ok(bytes) => bytes,
        Err(error) => {
            return GatewayError::Config {
                message: format!("failed to read request body: {error}"),
            }
            .into_response();
        }
    };

    let snapshot = RequestSnapshot::new(method, path_and_query, headers, body.to_vec());

    match state.driver.dispatch(&route, &snapshot, &state.plugins).await {
        Ok(response) => upstream_response_to_axum(response),
        Err(error) => GatewayError::Reliability(error).into_response(),
    }
}

fn find_route(
    state: &AppState,
    path: &str,
) -> Option<std::sync::Arc<bungee_core::registry::RouteState>> {
    let mut best: Option<std::sync::Arc<bungee_core::registry::RouteState>> = None;
    state.registry.for_each_route(|route| {
        if path.starts_with(route.path.as_str()) {
            let better = best
                .as_ref()
                .map(|current| route.path.len() > current.path.len())
                .unwrap_or(true);
            if better {
                best = Some(route.clone());
            }
        }
    });
    best
}

fn upstream_response_to_axum(response: bungee_core::snapshot::UpstreamResponse) -> Response {
    let status = axum::http::StatusCode::from_u16(response.status)
        .unwrap_or(axum::http::StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    if let Some(headers) = builder.headers_mut() {
        *headers = response.headers;
    }
    builder
        .body(axum::body::Body::from(response.body))
        .unwrap_or_else(|_| GatewayError::Config {
            message: "failed to build upstream response".into(),
        }
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let Json(body) = health_check().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert!(body["version"].is_string());
    }
}
