//! Gateway-facing error wrapper. Maps `bungee_core::ReliabilityError` (and
//! a handful of gateway-local configuration/serialization failures) to Axum
//! HTTP responses with a `{"error": {"message", "type", "code"}}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bungee_core::ReliabilityError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("reliability error: {0}")]
    Reliability(#[from] ReliabilityError),

    #[error("route not found: {path}")]
    RouteNotFound { path: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            GatewayError::Reliability(ReliabilityError::NoAvailableUpstream { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "no_available_upstream")
            }
            GatewayError::Reliability(ReliabilityError::UpstreamNonRetryableStatus {
                status,
                ..
            }) => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "upstream_status",
            ),
            GatewayError::Reliability(ReliabilityError::UpstreamTimeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout")
            }
            GatewayError::Reliability(ReliabilityError::UpstreamTransport { .. }) => {
                (StatusCode::BAD_GATEWAY, "upstream_transport_error")
            }
            GatewayError::Reliability(ReliabilityError::UpstreamRetryableStatus { .. }) => {
                (StatusCode::BAD_GATEWAY, "upstream_retryable_status")
            }
            GatewayError::Reliability(ReliabilityError::PluginError { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "plugin_error")
            }
            GatewayError::Reliability(ReliabilityError::ProbeError { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "probe_error")
            }
            GatewayError::RouteNotFound { .. } => (StatusCode::NOT_FOUND, "route_not_found"),
            GatewayError::Config { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            GatewayError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
