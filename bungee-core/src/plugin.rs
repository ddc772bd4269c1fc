//! Pure hook and transform contracts the failover driver calls into.
//! Concrete plugin/transformer implementations (cost tracking, content
//! filtering, request logging, body transformation) remain an external
//! collaborator's concern and are out of scope here; this module only
//! defines the trait shapes the driver depends on, plus a no-op default
//! implementation of each so the driver is independently testable.
//!
//! Hooks run in declared order and tolerate per-plugin failure: a hook that
//! errors is logged and skipped rather than aborting the attempt.

use async_trait::async_trait;

use crate::error::ReliabilityError;
use crate::snapshot::{RequestSnapshot, UpstreamResponse};

/// The plugin hook contract. All hooks default to a no-op so a driver under
/// test can run with zero configured plugins.
#[async_trait]
pub trait PluginHooks: Send + Sync {
    /// Called once per attempt before any transformer runs.
    async fn on_request_init(&self, _snapshot: &mut RequestSnapshot) -> Result<(), ReliabilityError> {
        Ok(())
    }

    /// May return a response that short-circuits dispatch entirely.
    async fn on_intercept_request(
        &self,
        _snapshot: &RequestSnapshot,
    ) -> Result<Option<UpstreamResponse>, ReliabilityError> {
        Ok(None)
    }

    /// Called immediately before dispatch, after all transformers have run.
    async fn on_before_request(&self, _snapshot: &mut RequestSnapshot) -> Result<(), ReliabilityError> {
        Ok(())
    }

    /// May replace the response the driver is about to return to the
    /// client.
    async fn on_response(
        &self,
        _response: &mut UpstreamResponse,
    ) -> Result<(), ReliabilityError> {
        Ok(())
    }

    /// Called once, after the attempt loop is exhausted without success.
    async fn on_error(&self, _error: &ReliabilityError) -> Result<(), ReliabilityError> {
        Ok(())
    }
}

/// Passthrough implementation used when no plugins are configured for a
/// route.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPlugin;

impl PluginHooks for NoopPlugin {}

/// Per-path-regex request/response transformation, independent of the
/// plugin hook chain. Streaming responses are transformed event-by-event by
/// the caller; the core treats the transformer itself as opaque.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform_request(
        &self,
        snapshot: RequestSnapshot,
    ) -> Result<RequestSnapshot, ReliabilityError>;

    async fn transform_response(
        &self,
        response: UpstreamResponse,
        is_stream: bool,
    ) -> Result<UpstreamResponse, ReliabilityError>;
}

/// Identity transformer: returns its input unchanged. Used when a route has
/// no matching transformer rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTransformer;

#[async_trait]
impl Transformer for PassthroughTransformer {
    async fn transform_request(
        &self,
        snapshot: RequestSnapshot,
    ) -> Result<RequestSnapshot, ReliabilityError> {
        Ok(snapshot)
    }

    async fn transform_response(
        &self,
        response: UpstreamResponse,
        _is_stream: bool,
    ) -> Result<UpstreamResponse, ReliabilityError> {
        Ok(response)
    }
}

/// Run `hooks` in declared order, tolerating per-plugin errors (log and
/// continue). Stops and returns the response if any plugin's
/// `onInterceptRequest` short-circuits.
pub async fn run_intercept_hooks(
    hooks: &[Box<dyn PluginHooks>],
    snapshot: &RequestSnapshot,
) -> Option<UpstreamResponse> {
    for hook in hooks {
        match hook.on_intercept_request(snapshot).await {
            Ok(Some(response)) => return Some(response),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, "plugin onInterceptRequest failed, continuing");
            }
        }
    }
    None
}
