//! The per-request failover driver: the request-path state machine that
//! turns one client request plus a [`RouteState`] into a response, retrying
//! across upstreams per the selector and reporting every outcome to the
//! passive health tracker.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;

use crate::config::FailoverConfig;
use crate::error::ReliabilityError;
use crate::jitter;
use crate::model::Outcome;
use crate::passive;
use crate::plugin::PluginHooks;
use crate::registry::RouteState;
use crate::selector::Selector;
use crate::snapshot::{RequestSnapshot, UpstreamResponse};

/// Dispatches requests to a route's upstreams, retrying across upstreams on
/// retryable failure until one succeeds or the selector is exhausted. Holds
/// its own `reqwest::Client`s, distinct from the prober's, one per distinct
/// `connect_timeout` a route configures (lazily built and cached, since
/// `reqwest` only applies a connect timeout at client-construction time).
pub struct FailoverDriver {
    clients: Mutex<HashMap<Duration, reqwest::Client>>,
}

impl Default for FailoverDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FailoverDriver {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, connect_timeout: Duration) -> reqwest::Client {
        let mut clients = self.clients.lock().expect("failover driver client cache poisoned");
        clients
            .entry(connect_timeout)
            .or_insert_with(|| {
                reqwest::Client::builder()
                    .connect_timeout(connect_timeout)
                    .build()
                    .expect("failed to build dispatch http client")
            })
            .clone()
    }

    /// Run the full attempt loop for one client request against `route`.
    pub async fn dispatch(
        &self,
        route: &RouteState,
        snapshot: &RequestSnapshot,
        plugins: &[Box<dyn PluginHooks>],
    ) -> Result<UpstreamResponse, ReliabilityError> {
        let mut attempted: HashSet<String> = HashSet::new();
        let mut attempt: u32 = 0;
        let mut last_error: Option<ReliabilityError> = None;

        loop {
            if attempt > 0 {
                let delay_ms = if attempt == 1 {
                    0
                } else {
                    jitter::exp_backoff(attempt - 1, 100, 1000, 0.2)
                };
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }

            let upstream = match Selector::pick(
                &route.upstreams,
                &attempted,
                &route.failover,
                Instant::now(),
            ) {
                Ok(upstream) => upstream,
                Err(_) => {
                    // Prefer the most recent upstream error over a
                    // synthesized one when every candidate is exhausted.
                    let error = last_error.unwrap_or(ReliabilityError::NoAvailableUpstream {
                        path: route.path.clone(),
                    });
                    run_on_error(plugins, &error).await;
                    return Err(error);
                }
            };

            let mut working = snapshot.to_working_copy();
            for plugin in plugins {
                if let Err(error) = plugin.on_request_init(&mut working).await {
                    tracing::warn!(%error, "plugin onRequestInit failed, continuing");
                }
            }

            if let Some(response) = crate::plugin::run_intercept_hooks(plugins, &working).await {
                return Ok(response);
            }

            for plugin in plugins {
                if let Err(error) = plugin.on_before_request(&mut working).await {
                    tracing::warn!(%error, "plugin onBeforeRequest failed, continuing");
                }
            }

            let is_half_open = upstream.status() == crate::model::UpstreamStatus::HalfOpen;
            let timeout = if is_half_open {
                route.failover.recovery_timeout
            } else {
                route.failover.request_timeout
            };

            match self
                .dispatch_once(&upstream.target, &working, timeout, route.failover.connect_timeout)
                .await
            {
                Ok(mut response) => {
                    let outcome = passive::classify_status(response.status, &route.failover);
                    passive::report_outcome(upstream.as_ref(), outcome, &route.failover);
                    match outcome {
                        Outcome::RetryableFailure => {
                            attempted.insert(upstream.target.clone());
                            attempt += 1;
                            last_error = Some(ReliabilityError::UpstreamRetryableStatus {
                                target: upstream.target.clone(),
                                status: response.status,
                            });
                            continue;
                        }
                        _ => {
                            for plugin in plugins {
                                if let Err(error) = plugin.on_response(&mut response).await {
                                    tracing::warn!(%error, "plugin onResponse failed, continuing");
                                }
                            }
                            return Ok(response);
                        }
                    }
                }
                Err(error) => {
                    passive::report_outcome(upstream.as_ref(), Outcome::RetryableFailure, &route.failover);
                    attempted.insert(upstream.target.clone());
                    attempt += 1;
                    last_error = Some(error);
                    continue;
                }
            }
        }
    }

    async fn dispatch_once(
        &self,
        target: &str,
        snapshot: &RequestSnapshot,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<UpstreamResponse, ReliabilityError> {
        let url = build_upstream_url(target, &snapshot.url);
        let client = self.client_for(connect_timeout);
        let mut request = client
            .request(snapshot.method.clone(), url)
            .headers(snapshot.headers.clone());
        let bytes = snapshot.body.as_bytes();
        if !bytes.is_empty() {
            request = request.body(bytes);
        }

        let result = tokio::time::timeout(timeout, request.send()).await;

        match result {
            Err(_) => Err(ReliabilityError::UpstreamTimeout {
                target: target.to_string(),
            }),
            Ok(Err(transport_error)) => Err(ReliabilityError::UpstreamTransport {
                target: target.to_string(),
                message: transport_error.to_string(),
            }),
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                Ok(UpstreamResponse::new(status, headers, body))
            }
        }
    }
}

async fn run_on_error(plugins: &[Box<dyn PluginHooks>], error: &ReliabilityError) {
    for plugin in plugins {
        if let Err(hook_error) = plugin.on_error(error).await {
            tracing::warn!(error = %hook_error, "plugin onError failed, continuing");
        }
    }
}

/// Joins an upstream base URL with the original request's path and query,
/// so a proxied request lands on the right resource instead of the
/// upstream's root.
fn build_upstream_url(target: &str, path_and_query: &str) -> String {
    let target = target.trim_end_matches('/');
    if path_and_query.is_empty() {
        return target.to_string();
    }
    if path_and_query.starts_with('/') {
        format!("{target}{path_and_query}")
    } else {
        format!("{target}/{path_and_query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailoverConfig;
    use crate::model::RuntimeUpstream;
    use crate::plugin::NoopPlugin;
    use reqwest::Method;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn route_with(upstreams: Vec<Arc<RuntimeUpstream>>, failover: FailoverConfig) -> RouteState {
        RouteState {
            path: "/v1/chat".into(),
            upstreams,
            failover,
            health_check: None,
        }
    }

    fn request_snapshot() -> RequestSnapshot {
        RequestSnapshot::new(Method::GET, String::new(), HeaderMap::new(), vec![])
    }

    #[test]
    fn build_upstream_url_joins_base_and_path() {
        assert_eq!(
            build_upstream_url("http://a.internal", "/v1/chat?x=1"),
            "http://a.internal/v1/chat?x=1"
        );
        assert_eq!(
            build_upstream_url("http://a.internal/", "/v1/chat"),
            "http://a.internal/v1/chat"
        );
        assert_eq!(build_upstream_url("http://a.internal", ""), "http://a.internal");
    }

    #[tokio::test]
    async fn succeeds_on_first_healthy_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let upstream = Arc::new(RuntimeUpstream::new(server.uri(), 100, 1, false));
        let route = route_with(vec![upstream], FailoverConfig::default());
        let driver = FailoverDriver::new();
        let plugins: Vec<Box<dyn PluginHooks>> = vec![Box::new(NoopPlugin)];

        let response = driver
            .dispatch(&route, &request_snapshot(), &plugins)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn fails_over_to_second_upstream_on_retryable_status() {
        let bad = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&bad)
            .await;
        let good = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&good)
            .await;

        let upstreams = vec![
            Arc::new(RuntimeUpstream::new(bad.uri(), 100, 1, false)),
            Arc::new(RuntimeUpstream::new(good.uri(), 100, 2, false)),
        ];
        let route = route_with(upstreams, FailoverConfig::default());
        let driver = FailoverDriver::new();
        let plugins: Vec<Box<dyn PluginHooks>> = vec![];

        let response = driver
            .dispatch(&route, &request_snapshot(), &plugins)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn forwards_request_path_and_query_to_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path("/v1/models/7"))
            .and(wiremock::matchers::query_param("verbose", "true"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let upstream = Arc::new(RuntimeUpstream::new(server.uri(), 100, 1, false));
        let route = route_with(vec![upstream], FailoverConfig::default());
        let driver = FailoverDriver::new();
        let plugins: Vec<Box<dyn PluginHooks>> = vec![];
        let snapshot = RequestSnapshot::new(
            Method::GET,
            "/v1/models/7?verbose=true".to_string(),
            HeaderMap::new(),
            vec![],
        );

        let response = driver.dispatch(&route, &snapshot, &plugins).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn returns_no_available_upstream_when_all_disabled() {
        let upstream = Arc::new(RuntimeUpstream::new("http://unused".into(), 100, 1, true));
        let route = route_with(vec![upstream], FailoverConfig::default());
        let driver = FailoverDriver::new();
        let plugins: Vec<Box<dyn PluginHooks>> = vec![];

        let error = driver
            .dispatch(&route, &request_snapshot(), &plugins)
            .await
            .unwrap_err();
        assert!(matches!(error, ReliabilityError::NoAvailableUpstream { .. }));
    }
}
