//! The active health prober: one periodic task per route with active
//! probing enabled, fanning out one HTTP probe per upstream on each tick and
//! feeding the result into the state machine.
//!
//! Each route gets its own `reqwest::Client` (fixed `Bungee-HealthCheck/1.0`
//! User-Agent, connect timeout from that route's failover config), distinct
//! from the client the failover driver uses for live traffic, so probe
//! connection pooling and timeouts never interact with live dispatch's.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::jitter;
use crate::registry::RouteState;
use crate::state_machine;

const PROBE_USER_AGENT: &str = "Bungee-HealthCheck/1.0";

struct RunningProbe {
    cancel: oneshot::Sender<()>,
}

/// Per-route active health check scheduler. `Start`/`Stop` are idempotent;
/// `stop_all` tears down every running probe, used on shutdown and before
/// rebuilding the registry.
pub struct Prober {
    running: Mutex<HashMap<String, RunningProbe>>,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Start probing `route` if its `health_check` is enabled and it is not
    /// already being probed. No-op otherwise. Builds a client scoped to this
    /// route's configured connect timeout.
    pub fn start(&self, route: Arc<RouteState>) {
        let Some(health_check) = route.health_check.clone() else {
            return;
        };
        if !health_check.enabled {
            return;
        }

        let mut running = self.running.lock().expect("prober lock poisoned");
        if running.contains_key(&route.path) {
            return;
        }

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let client = reqwest::Client::builder()
            .user_agent(PROBE_USER_AGENT)
            .connect_timeout(route.failover.connect_timeout)
            .build()
            .expect("failed to build probe http client");
        let path = route.path.clone();

        tokio::spawn(async move {
            let boot_delay = jitter::jitter(100, 0.5);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(boot_delay)) => {}
                _ = &mut cancel_rx => return,
            }

            loop {
                probe_route_once(&client, &route, &health_check).await;

                let tick_jitter =
                    jitter::full_jitter((health_check.interval.as_millis() as u64) / 10);
                let next_tick = health_check.interval + Duration::from_millis(tick_jitter);

                tokio::select! {
                    _ = tokio::time::sleep(next_tick) => {}
                    _ = &mut cancel_rx => break,
                }
            }
            tracing::debug!(route = %path, "prober stopped");
        });

        running.insert(route.path.clone(), RunningProbe { cancel: cancel_tx });
    }

    /// Stop probing `path`. No-op if not running.
    pub fn stop(&self, path: &str) {
        let mut running = self.running.lock().expect("prober lock poisoned");
        if let Some(probe) = running.remove(path) {
            let _ = probe.cancel.send(());
        }
    }

    /// Stop every running probe. Idempotent.
    pub fn stop_all(&self) {
        let mut running = self.running.lock().expect("prober lock poisoned");
        for (_, probe) in running.drain() {
            let _ = probe.cancel.send(());
        }
    }
}

async fn probe_route_once(
    client: &reqwest::Client,
    route: &RouteState,
    health_check: &crate::config::HealthCheckConfig,
) {
    let futures = route.upstreams.iter().map(|upstream| {
        probe_one(client, upstream.as_ref(), health_check, &route.failover)
    });
    futures::future::join_all(futures).await;
}

async fn probe_one(
    client: &reqwest::Client,
    upstream: &crate::model::RuntimeUpstream,
    health_check: &crate::config::HealthCheckConfig,
    failover: &crate::config::FailoverConfig,
) {
    if upstream.disabled {
        return;
    }
    let url = format!("{}{}", upstream.target, health_check.path);
    let method = reqwest::Method::from_bytes(health_check.method.as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let result = tokio::time::timeout(
        health_check.timeout,
        client.request(method, &url).send(),
    )
    .await;

    let success = match result {
        Ok(Ok(response)) => health_check
            .expected_status
            .contains(&response.status().as_u16()),
        _ => false,
    };

    let now = std::time::Instant::now();
    let mut state = upstream.state.lock().expect("upstream lock poisoned");
    state_machine::apply_probe_result(&mut state, success, health_check, failover, now);
    tracing::debug!(
        target = %upstream.target,
        success,
        status = ?state.status,
        health_check_failures = state.health_check_failures,
        "probe completed"
    );
}
