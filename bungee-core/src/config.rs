//! The route/upstream/failover/health-check configuration tree. Resolved
//! (defaults applied) once per route at registry build time; the result is
//! immutable for the life of that generation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_weight() -> u32 {
    100
}

fn default_priority() -> u32 {
    1
}

/// One configured backend target for a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub disabled: bool,
}

/// Slow-start weight ramp applied to an upstream that just returned to
/// `HEALTHY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowStartConfig {
    #[serde(with = "crate::common::duration_serde")]
    pub duration: Duration,
    pub initial_weight_factor: f64,
}

impl Default for SlowStartConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
            initial_weight_factor: 0.1,
        }
    }
}

/// Per-route failover policy: thresholds, timeouts, and retryable status
/// codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    pub enabled: bool,
    pub retryable_status_codes: Vec<u16>,
    pub consecutive_failures_threshold: u32,
    pub healthy_threshold: u32,
    #[serde(with = "crate::common::duration_serde")]
    pub recovery_interval: Duration,
    #[serde(with = "crate::common::duration_serde")]
    pub recovery_timeout: Duration,
    #[serde(with = "crate::common::duration_serde")]
    pub request_timeout: Duration,
    #[serde(with = "crate::common::duration_serde")]
    pub connect_timeout: Duration,
    pub slow_start: Option<SlowStartConfig>,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retryable_status_codes: vec![502, 503, 504],
            consecutive_failures_threshold: 3,
            healthy_threshold: 2,
            recovery_interval: Duration::from_secs(5),
            recovery_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            slow_start: None,
        }
    }
}

impl FailoverConfig {
    /// Whether `status` should be treated as a retryable failure: the
    /// configured set, plus all 5xx unless the config explicitly narrows
    /// `retryable_status_codes` to exclude it.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status) || (500..600).contains(&status)
    }
}

/// Per-route active health check policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    pub path: String,
    pub method: String,
    pub expected_status: Vec<u16>,
    #[serde(with = "crate::common::duration_serde")]
    pub interval: Duration,
    #[serde(with = "crate::common::duration_serde")]
    pub timeout: Duration,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/health".to_string(),
            method: "GET".to_string(),
            expected_status: vec![200],
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(3),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// One route: a client-facing path pattern fanning out to `upstreams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub path: String,
    pub upstreams: Vec<UpstreamConfig>,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failover_defaults_are_correct() {
        let cfg = FailoverConfig::default();
        assert_eq!(cfg.consecutive_failures_threshold, 3);
        assert_eq!(cfg.healthy_threshold, 2);
        assert_eq!(cfg.recovery_interval, Duration::from_secs(5));
        assert_eq!(cfg.recovery_timeout, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn health_check_defaults_are_correct() {
        let cfg = HealthCheckConfig::default();
        assert_eq!(cfg.interval, Duration::from_secs(10));
        assert_eq!(cfg.timeout, Duration::from_secs(3));
        assert_eq!(cfg.unhealthy_threshold, 3);
        assert_eq!(cfg.healthy_threshold, 2);
    }

    #[test]
    fn slow_start_defaults_are_correct() {
        let cfg = SlowStartConfig::default();
        assert_eq!(cfg.duration, Duration::from_secs(30));
        assert_eq!(cfg.initial_weight_factor, 0.1);
    }

    #[test]
    fn is_retryable_status_covers_configured_and_5xx() {
        let cfg = FailoverConfig::default();
        assert!(cfg.is_retryable_status(502));
        assert!(cfg.is_retryable_status(599));
        assert!(!cfg.is_retryable_status(404));
    }

    #[test]
    fn deserializes_route_from_toml() {
        let toml_str = r#"
            path = "/v1/chat"
            [[upstreams]]
            target = "http://a.internal"
            [[upstreams]]
            target = "http://b.internal"
            weight = 50
            priority = 2
            [failover]
            enabled = true
            [health_check]
            enabled = true
            path = "/healthz"
        "#;
        let route: RouteConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(route.upstreams.len(), 2);
        assert_eq!(route.upstreams[0].weight, 100);
        assert_eq!(route.upstreams[1].priority, 2);
        assert!(route.failover.enabled);
        assert!(route.health_check.unwrap().enabled);
    }
}
