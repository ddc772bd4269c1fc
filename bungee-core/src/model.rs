//! The upstream health data model: [`UpstreamStatus`], [`RuntimeUpstream`],
//! and the mutable [`UpstreamHealthState`] guarded by a single per-upstream
//! lock so that counter updates and state transitions commit atomically.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Lifecycle state of an upstream. Only `Healthy` and `HalfOpen` are
/// selectable by [`crate::selector::Selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpstreamStatus {
    Healthy,
    Unhealthy,
    HalfOpen,
}

/// Outcome of one dispatch attempt, as classified by the failover driver
/// and fed to [`crate::passive::report_outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    RetryableFailure,
    NonRetryableFailure,
}

/// The mutable fields of one upstream: status, timestamps, and the four
/// counters. Always updated as one unit under [`RuntimeUpstream::state`]'s
/// lock — never across an `.await`.
#[derive(Debug, Clone)]
pub struct UpstreamHealthState {
    pub status: UpstreamStatus,
    pub last_failure_time: Option<Instant>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub health_check_successes: u32,
    pub health_check_failures: u32,
    pub slow_start_recovery_time: Option<Instant>,
}

impl Default for UpstreamHealthState {
    fn default() -> Self {
        Self {
            status: UpstreamStatus::Healthy,
            last_failure_time: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            health_check_successes: 0,
            health_check_failures: 0,
            slow_start_recovery_time: None,
        }
    }
}

impl UpstreamHealthState {
    /// Slow-start weight multiplier at `now`. `1.0` outside of slow start
    /// (disabled, unset, or expired).
    pub fn slow_start_factor(
        &self,
        now: Instant,
        duration: Duration,
        initial_weight_factor: f64,
    ) -> f64 {
        let Some(recovery_time) = self.slow_start_recovery_time else {
            return 1.0;
        };
        if self.status != UpstreamStatus::Healthy {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(recovery_time);
        if elapsed >= duration || duration.is_zero() {
            return 1.0;
        }
        let progress = elapsed.as_secs_f64() / duration.as_secs_f64();
        initial_weight_factor + (1.0 - initial_weight_factor) * progress
    }

    /// `slowStartProgress` stat, clamped to `[0, 100]`.
    pub fn slow_start_progress(&self, now: Instant, duration: Duration) -> f64 {
        let Some(recovery_time) = self.slow_start_recovery_time else {
            return 100.0;
        };
        if duration.is_zero() {
            return 100.0;
        }
        let elapsed = now.saturating_duration_since(recovery_time);
        (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0) * 100.0
    }
}

/// One configured upstream for one route, plus its mutable health state.
///
/// The immutable fields (`target`, `weight`, `priority`, `disabled`) are set
/// once when the registry is built from configuration and never change for
/// the lifetime of a generation. `state` is the single owned lock over
/// everything that does change.
#[derive(Debug)]
pub struct RuntimeUpstream {
    pub target: String,
    pub weight: u32,
    pub priority: u32,
    pub disabled: bool,
    pub state: Mutex<UpstreamHealthState>,
}

impl RuntimeUpstream {
    pub fn new(target: String, weight: u32, priority: u32, disabled: bool) -> Self {
        Self {
            target,
            weight,
            priority,
            disabled,
            state: Mutex::new(UpstreamHealthState::default()),
        }
    }

    pub fn status(&self) -> UpstreamStatus {
        self.state.lock().expect("upstream lock poisoned").status
    }
}
