//! The upstream health state machine: the single place `Healthy` /
//! `Unhealthy` / `HalfOpen` transitions are computed and committed. Both the
//! passive tracker and the active prober call into this module under the
//! same per-upstream lock that guards their counter mutation, so a
//! transition and its triggering counter update are always one atomic unit.

use std::time::{Duration, Instant};

use crate::config::FailoverConfig;
use crate::model::{Outcome, UpstreamHealthState, UpstreamStatus};

/// Apply one dispatch outcome from the failover driver to `state`,
/// evaluating and committing any resulting transition.
pub fn apply_passive_outcome(
    state: &mut UpstreamHealthState,
    outcome: Outcome,
    cfg: &FailoverConfig,
    now: Instant,
) {
    match outcome {
        Outcome::Success => {
            state.consecutive_successes += 1;
            state.consecutive_failures = 0;
            if matches!(state.status, UpstreamStatus::Unhealthy | UpstreamStatus::HalfOpen)
                && state.consecutive_successes >= cfg.healthy_threshold
            {
                recover_to_healthy(state, cfg, now);
            }
        }
        Outcome::RetryableFailure => {
            state.consecutive_failures += 1;
            state.consecutive_successes = 0;
            state.last_failure_time = Some(now);
            if state.status == UpstreamStatus::Healthy
                && state.consecutive_failures >= cfg.consecutive_failures_threshold
            {
                state.status = UpstreamStatus::Unhealthy;
                state.consecutive_failures = 0;
            } else if state.status == UpstreamStatus::HalfOpen {
                state.status = UpstreamStatus::Unhealthy;
                state.consecutive_successes = 0;
            }
        }
        Outcome::NonRetryableFailure => {}
    }
}

/// Apply one active-probe result to `state`.
pub fn apply_probe_result(
    state: &mut UpstreamHealthState,
    success: bool,
    cfg: &crate::config::HealthCheckConfig,
    failover: &FailoverConfig,
    now: Instant,
) {
    if success {
        state.health_check_successes += 1;
        state.health_check_failures = 0;
        if matches!(state.status, UpstreamStatus::Unhealthy | UpstreamStatus::HalfOpen)
            && state.health_check_successes >= cfg.healthy_threshold
        {
            recover_to_healthy(state, failover, now);
            state.health_check_successes = 0;
        }
    } else {
        state.health_check_failures += 1;
        state.health_check_successes = 0;
        if state.status == UpstreamStatus::Healthy && state.health_check_failures >= cfg.unhealthy_threshold {
            state.status = UpstreamStatus::Unhealthy;
            state.last_failure_time = Some(now);
            state.health_check_failures = 0;
        } else if state.status != UpstreamStatus::Healthy {
            state.last_failure_time = Some(now);
        }
    }
}

/// Attempt the selector-driven Unhealthy -> HalfOpen transition. Returns
/// `true` if the transition was made.
pub fn try_transition_to_half_open(
    state: &mut UpstreamHealthState,
    recovery_interval: Duration,
    now: Instant,
) -> bool {
    if state.status != UpstreamStatus::Unhealthy {
        return false;
    }
    let elapsed_ok = state
        .last_failure_time
        .map(|t| now.saturating_duration_since(t) >= recovery_interval)
        .unwrap_or(true);
    if elapsed_ok {
        state.status = UpstreamStatus::HalfOpen;
        true
    } else {
        false
    }
}

fn recover_to_healthy(state: &mut UpstreamHealthState, cfg: &FailoverConfig, now: Instant) {
    state.status = UpstreamStatus::Healthy;
    state.last_failure_time = None;
    state.consecutive_failures = 0;
    state.consecutive_successes = 0;
    if cfg.slow_start.is_some() {
        state.slow_start_recovery_time = Some(now);
    }
}
