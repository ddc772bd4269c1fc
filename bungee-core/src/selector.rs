//! Priority-bucketed, slow-start-aware weighted selection: pick the lowest
//! priority bucket with an eligible candidate, then draw among that
//! bucket's healthy (or, failing that, half-open, or a just-admitted
//! recovery) members weighted by configured weight and slow-start factor.
//!
//! Exposed as a pure function of `(upstreams, excluded, now)` so it never
//! needs to hold a registry-wide lock across randomness generation; each
//! upstream's own lock is taken only long enough to read its state or to
//! commit a half-open admission.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;

use crate::config::FailoverConfig;
use crate::model::{RuntimeUpstream, UpstreamStatus};
use crate::state_machine;

/// No eligible candidate remained after exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoAvailableUpstream;

pub struct Selector;

impl Selector {
    /// Pick one upstream from `upstreams`, excluding any target in
    /// `excluded`. Admits a half-open recovery candidate when the top
    /// priority bucket has no healthy member.
    pub fn pick(
        upstreams: &[Arc<RuntimeUpstream>],
        excluded: &HashSet<String>,
        failover: &FailoverConfig,
        now: Instant,
    ) -> Result<Arc<RuntimeUpstream>, NoAvailableUpstream> {
        let candidates: Vec<&Arc<RuntimeUpstream>> = upstreams
            .iter()
            .filter(|u| !u.disabled && !excluded.contains(&u.target))
            .collect();
        if candidates.is_empty() {
            return Err(NoAvailableUpstream);
        }

        let mut priorities: Vec<u32> = candidates.iter().map(|u| u.priority).collect();
        priorities.sort_unstable();
        priorities.dedup();

        for priority in priorities {
            let bucket: Vec<&Arc<RuntimeUpstream>> = candidates
                .iter()
                .filter(|u| u.priority == priority)
                .copied()
                .collect();

            let healthy: Vec<&Arc<RuntimeUpstream>> = bucket
                .iter()
                .filter(|u| u.status() == UpstreamStatus::Healthy)
                .copied()
                .collect();
            if !healthy.is_empty() {
                return Ok(Self::weighted_pick(&healthy, failover, now).clone());
            }

            let half_open: Vec<&Arc<RuntimeUpstream>> = bucket
                .iter()
                .filter(|u| u.status() == UpstreamStatus::HalfOpen)
                .copied()
                .collect();
            if !half_open.is_empty() {
                return Ok(Self::weighted_pick(&half_open, failover, now).clone());
            }

            // No HEALTHY or HALF_OPEN candidate in this bucket: try to admit
            // one UNHEALTHY candidate past its recovery interval.
            for upstream in &bucket {
                let mut state = upstream.state.lock().expect("upstream lock poisoned");
                if state_machine::try_transition_to_half_open(
                    &mut state,
                    failover.recovery_interval,
                    now,
                ) {
                    drop(state);
                    return Ok((*upstream).clone());
                }
            }
        }

        Err(NoAvailableUpstream)
    }

    fn weighted_pick<'a>(
        candidates: &'a [&'a Arc<RuntimeUpstream>],
        failover: &FailoverConfig,
        now: Instant,
    ) -> &'a Arc<RuntimeUpstream> {
        let slow_start = failover.slow_start.as_ref();
        let effective_weights: Vec<f64> = candidates
            .iter()
            .map(|u| {
                let state = u.state.lock().expect("upstream lock poisoned");
                let factor = match slow_start {
                    Some(cfg) => state.slow_start_factor(now, cfg.duration, cfg.initial_weight_factor),
                    None => 1.0,
                };
                u.weight as f64 * factor
            })
            .collect();

        let total: f64 = effective_weights.iter().sum();
        if total <= 0.0 {
            let idx = rand::thread_rng().gen_range(0..candidates.len());
            return candidates[idx];
        }

        let draw = rand::thread_rng().gen_range(0.0..total);
        let mut cumulative = 0.0;
        for (idx, weight) in effective_weights.iter().enumerate() {
            cumulative += weight;
            if draw < cumulative {
                return candidates[idx];
            }
        }
        candidates[candidates.len() - 1]
    }
}
