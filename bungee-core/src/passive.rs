//! The passive health tracker: feeds failover-driver dispatch outcomes into
//! the state machine under the upstream's own lock.

use std::time::Instant;

use crate::config::FailoverConfig;
use crate::model::{Outcome, RuntimeUpstream};
use crate::state_machine;

/// Record one dispatch outcome against `upstream`, evaluating any resulting
/// transition in the same critical section as the counter update.
pub fn report_outcome(upstream: &RuntimeUpstream, outcome: Outcome, cfg: &FailoverConfig) {
    let now = Instant::now();
    let mut state = upstream.state.lock().expect("upstream lock poisoned");
    state_machine::apply_passive_outcome(&mut state, outcome, cfg, now);
    tracing::debug!(
        target = %upstream.target,
        ?outcome,
        status = ?state.status,
        consecutive_failures = state.consecutive_failures,
        consecutive_successes = state.consecutive_successes,
        "passive outcome recorded"
    );
}

/// Classify an HTTP status into an [`Outcome`]: a configured or 5xx status
/// is retryable, everything else counts as success for health-tracking
/// purposes.
pub fn classify_status(status: u16, cfg: &FailoverConfig) -> Outcome {
    if cfg.is_retryable_status(status) {
        Outcome::RetryableFailure
    } else {
        Outcome::Success
    }
}
