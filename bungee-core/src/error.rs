//! The error taxonomy surfaced by the reliability core.

use thiserror::Error;

/// Errors the failover driver, selector, and health loops can produce.
///
/// Propagation policy: `NoAvailableUpstream` is surfaced to the client after
/// retries are exhausted and is never retried further; `UpstreamTimeout`,
/// `UpstreamTransport`, and `UpstreamRetryableStatus` drive the retry loop;
/// `UpstreamNonRetryableStatus` is returned to the client as-is and never
/// moves the passive-failure counter; `PluginError` and `ProbeError` are
/// logged and swallowed locally.
#[derive(Debug, Error)]
pub enum ReliabilityError {
    #[error("no available upstream for route {path}")]
    NoAvailableUpstream { path: String },

    #[error("upstream {target} timed out")]
    UpstreamTimeout { target: String },

    #[error("upstream {target} transport error: {message}")]
    UpstreamTransport { target: String, message: String },

    #[error("upstream {target} returned retryable status {status}")]
    UpstreamRetryableStatus { target: String, status: u16 },

    /// Non-retryable status; returned to the client verbatim, does not
    /// affect upstream health.
    #[error("upstream {target} returned status {status}")]
    UpstreamNonRetryableStatus { target: String, status: u16 },

    #[error("plugin error: {message}")]
    PluginError { message: String },

    #[error("probe error for {target}: {message}")]
    ProbeError { target: String, message: String },
}

impl ReliabilityError {
    /// Whether this error should drive another failover attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReliabilityError::UpstreamTimeout { .. }
                | ReliabilityError::UpstreamTransport { .. }
                | ReliabilityError::UpstreamRetryableStatus { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_timeout_and_retryable_status_are_retryable() {
        assert!(ReliabilityError::UpstreamTimeout { target: "a".into() }.is_retryable());
        assert!(ReliabilityError::UpstreamTransport {
            target: "a".into(),
            message: "refused".into()
        }
        .is_retryable());
        assert!(ReliabilityError::UpstreamRetryableStatus {
            target: "a".into(),
            status: 503
        }
        .is_retryable());
        assert!(!ReliabilityError::UpstreamNonRetryableStatus {
            target: "a".into(),
            status: 404
        }
        .is_retryable());
        assert!(!ReliabilityError::NoAvailableUpstream { path: "/x".into() }.is_retryable());
        assert!(!ReliabilityError::PluginError { message: "x".into() }.is_retryable());
    }
}
