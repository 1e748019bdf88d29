//! Gateway error taxonomy and rate-limit detection.

use alloy::transports::{RpcError, TransportError, TransportErrorKind};

/// Failure surfaced to gateway callers once queueing and retries are done.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The upstream rate limited the call and the retry budget ran out.
    #[error("upstream rate limited: {0}")]
    RateLimited(String),
    /// Any other upstream failure; never retried by the gateway.
    #[error("upstream call failed: {0}")]
    Upstream(String),
    /// The gateway shut down while the call was queued or in flight.
    #[error("rpc gateway closed")]
    Closed,
}

impl GatewayError {
    /// Whether this failure was classified as a rate-limit signal.
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Classifies upstream failures as rate-limit signals.
///
/// Exposed as a seam so deployments behind nonstandard providers can widen
/// or narrow the detection.
pub trait RateLimitDetector: Send + Sync + 'static {
    /// Whether the error is a rate-limit signal worth backing off for.
    fn is_rate_limited(&self, error: &TransportError) -> bool;
}

/// Default detection: HTTP status 429, JSON-RPC error code 429, or a
/// "Too Many Requests" fragment anywhere in the error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TooManyRequestsDetector;

impl RateLimitDetector for TooManyRequestsDetector {
    fn is_rate_limited(&self, error: &TransportError) -> bool {
        match error {
            RpcError::Transport(TransportErrorKind::HttpError(http)) => {
                http.status == 429 || http.body.contains("Too Many Requests")
            }
            RpcError::ErrorResp(payload) => {
                payload.code == 429 || payload.message.contains("Too Many Requests")
            }
            other => other.to_string().contains("Too Many Requests"),
        }
    }
}
