//! Shared state for API handlers.

use std::time::Duration;

use primitives::TransferEvent;
use storage::TransferStore;
use tokio::sync::broadcast;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub(crate) store: TransferStore,
    pub(crate) live: broadcast::Sender<TransferEvent>,
    max_requests: u64,
    rate_period: Duration,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState").finish_non_exhaustive()
    }
}

impl ApiState {
    /// Create a new [`ApiState`].
    pub const fn new(
        store: TransferStore,
        live: broadcast::Sender<TransferEvent>,
        max_requests: u64,
        rate_period: Duration,
    ) -> Self {
        Self { store, live, max_requests, rate_period }
    }

    /// Maximum requests allowed per client per [`Self::rate_period`].
    pub const fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Time window for rate limiting.
    pub const fn rate_period(&self) -> Duration {
        self.rate_period
    }
}
