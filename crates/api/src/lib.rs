//! Thin HTTP API over the local transfer store.

pub mod state;
pub mod types;
pub mod validation;

mod routes;
mod sse;

pub use routes::health;
pub use state::ApiState;
pub use types::*;

use axum::{routing::get, Router};
use std::time::Duration;

/// Default maximum number of requests allowed per client during the rate
/// limiting period.
pub const DEFAULT_MAX_REQUESTS: u64 = 50;
/// Default duration of the rate limiting window.
pub const DEFAULT_RATE_PERIOD: Duration = Duration::from_secs(1);
/// Largest page size the events endpoint will serve.
pub const MAX_PAGE_SIZE: u64 = 1000;
/// Page size applied when the query does not specify one.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Build the versioned API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/events", get(routes::events))
        .route("/stats", get(routes::stats))
        .route("/sync", get(routes::sync_status))
        .route("/sse/transfers", get(sse::transfers))
        .with_state(state)
}
