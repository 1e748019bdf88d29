//! JSON response types for the API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use primitives::TransferEvent;
use serde::Serialize;

/// Response of `GET /events`.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    /// Matching events, newest block first
    pub events: Vec<TransferEvent>,
    /// Number of matches before pagination
    pub total_count: u64,
}

/// Response of `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Number of indexed transfers
    pub total_events: u64,
    /// Exact decimal sum of every indexed `value`
    pub total_value_transferred: String,
}

/// Response of `GET /sync`.
///
/// The two cursors are independent and never merged: the batch cursor
/// witnesses contiguous history while the realtime cursor only records the
/// newest live block seen. "How far am I caught up" for contiguous history
/// is the batch cursor alone.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    /// Highest block whose whole history below it has been ingested
    pub batch_synced_block: Option<u64>,
    /// Highest block seen on the live subscription
    pub realtime_synced_block: Option<u64>,
}

/// Health probe body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests
    pub status: String,
}

/// Problem-details style error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable machine-readable error tag
    pub r#type: String,
    /// Short human-readable summary
    pub title: String,
    /// HTTP status code
    pub status: u16,
    /// Human-readable detail
    pub detail: String,
}

impl ErrorResponse {
    /// Build an error body for the given status.
    pub fn new(r#type: &str, title: &str, status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            r#type: r#type.to_owned(),
            title: title.to_owned(),
            status: status.as_u16(),
            detail: detail.into(),
        }
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new("invalid-params", "Bad Request", StatusCode::BAD_REQUEST, detail)
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::new("internal", "Internal Server Error", StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
