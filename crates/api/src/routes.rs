//! Query endpoints over the transfer store.

use axum::{
    extract::{Query, State},
    Json,
};
use storage::{TransferStore, BATCH_SYNC_CURSOR, REALTIME_SYNC_CURSOR};
use tracing::error;

use crate::{
    state::ApiState,
    types::{ErrorResponse, EventsResponse, HealthResponse, StatsResponse, SyncResponse},
    validation::{validate_events_params, EventsParams},
};

/// `GET /health`: liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_owned() })
}

/// `GET /events`: filtered, paginated transfer history.
pub(crate) async fn events(
    State(state): State<ApiState>,
    Query(params): Query<EventsParams>,
) -> Result<Json<EventsResponse>, ErrorResponse> {
    let query = validate_events_params(&params)?;
    let page = blocking_query(state.store.clone(), move |store| store.events(&query)).await?;
    Ok(Json(EventsResponse { events: page.events, total_count: page.total_count }))
}

/// `GET /stats`: totals over the whole indexed corpus.
pub(crate) async fn stats(
    State(state): State<ApiState>,
) -> Result<Json<StatsResponse>, ErrorResponse> {
    let stats = blocking_query(state.store.clone(), |store| store.stats()).await?;
    Ok(Json(StatsResponse {
        total_events: stats.total_events,
        total_value_transferred: stats.total_value_transferred,
    }))
}

/// `GET /sync`: both ingestion cursors, reported separately.
pub(crate) async fn sync_status(
    State(state): State<ApiState>,
) -> Result<Json<SyncResponse>, ErrorResponse> {
    let (batch, realtime) = blocking_query(state.store.clone(), |store| {
        Ok((store.cursor(BATCH_SYNC_CURSOR)?, store.cursor(REALTIME_SYNC_CURSOR)?))
    })
    .await?;
    Ok(Json(SyncResponse { batch_synced_block: batch, realtime_synced_block: realtime }))
}

/// Run a store read off the async worker threads.
async fn blocking_query<T, F>(store: TransferStore, query: F) -> Result<T, ErrorResponse>
where
    T: Send + 'static,
    F: FnOnce(TransferStore) -> eyre::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || query(store))
        .await
        .map_err(|e| ErrorResponse::internal(e.to_string()))?
        .map_err(|e| {
            error!(err = %e, "store query failed");
            ErrorResponse::internal("store query failed")
        })
}
