//! Server-Sent Events bridge of the live transfer feed.

use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::state::ApiState;

/// `GET /sse/transfers`: push each indexed live transfer to the client.
pub(crate) async fn transfers(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut live = state.live.subscribe();

    let stream = stream! {
        loop {
            match live.recv().await {
                Ok(event) => match Event::default().json_data(&event) {
                    Ok(sse_event) => yield Ok(sse_event),
                    Err(e) => tracing::error!(err = %e, "failed to serialize live event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    // best-effort push: a slow client misses events instead
                    // of backpressuring the tailer
                    tracing::warn!(skipped, "SSE subscriber lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    let keep_alive = KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive");
    Sse::new(stream).keep_alive(keep_alive)
}
