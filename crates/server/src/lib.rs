//! Helper utilities to launch the Transferscope API server.

mod rate_limit;

use std::net::SocketAddr;

use api::ApiState;
use axum::{http::Method, routing::get, Router};
use eyre::Result;
use rate_limit::RateLimitLayer;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// Version prefix for all API routes.
pub const API_VERSION: &str = "v1";

/// Build the API router with CORS, tracing and per-client rate limiting.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods([Method::GET]).allow_headers(Any);
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let throttle = RateLimitLayer::new(state.max_requests(), state.rate_period());
    let api_service = tower::ServiceBuilder::new().layer(throttle).service(api::router(state));

    Router::new()
        .route("/health", get(api::health))
        .nest_service(&format!("/{API_VERSION}"), api_service)
        .layer(cors)
        .layer(trace)
}

/// Run the API server until the shutdown signal fires.
pub async fn run(
    addr: SocketAddr,
    state: ApiState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = router(state);

    info!("starting API server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::{DEFAULT_MAX_REQUESTS, DEFAULT_RATE_PERIOD};
    use axum::{
        body::{self, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use storage::TransferStore;
    use tokio::sync::broadcast as live_channel;
    use tower::util::ServiceExt;

    fn app() -> Router {
        let store = TransferStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        let (live, _) = live_channel::channel(16);
        router(ApiState::new(store, live, DEFAULT_MAX_REQUESTS, DEFAULT_RATE_PERIOD))
    }

    #[tokio::test]
    async fn health_answers_outside_the_versioned_tree() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn versioned_routes_are_nested() {
        let response = app()
            .oneshot(Request::builder().uri(format!("/{API_VERSION}/stats")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["total_events"], 0);
        assert_eq!(json["total_value_transferred"], "0");
    }
}
