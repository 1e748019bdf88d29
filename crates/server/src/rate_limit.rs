#![allow(clippy::redundant_pub_crate)]
//! Per-client request throttling keyed on the peer IP.

use std::{
    future::Future,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use api::ErrorResponse;
use axum::{
    extract::ConnectInfo,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use primitives::RateLimiter;
use tower::{Layer, Service};

/// Fixed-window throttle with one window per client IP.
#[derive(Clone, Debug)]
pub(super) struct RateLimitLayer {
    limiter: RateLimiter<IpAddr>,
    period: Duration,
}

impl RateLimitLayer {
    pub(super) fn new(max_requests: u64, period: Duration) -> Self {
        Self { limiter: RateLimiter::new(max_requests, period), period }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimit<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimit { inner, limiter: self.limiter.clone(), period: self.period }
    }
}

#[derive(Clone, Debug)]
pub(super) struct RateLimit<S> {
    inner: S,
    limiter: RateLimiter<IpAddr>,
    period: Duration,
}

impl<S, ReqBody> Service<Request<ReqBody>> for RateLimit<S>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip());

        if self.limiter.try_acquire(ip) {
            Box::pin(self.inner.call(req))
        } else {
            let period = self.period;
            let error_body = ErrorResponse::new(
                "rate-limit",
                "Too Many Requests",
                StatusCode::TOO_MANY_REQUESTS,
                format!("Rate limit exceeded. Retry after {} seconds", period.as_secs()),
            );
            let mut resp = axum::Json(error_body).into_response();
            *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;
            if let Ok(value) = HeaderValue::from_str(&period.as_secs().to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, value);
            }
            Box::pin(std::future::ready(Ok(resp)))
        }
    }
}
