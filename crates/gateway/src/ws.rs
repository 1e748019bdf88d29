//! WebSocket connection with reconnect backoff.

use alloy::{
    providers::WsConnect,
    pubsub::{ConnectionHandle, PubSubConnect},
    transports::TransportResult,
};
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::warn;
use url::Url;

/// Initial backoff for websocket reconnect attempts, in milliseconds.
const INITIAL_RECONNECT_BACKOFF_MS: u64 = 100;

/// Reconnect attempts before the connection error surfaces to subscribers.
const MAX_RECONNECT_ATTEMPTS: usize = 10;

/// A [`WsConnect`] wrapper that retries dropped connections with
/// exponential backoff before giving up.
#[derive(Debug, Clone)]
pub struct RetryWsConnect(WsConnect);

impl RetryWsConnect {
    /// Wrap the given websocket endpoint.
    pub fn from_url(url: Url) -> Self {
        Self(WsConnect::new(url))
    }
}

impl PubSubConnect for RetryWsConnect {
    fn is_local(&self) -> bool {
        self.0.is_local()
    }

    async fn connect(&self) -> TransportResult<ConnectionHandle> {
        self.0.connect().await
    }

    fn try_reconnect(
        &self,
    ) -> alloy::transports::impl_future!(<Output = TransportResult<ConnectionHandle>>) {
        warn!(url = ?self.0.url(), "retrying connection to websocket provider");
        let strategy = ExponentialBackoff::from_millis(INITIAL_RECONNECT_BACKOFF_MS)
            .take(MAX_RECONNECT_ATTEMPTS);
        Retry::spawn(strategy, || self.0.try_reconnect())
    }
}
