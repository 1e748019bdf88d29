//! Transferscope RPC gateway: the single choke point for upstream calls.
//!
//! Every JSON-RPC request goes through one pump task that enforces the
//! concurrency cap, the process-wide throttle gate and the per-request
//! retry budget. Callers hold a cheap cloneable [`RpcGateway`] handle and
//! are indifferent to queueing and retries.

pub mod erc20;
mod error;
mod eth;
mod pump;
mod subscription;
mod ws;

pub use error::{GatewayError, RateLimitDetector, TooManyRequestsDetector};
pub use subscription::{transfer_log_stream, TransferLogStream};
pub use ws::RetryWsConnect;

use std::{sync::Arc, time::Duration};

use alloy::{providers::RootProvider, transports::TransportResult};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use async_trait::async_trait;
use eyre::{Context, Result};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use url::Url;

use pump::{Command, Pump};

/// Provider handle used for the live pubsub subscription.
pub type DefaultProvider = RootProvider;

/// Upstream transport seam. Production uses alloy's [`RpcClient`]; tests
/// substitute a scripted upstream.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Perform a single JSON-RPC request against the upstream.
    async fn send_request(&self, method: String, params: Value) -> TransportResult<Value>;
}

#[async_trait]
impl RpcTransport for RpcClient {
    async fn send_request(&self, method: String, params: Value) -> TransportResult<Value> {
        self.request(method, params).await
    }
}

/// Tuning for the gateway's queueing and retry behavior.
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    /// Calls allowed in flight against the upstream at any instant
    pub max_concurrent: usize,
    /// Retry budget per request, spent on rate-limit signals only
    pub max_retries: u32,
    /// Base of the exponential retry delay
    pub base_delay: Duration,
    /// Hard cap on a single retry delay
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each retry delay
    pub jitter: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(1000),
        }
    }
}

/// Cloneable handle submitting calls to the gateway pump task.
#[derive(Clone, Debug)]
pub struct RpcGateway {
    commands: mpsc::UnboundedSender<Command>,
}

impl RpcGateway {
    /// Spawn the pump task over the given transport.
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        detector: Arc<dyn RateLimitDetector>,
        config: GatewayConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Pump::new(transport, detector, config, receiver, shutdown).run());
        Self { commands }
    }

    /// Submit one JSON-RPC call and wait for its terminal resolution.
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: Value,
    ) -> Result<Value, GatewayError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Call { method: method.into(), params, reply })
            .map_err(|_| GatewayError::Closed)?;
        response.await.map_err(|_| GatewayError::Closed)?
    }
}

/// Connect to the upstream over websocket, returning the call gateway and
/// the pubsub provider used for live subscriptions.
pub async fn connect(
    url: Url,
    config: GatewayConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<(RpcGateway, DefaultProvider)> {
    let ws = RetryWsConnect::from_url(url);
    let client = ClientBuilder::default().pubsub(ws).await.wrap_err(
        "failed to connect to the RPC endpoint; RPC_URL must be a websocket endpoint (ws:// or wss://)",
    )?;
    let provider = RootProvider::new(client.clone());
    let gateway =
        RpcGateway::new(Arc::new(client), Arc::new(TooManyRequestsDetector), config, shutdown);
    Ok((gateway, provider))
}
