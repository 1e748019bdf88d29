//! The gateway pump: one task owning the queue, the in-flight counter, the
//! throttle gate and the chain-id memo. Submissions and completions arrive
//! as messages, so no locks are needed and the concurrency cap holds by
//! construction.

use std::{collections::VecDeque, sync::Arc};

use alloy::transports::TransportResult;
use rand::Rng;
use serde_json::Value;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{sleep, sleep_until, Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{GatewayError, RateLimitDetector},
    GatewayConfig, RpcTransport,
};

/// The one method memoized for the process lifetime.
const ETH_CHAIN_ID: &str = "eth_chainId";

pub(crate) type CallResult = Result<Value, GatewayError>;

pub(crate) enum Command {
    Call { method: String, params: Value, reply: oneshot::Sender<CallResult> },
}

/// A submitted call while it is pending, in flight or awaiting re-queue.
struct QueuedRequest {
    method: String,
    params: Value,
    attempts: u32,
    waiters: Vec<oneshot::Sender<CallResult>>,
}

struct Completion {
    request: QueuedRequest,
    result: TransportResult<Value>,
}

enum Internal {
    Completed(Completion),
    Requeue(QueuedRequest),
}

enum ChainIdCache {
    Empty,
    Fetching(Vec<oneshot::Sender<CallResult>>),
    Cached(Value),
}

enum Tick {
    Shutdown,
    Command(Option<Command>),
    Internal(Option<Internal>),
    GateOpen,
}

pub(crate) struct Pump {
    transport: Arc<dyn RpcTransport>,
    detector: Arc<dyn RateLimitDetector>,
    config: GatewayConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    shutdown: broadcast::Receiver<()>,
    // cancels in-flight calls and scheduled retries on shutdown
    cancel: CancellationToken,
    pending: VecDeque<QueuedRequest>,
    in_flight: usize,
    scheduled_retries: usize,
    throttle_until: Option<Instant>,
    chain_id: ChainIdCache,
}

impl Pump {
    pub(crate) fn new(
        transport: Arc<dyn RpcTransport>,
        detector: Arc<dyn RateLimitDetector>,
        config: GatewayConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            detector,
            config,
            commands,
            internal_tx,
            internal_rx,
            shutdown,
            cancel: CancellationToken::new(),
            pending: VecDeque::new(),
            in_flight: 0,
            scheduled_retries: 0,
            throttle_until: None,
            chain_id: ChainIdCache::Empty,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut commands_open = true;
        loop {
            self.dispatch_ready();
            if !commands_open && self.idle() {
                return;
            }

            let gate_deadline = self.throttle_until;
            let tick = tokio::select! {
                _ = recv_shutdown(&mut self.shutdown) => Tick::Shutdown,
                command = self.commands.recv(), if commands_open => Tick::Command(command),
                event = self.internal_rx.recv() => Tick::Internal(event),
                _ = gate_wait(gate_deadline) => Tick::GateOpen,
            };

            match tick {
                Tick::Shutdown => {
                    debug!("gateway pump shutting down");
                    // terminate in-flight calls and scheduled retries;
                    // dropping their reply channels resolves callers with
                    // `GatewayError::Closed`
                    self.cancel.cancel();
                    self.drain();
                    return;
                }
                Tick::Command(Some(command)) => self.handle_command(command),
                Tick::Command(None) => commands_open = false,
                Tick::Internal(Some(Internal::Completed(completion))) => {
                    self.handle_completion(completion);
                }
                Tick::Internal(Some(Internal::Requeue(request))) => {
                    self.scheduled_retries -= 1;
                    self.pending.push_back(request);
                }
                // the pump holds an internal sender, so the channel never closes
                Tick::Internal(None) | Tick::GateOpen => {}
            }
        }
    }

    fn idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0 && self.scheduled_retries == 0
    }

    /// Move pending requests into flight while the gate is open and the
    /// concurrency cap has room.
    fn dispatch_ready(&mut self) {
        while self.in_flight < self.config.max_concurrent && self.gate_open() {
            let Some(request) = self.pending.pop_front() else { break };
            self.in_flight += 1;
            let transport = Arc::clone(&self.transport);
            let internal = self.internal_tx.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    result = transport.send_request(request.method.clone(), request.params.clone()) => {
                        let _ = internal.send(Internal::Completed(Completion { request, result }));
                    }
                }
            });
        }
    }

    fn gate_open(&mut self) -> bool {
        match self.throttle_until {
            Some(release) if release > Instant::now() => false,
            Some(_) => {
                self.throttle_until = None;
                true
            }
            None => true,
        }
    }

    fn handle_command(&mut self, command: Command) {
        let Command::Call { method, params, reply } = command;
        if method == ETH_CHAIN_ID {
            match &mut self.chain_id {
                ChainIdCache::Cached(value) => {
                    let _ = reply.send(Ok(value.clone()));
                }
                ChainIdCache::Fetching(waiters) => waiters.push(reply),
                ChainIdCache::Empty => {
                    self.chain_id = ChainIdCache::Fetching(vec![reply]);
                    self.pending.push_back(QueuedRequest {
                        method,
                        params,
                        attempts: 0,
                        waiters: Vec::new(),
                    });
                }
            }
        } else {
            self.pending.push_back(QueuedRequest {
                method,
                params,
                attempts: 0,
                waiters: vec![reply],
            });
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        self.in_flight -= 1;
        let Completion { mut request, result } = completion;
        match result {
            Ok(value) => {
                if request.method == ETH_CHAIN_ID {
                    let state =
                        std::mem::replace(&mut self.chain_id, ChainIdCache::Cached(value.clone()));
                    if let ChainIdCache::Fetching(waiters) = state {
                        for waiter in waiters {
                            let _ = waiter.send(Ok(value.clone()));
                        }
                    }
                }
                for waiter in request.waiters.drain(..) {
                    let _ = waiter.send(Ok(value.clone()));
                }
            }
            Err(error) if self.detector.is_rate_limited(&error) => {
                request.attempts += 1;
                let delay = self.retry_delay(request.attempts);
                // gate the whole queue; in-flight calls complete naturally
                self.throttle_until = Some(Instant::now() + delay);
                if request.attempts <= self.config.max_retries {
                    debug!(
                        method = %request.method,
                        attempt = request.attempts,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, re-queueing request"
                    );
                    self.scheduled_retries += 1;
                    let internal = self.internal_tx.clone();
                    let cancel = self.cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = sleep(delay) => {
                                let _ = internal.send(Internal::Requeue(request));
                            }
                        }
                    });
                } else {
                    warn!(
                        method = %request.method,
                        attempts = request.attempts,
                        "rate limit retry budget exhausted"
                    );
                    self.fail(request, GatewayError::RateLimited(error.to_string()));
                }
            }
            Err(error) => {
                self.fail(request, GatewayError::Upstream(error.to_string()));
            }
        }
    }

    fn fail(&mut self, mut request: QueuedRequest, error: GatewayError) {
        if request.method == ETH_CHAIN_ID {
            if let ChainIdCache::Fetching(waiters) =
                std::mem::replace(&mut self.chain_id, ChainIdCache::Empty)
            {
                for waiter in waiters {
                    let _ = waiter.send(Err(error.clone()));
                }
            }
        }
        for waiter in request.waiters.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    fn drain(&mut self) {
        let pending: Vec<_> = self.pending.drain(..).collect();
        for request in pending {
            self.fail(request, GatewayError::Closed);
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let exponential = self.config.base_delay.saturating_mul(1u32 << attempt.min(16));
        let jitter_ms = self.config.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        (exponential + jitter).min(self.config.max_delay)
    }
}

async fn recv_shutdown(shutdown: &mut broadcast::Receiver<()>) {
    loop {
        match shutdown.recv().await {
            Ok(()) => return,
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            // no shutdown will ever arrive; defer to queue lifecycle
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

async fn gate_wait(deadline: Option<Instant>) {
    match deadline {
        Some(release) => sleep_until(release).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use alloy::transports::{RpcError, TransportResult};
    use alloy_json_rpc::ErrorPayload;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::broadcast;

    use super::*;
    use crate::{GatewayConfig, RpcGateway, RpcTransport, TooManyRequestsDetector};

    fn rate_limit_error() -> alloy::transports::TransportError {
        RpcError::ErrorResp(ErrorPayload {
            code: 429,
            message: "Too Many Requests".into(),
            data: None,
        })
    }

    fn server_error() -> alloy::transports::TransportError {
        RpcError::ErrorResp(ErrorPayload {
            code: -32000,
            message: "internal server error".into(),
            data: None,
        })
    }

    type Handler = Box<dyn Fn(&str, &Value, usize) -> TransportResult<Value> + Send + Sync>;

    struct ScriptedUpstream {
        calls: Mutex<Vec<(String, Value)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
        handler: Handler,
    }

    impl ScriptedUpstream {
        fn new(delay: Duration, handler: Handler) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay,
                handler,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedUpstream {
        async fn send_request(&self, method: String, params: Value) -> TransportResult<Value> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((method.clone(), params.clone()));
                calls.len() - 1
            };
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (self.handler)(&method, &params, index)
        }
    }

    fn fast_config() -> GatewayConfig {
        GatewayConfig {
            base_delay: Duration::from_millis(1),
            jitter: Duration::ZERO,
            ..GatewayConfig::default()
        }
    }

    fn spawn_gateway(upstream: Arc<ScriptedUpstream>, config: GatewayConfig) -> RpcGateway {
        let (_tx, shutdown) = broadcast::channel(1);
        // the sender is dropped on purpose; the pump treats a closed
        // shutdown channel as "no signal will come"
        RpcGateway::new(upstream, Arc::new(TooManyRequestsDetector), config, shutdown)
    }

    #[tokio::test]
    async fn masks_rate_limits_within_the_retry_budget() {
        let upstream = ScriptedUpstream::new(
            Duration::ZERO,
            Box::new(|_, _, index| {
                if index < 2 {
                    Err(rate_limit_error())
                } else {
                    Ok(json!("0x1"))
                }
            }),
        );
        let gateway = spawn_gateway(Arc::clone(&upstream), fast_config());

        let value = gateway.call("eth_getLogs", json!([])).await.unwrap();
        assert_eq!(value, json!("0x1"));
        assert_eq!(upstream.call_count(), 3);
    }

    #[tokio::test]
    async fn surfaces_rate_limit_once_retries_are_exhausted() {
        let upstream =
            ScriptedUpstream::new(Duration::ZERO, Box::new(|_, _, _| Err(rate_limit_error())));
        let config = GatewayConfig { max_retries: 2, ..fast_config() };
        let gateway = spawn_gateway(Arc::clone(&upstream), config);

        let error = gateway.call("eth_getLogs", json!([])).await.unwrap_err();
        assert!(error.is_rate_limit());
        assert_eq!(upstream.call_count(), 3);
    }

    #[tokio::test]
    async fn non_rate_limit_errors_propagate_immediately() {
        let upstream =
            ScriptedUpstream::new(Duration::ZERO, Box::new(|_, _, _| Err(server_error())));
        let gateway = spawn_gateway(Arc::clone(&upstream), fast_config());

        let error = gateway.call("eth_getLogs", json!([])).await.unwrap_err();
        assert!(matches!(error, GatewayError::Upstream(_)));
        assert_eq!(upstream.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_in_flight_calls() {
        let upstream = ScriptedUpstream::new(
            Duration::from_secs(3600),
            Box::new(|_, _, _| Ok(json!("0x1"))),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let gateway = RpcGateway::new(
            Arc::<ScriptedUpstream>::clone(&upstream),
            Arc::new(TooManyRequestsDetector),
            fast_config(),
            shutdown_rx,
        );

        let call = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.call("eth_getLogs", json!([])).await })
        };
        // let the call reach the upstream before signalling
        sleep(Duration::from_millis(10)).await;
        assert_eq!(upstream.call_count(), 1);

        shutdown_tx.send(()).unwrap();
        let error = call.await.unwrap().unwrap_err();
        // the in-flight call is cancelled instead of running for its full
        // upstream duration
        assert!(matches!(error, GatewayError::Closed));
    }

    #[tokio::test]
    async fn caps_concurrent_upstream_calls() {
        let upstream = ScriptedUpstream::new(
            Duration::from_millis(20),
            Box::new(|_, _, _| Ok(json!("0x0"))),
        );
        let gateway = spawn_gateway(Arc::clone(&upstream), fast_config());

        let calls = (0..25)
            .map(|_| {
                let gateway = gateway.clone();
                tokio::spawn(async move { gateway.call("eth_blockNumber", json!([])).await })
            })
            .collect::<Vec<_>>();
        for call in calls {
            call.await.unwrap().unwrap();
        }

        assert_eq!(upstream.call_count(), 25);
        assert!(upstream.max_in_flight.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn chain_id_hits_upstream_exactly_once() {
        let upstream = ScriptedUpstream::new(
            Duration::from_millis(10),
            Box::new(|_, _, _| Ok(json!("0x89"))),
        );
        let gateway = spawn_gateway(Arc::clone(&upstream), fast_config());

        let concurrent = (0..8)
            .map(|_| {
                let gateway = gateway.clone();
                tokio::spawn(async move { gateway.call("eth_chainId", json!([])).await })
            })
            .collect::<Vec<_>>();
        for call in concurrent {
            assert_eq!(call.await.unwrap().unwrap(), json!("0x89"));
        }

        // a later caller is served from the memo as well
        assert_eq!(gateway.call("eth_chainId", json!([])).await.unwrap(), json!("0x89"));
        assert_eq!(upstream.call_count(), 1);
    }

    #[tokio::test]
    async fn requests_resolve_in_submission_order_when_serialized() {
        let upstream =
            ScriptedUpstream::new(Duration::ZERO, Box::new(|_, params, _| Ok(params.clone())));
        let config = GatewayConfig { max_concurrent: 1, ..fast_config() };
        let gateway = spawn_gateway(Arc::clone(&upstream), config);

        for index in 0..4u64 {
            let value = gateway.call("eth_getBalance", json!([index])).await.unwrap();
            assert_eq!(value, json!([index]));
        }
        let calls = upstream.calls.lock().unwrap();
        let order: Vec<Value> = calls.iter().map(|(_, params)| params.clone()).collect();
        assert_eq!(order, vec![json!([0]), json!([1]), json!([2]), json!([3])]);
    }
}
