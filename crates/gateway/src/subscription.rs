//! Live Transfer log subscription with automatic resubscribe.

use std::pin::Pin;

use alloy::{
    providers::Provider,
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use alloy_primitives::Address;
use tokio::{
    sync::mpsc,
    time::{sleep, Duration},
};
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};
use tracing::{error, info, warn};

use crate::{erc20::Transfer, DefaultProvider};

/// Stream of raw Transfer logs from the live subscription.
pub type TransferLogStream = Pin<Box<dyn Stream<Item = Log> + Send>>;

/// Subscribe to the contract's Transfer topic. The returned stream
/// resubscribes after disconnects and only ends once the receiver side is
/// dropped.
pub fn transfer_log_stream(provider: DefaultProvider, contract: Address) -> TransferLogStream {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            info!(contract = %contract, "subscribing to Transfer logs");
            let filter =
                Filter::new().address(contract).event_signature(Transfer::SIGNATURE_HASH);
            let mut log_stream = match provider.subscribe_logs(&filter).await {
                Ok(subscription) => subscription.into_stream(),
                Err(e) => {
                    error!(error = %e, "failed to subscribe to Transfer logs, retrying in 5s");
                    sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };
            info!("subscribed to Transfer logs");

            while let Some(log) = log_stream.next().await {
                if tx.send(log).is_err() {
                    error!("Transfer log receiver dropped, stopping subscription task");
                    return;
                }
            }
            warn!("Transfer log stream ended, resubscribing");
        }
    });

    Box::pin(UnboundedReceiverStream::new(rx))
}
