//! Live Transfer ingestion: from the subscription to the durable store to
//! the push sink.

use std::sync::Arc;

use alloy::rpc::types::Log;
use eyre::{eyre, Result};
use gateway::{RpcGateway, TransferLogStream};
use primitives::TransferEvent;
use storage::{TransferStore, REALTIME_SYNC_CURSOR};
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::event::decode_transfer;

/// Receives each normalized live event after it is durably stored.
pub type EventSink = Arc<dyn Fn(TransferEvent) -> Result<()> + Send + Sync>;

/// Tails the live subscription, persisting each Transfer as it arrives.
pub struct LiveTailer {
    gateway: RpcGateway,
    store: TransferStore,
}

impl LiveTailer {
    /// Assemble a tailer over the shared gateway and store.
    pub const fn new(gateway: RpcGateway, store: TransferStore) -> Self {
        Self { gateway, store }
    }

    /// Consume the subscription until the stream ends. Failures are
    /// per-event: the offending log is dropped and the stream continues.
    pub async fn run(&self, mut logs: TransferLogStream, sink: EventSink) {
        info!("live tailer started");
        while let Some(log) = logs.next().await {
            if let Err(e) = self.process_log(&log, &sink).await {
                warn!(err = %e, tx = ?log.transaction_hash, "dropping live event");
            }
        }
        info!("live log stream closed, tailer exiting");
    }

    async fn process_log(&self, log: &Log, sink: &EventSink) -> Result<()> {
        let block_number =
            log.block_number.ok_or_else(|| eyre!("live log missing block number"))?;
        let timestamp = self.gateway.block_timestamp(block_number).await?;
        let event = decode_transfer(log, timestamp)?;

        self.store.save_events(std::slice::from_ref(&event))?;
        // out-of-order delivery is harmless: the cursor only moves forward
        self.store.advance_cursor(REALTIME_SYNC_CURSOR, block_number)?;

        if let Err(e) = sink(event) {
            warn!(err = %e, "live sink rejected event");
        }
        Ok(())
    }
}
