//! Transferscope driver - wires the backfill sweep and the live tailer
//! over one gateway and one store.

use std::sync::Arc;

use alloy_primitives::Address;
use config::Opts;
use eyre::{Context, Result};
use gateway::{DefaultProvider, GatewayConfig, RpcGateway};
use primitives::TransferEvent;
use storage::TransferStore;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::{
    backfill::BackfillEngine,
    tailer::{EventSink, LiveTailer},
};

/// Driver that runs historical and live ingestion against one store.
#[derive(Debug)]
pub struct Driver {
    gateway: RpcGateway,
    provider: DefaultProvider,
    store: TransferStore,
    contract: Address,
    start_block: u64,
    initial_batch_size: u64,
    live_tx: broadcast::Sender<TransferEvent>,
}

impl Driver {
    /// Connect to the upstream and assemble the pipeline.
    pub async fn new(
        opts: &Opts,
        store: TransferStore,
        live_tx: broadcast::Sender<TransferEvent>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self> {
        info!("initializing driver");
        let (gateway, provider) =
            gateway::connect(opts.rpc.url.clone(), GatewayConfig::default(), shutdown)
                .await
                .wrap_err("failed to initialize the RPC gateway")?;

        Ok(Self {
            gateway,
            provider,
            store,
            contract: opts.contract.address,
            start_block: opts.contract.start_block,
            initial_batch_size: opts.indexer.initial_batch_size,
            live_tx,
        })
    }

    /// Run until the shutdown signal fires. The live tailer subscribes
    /// immediately; the historical sweep runs to the head observed at
    /// startup and returns while the tailer keeps following the tip.
    pub async fn start_with_shutdown(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let logs = gateway::transfer_log_stream(self.provider.clone(), self.contract);
        let tailer = LiveTailer::new(self.gateway.clone(), self.store.clone());
        let live_tx = self.live_tx.clone();
        let sink: EventSink = Arc::new(move |event| {
            // push subscribers may come and go; delivery is best effort
            let _ = live_tx.send(event);
            Ok(())
        });
        let tailer_task = tokio::spawn(async move { tailer.run(logs, sink).await });

        let engine = BackfillEngine::new(
            self.gateway.clone(),
            self.store.clone(),
            self.contract,
            self.start_block,
        );
        tokio::select! {
            result = engine.run(self.initial_batch_size) => {
                if let Err(e) = result {
                    error!(err = %e, "backfill aborted");
                }
            }
            _ = shutdown.recv() => {
                info!("shutdown requested during backfill");
                tailer_task.abort();
                return Ok(());
            }
        }

        info!("historical sweep finished, live tailer keeps following the tip");
        let _ = shutdown.recv().await;
        tailer_task.abort();
        Ok(())
    }
}
