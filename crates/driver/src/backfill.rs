//! Historical range walker with adaptive batch sizing.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use alloy_primitives::Address;
use eyre::{Context, Result};
use gateway::{GatewayError, RpcGateway};
use storage::{TransferStore, BATCH_SYNC_CURSOR};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::{creation::CreationLocator, event::decode_transfer};

/// Smallest block-range width the engine will shrink to.
pub const MIN_BATCH_SIZE: u64 = 10;

/// Consecutive clean batches required before the width grows again.
const GROWTH_STREAK: u32 = 5;

#[derive(Debug, thiserror::Error)]
enum RangeError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("store failure: {0}")]
    Store(eyre::Error),
}

/// Walks `[start, head]` once, persisting Transfer events batch by batch.
///
/// The cursor is the commit point: it only advances to a range's upper
/// bound after every event in the range is durably stored, and it never
/// moves backwards.
#[derive(Debug)]
pub struct BackfillEngine {
    gateway: RpcGateway,
    store: TransferStore,
    contract: Address,
    configured_start: u64,
    locator: CreationLocator,
    is_indexing: AtomicBool,
}

impl BackfillEngine {
    /// Assemble an engine over the shared gateway and store.
    pub fn new(
        gateway: RpcGateway,
        store: TransferStore,
        contract: Address,
        configured_start: u64,
    ) -> Self {
        let locator = CreationLocator::new(gateway.clone(), contract);
        Self { gateway, store, contract, configured_start, locator, is_indexing: AtomicBool::new(false) }
    }

    /// Run the historical sweep to the head observed at startup. A second
    /// concurrent invocation observes the single-runner flag and returns.
    pub async fn run(&self, initial_batch_size: u64) -> Result<()> {
        if self.is_indexing.swap(true, Ordering::SeqCst) {
            warn!("backfill already running, ignoring duplicate run request");
            return Ok(());
        }
        let result = self.sweep(initial_batch_size).await;
        self.is_indexing.store(false, Ordering::SeqCst);
        result
    }

    async fn sweep(&self, initial_batch_size: u64) -> Result<()> {
        let start = match self.store.cursor(BATCH_SYNC_CURSOR)? {
            Some(cursor) => {
                info!(cursor, "resuming backfill from stored cursor");
                cursor + 1
            }
            None => {
                let start = self.starting_block().await;
                self.store.create_cursor(BATCH_SYNC_CURSOR, start.saturating_sub(1))?;
                info!(start, "starting fresh backfill");
                start
            }
        };

        // the head is captured once; following the moving tip is the live
        // tailer's job
        let head = self.gateway.block_number().await.wrap_err("failed to read chain head")?;
        if start > head {
            info!(start, head, "nothing to backfill");
            return Ok(());
        }

        let max_batch = initial_batch_size.max(MIN_BATCH_SIZE);
        let mut batch_size = max_batch;
        let mut from = start;
        let mut successes = 0u32;
        let mut failures = 0u32;

        while from <= head {
            let to = (from + batch_size - 1).min(head);
            match self.ingest_range(from, to).await {
                Ok(count) => {
                    info!(from, to, count, "indexed block range");
                    successes += 1;
                    failures = 0;
                    if successes >= GROWTH_STREAK && batch_size < max_batch {
                        batch_size = (batch_size * 2).min(max_batch);
                        successes = 0;
                        info!(batch_size, "growing batch size after sustained successes");
                    }
                    from = to + 1;
                }
                Err(RangeError::Gateway(e)) if e.is_rate_limit() => {
                    failures += 1;
                    successes = 0;
                    let delay = if batch_size > MIN_BATCH_SIZE {
                        batch_size = (batch_size / 2).max(MIN_BATCH_SIZE);
                        backoff(Duration::from_secs(1), failures, Duration::from_secs(60))
                    } else {
                        backoff(Duration::from_secs(5), failures, Duration::from_secs(300))
                    };
                    warn!(
                        from,
                        to,
                        batch_size,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, shrinking batch and retrying the same range"
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    // a persistently failing range must not stall the sweep;
                    // the cursor stays below it
                    error!(from, to, err = %e, "skipping block range after non-recoverable failure");
                    successes = 0;
                    from = to + 1;
                }
            }
        }

        info!(head, "backfill complete");
        Ok(())
    }

    async fn ingest_range(&self, from: u64, to: u64) -> Result<usize, RangeError> {
        let logs = self.gateway.transfer_logs(self.contract, from, to).await?;

        let mut events = Vec::with_capacity(logs.len());
        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        for log in &logs {
            let Some(block_number) = log.block_number else {
                warn!(tx = ?log.transaction_hash, "log without block number, dropping");
                continue;
            };
            let timestamp = match timestamps.get(&block_number) {
                Some(cached) => *cached,
                None => {
                    let fetched = self.gateway.block_timestamp(block_number).await?;
                    timestamps.insert(block_number, fetched);
                    fetched
                }
            };
            match decode_transfer(log, timestamp) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(err = %e, tx = ?log.transaction_hash, "undecodable Transfer log, dropping");
                }
            }
        }

        let saved = self.store.save_events(&events).map_err(RangeError::Store)?;
        self.store.advance_cursor(BATCH_SYNC_CURSOR, to).map_err(RangeError::Store)?;
        debug!(from, to, inserted = saved.inserted, ignored = saved.ignored, "persisted batch");
        Ok(events.len())
    }

    /// Pick the first block of a fresh sweep: the configured start block,
    /// or the located creation block, or block 1 as the last resort.
    async fn starting_block(&self) -> u64 {
        if self.configured_start > 0 {
            return self.configured_start;
        }
        match self.locator.locate().await {
            Ok(block) => block,
            Err(e) => {
                warn!(err = %e, "creation block search failed, falling back to block 1");
                1
            }
        }
    }
}

fn backoff(base: Duration, failures: u32, cap: Duration) -> Duration {
    base.saturating_mul(1u32 << failures.min(16)).min(cap)
}

#[cfg(test)]
mod tests {
    use super::backoff;
    use tokio::time::Duration;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(Duration::from_secs(1), 1, Duration::from_secs(60)), Duration::from_secs(2));
        assert_eq!(backoff(Duration::from_secs(1), 3, Duration::from_secs(60)), Duration::from_secs(8));
        assert_eq!(backoff(Duration::from_secs(1), 10, Duration::from_secs(60)), Duration::from_secs(60));
        assert_eq!(backoff(Duration::from_secs(5), 8, Duration::from_secs(300)), Duration::from_secs(300));
    }
}
