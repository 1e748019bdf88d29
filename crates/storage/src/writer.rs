//! Write paths: idempotent event batches and monotonic cursors.

use chrono::Utc;
use eyre::Result;
use primitives::TransferEvent;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::TransferStore;

/// Result of persisting one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Rows that did not exist before
    pub inserted: u64,
    /// Rows skipped because their composite key was already present
    pub ignored: u64,
}

impl TransferStore {
    /// Persist a batch of events in a single transaction. Rows whose
    /// `(transaction_hash, log_index)` already exist are left untouched.
    pub fn save_events(&self, events: &[TransferEvent]) -> Result<SaveOutcome> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0u64;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO transfer_events
                 (transaction_hash, log_index, block_number, block_timestamp,
                  from_address, to_address, value, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.transaction_hash,
                    event.log_index,
                    event.block_number,
                    event.timestamp,
                    event.from,
                    event.to,
                    event.value,
                    event.indexed_at.to_rfc3339(),
                ])? as u64;
            }
        }
        tx.commit()?;

        let ignored = events.len() as u64 - inserted;
        debug!(inserted, ignored, "saved event batch");
        Ok(SaveOutcome { inserted, ignored })
    }

    /// Highest durably ingested block for the named cursor.
    pub fn cursor(&self, id: &str) -> Result<Option<u64>> {
        let conn = self.lock();
        let block = conn
            .query_row(
                "SELECT last_synced_block FROM sync_cursors WHERE id = ?1",
                params![id],
                |row| row.get::<_, u64>(0),
            )
            .optional()?;
        Ok(block)
    }

    /// Create the cursor row if absent. When a concurrent create wins the
    /// race, the stored value is read back and returned instead.
    pub fn create_cursor(&self, id: &str, block: u64) -> Result<u64> {
        {
            let conn = self.lock();
            conn.execute(
                "INSERT OR IGNORE INTO sync_cursors (id, last_synced_block, last_synced_at)
                 VALUES (?1, ?2, ?3)",
                params![id, block, Utc::now().to_rfc3339()],
            )?;
        }
        Ok(self.cursor(id)?.unwrap_or(block))
    }

    /// Advance the named cursor. Values at or below the stored block are a
    /// no-op; the guard runs inside the upsert so a concurrent writer can
    /// never move the cursor backwards.
    pub fn advance_cursor(&self, id: &str, block: u64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO sync_cursors (id, last_synced_block, last_synced_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 last_synced_block = excluded.last_synced_block,
                 last_synced_at = excluded.last_synced_at
             WHERE excluded.last_synced_block > sync_cursors.last_synced_block",
            params![id, block, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
