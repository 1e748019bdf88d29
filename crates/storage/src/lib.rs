//! SQLite-backed persistence for transfer events and sync cursors.
//!
//! The store is the only writer of both tables. Event inserts are
//! idempotent on `(transaction_hash, log_index)` and cursor advances are
//! monotonic by construction, so the backfill and the live tailer can
//! overlap freely.

mod reader;
mod schema;
mod writer;

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use eyre::{Context, Result};
use rusqlite::Connection;
use tracing::info;

pub use reader::{EventPage, EventQuery, TransferStats};
pub use schema::TABLES;
pub use writer::SaveOutcome;

/// Cursor advanced by the historical backfill.
pub const BATCH_SYNC_CURSOR: &str = "batch-sync";
/// Cursor advanced by the live tailer.
pub const REALTIME_SYNC_CURSOR: &str = "realtime-sync";

/// Persistence façade over the local SQLite database.
#[derive(Clone, Debug)]
pub struct TransferStore {
    conn: Arc<Mutex<Connection>>,
}

impl TransferStore {
    /// Open (or create) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .wrap_err_with(|| format!("failed to open database at {}", path.as_ref().display()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Create tables and indexes if they do not exist yet.
    pub fn init_schema(&self) -> Result<()> {
        self.lock()
            .execute_batch(schema::SCHEMA)
            .wrap_err("failed to initialize database schema")
    }

    /// Drop every table so the next [`Self::init_schema`] starts from
    /// scratch. Local/dev only.
    pub fn reset(&self) -> Result<()> {
        let conn = self.lock();
        for table in schema::TABLES {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
                .wrap_err_with(|| format!("failed to drop {table} table"))?;
        }
        info!("database reset complete");
        Ok(())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("lock poisoned")
    }
}
