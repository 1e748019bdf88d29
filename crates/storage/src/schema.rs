//! Table definitions for the local store.

/// Names of all tables.
pub const TABLES: &[&str] = &["transfer_events", "sync_cursors"];

/// Bootstrap DDL; every statement is idempotent so startup can always run
/// the whole batch.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transfer_events (
    transaction_hash TEXT NOT NULL,
    log_index INTEGER NOT NULL,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER NOT NULL,
    from_address TEXT NOT NULL,
    to_address TEXT NOT NULL,
    value TEXT NOT NULL,
    indexed_at TEXT NOT NULL,
    PRIMARY KEY (transaction_hash, log_index)
);
CREATE INDEX IF NOT EXISTS idx_transfer_events_block_number ON transfer_events (block_number);
CREATE INDEX IF NOT EXISTS idx_transfer_events_from ON transfer_events (from_address);
CREATE INDEX IF NOT EXISTS idx_transfer_events_to ON transfer_events (to_address);

CREATE TABLE IF NOT EXISTS sync_cursors (
    id TEXT PRIMARY KEY,
    last_synced_block INTEGER NOT NULL,
    last_synced_at TEXT NOT NULL
);
";
