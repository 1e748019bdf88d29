//! Read paths: filtered event pages and aggregate stats.

use chrono::{DateTime, Utc};
use eyre::Result;
use primitives::{amount, TransferEvent};
use rusqlite::{params_from_iter, types::Type, Row, ToSql};

use crate::TransferStore;

/// Filters and pagination for the events read path. Address filters must
/// already be normalized to lowercase hex.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Match on the sender address
    pub from: Option<String>,
    /// Match on the recipient address
    pub to: Option<String>,
    /// Lowest block number to include
    pub start_block: Option<u64>,
    /// Highest block number to include
    pub end_block: Option<u64>,
    /// 1-based page number
    pub page: u64,
    /// Rows per page
    pub page_size: u64,
}

/// One page of query results plus the unpaginated match count.
#[derive(Debug, Clone)]
pub struct EventPage {
    /// Matching events, newest block first
    pub events: Vec<TransferEvent>,
    /// Number of matches before pagination
    pub total_count: u64,
}

/// Aggregates over the whole indexed corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStats {
    /// Number of indexed transfers
    pub total_events: u64,
    /// Exact decimal sum of every stored `value`
    pub total_value_transferred: String,
}

impl TransferStore {
    /// Page of events matching the filters, ordered by
    /// `block_number DESC, log_index ASC`.
    pub fn events(&self, query: &EventQuery) -> Result<EventPage> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(from) = &query.from {
            clauses.push("from_address = ?");
            args.push(Box::new(from.clone()));
        }
        if let Some(to) = &query.to {
            clauses.push("to_address = ?");
            args.push(Box::new(to.clone()));
        }
        if let Some(start) = query.start_block {
            clauses.push("block_number >= ?");
            args.push(Box::new(start));
        }
        if let Some(end) = query.end_block {
            clauses.push("block_number <= ?");
            args.push(Box::new(end));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let conn = self.lock();
        let total_count: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM transfer_events{where_sql}"),
            params_from_iter(args.iter().map(|arg| arg.as_ref())),
            |row| row.get(0),
        )?;

        let offset = query.page.max(1).saturating_sub(1).saturating_mul(query.page_size);
        args.push(Box::new(query.page_size));
        args.push(Box::new(offset));
        let mut stmt = conn.prepare(&format!(
            "SELECT transaction_hash, log_index, block_number, block_timestamp,
                    from_address, to_address, value, indexed_at
             FROM transfer_events{where_sql}
             ORDER BY block_number DESC, log_index ASC
             LIMIT ? OFFSET ?"
        ))?;
        let events = stmt
            .query_map(params_from_iter(args.iter().map(|arg| arg.as_ref())), row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EventPage { events, total_count })
    }

    /// Aggregate totals over every indexed transfer. The value sum stays in
    /// the decimal domain to preserve precision.
    pub fn stats(&self) -> Result<TransferStats> {
        let conn = self.lock();
        let total_events: u64 =
            conn.query_row("SELECT COUNT(*) FROM transfer_events", [], |row| row.get(0))?;

        let mut stmt = conn.prepare("SELECT value FROM transfer_events")?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let total_value_transferred = amount::sum_decimal(values.iter().map(String::as_str))?;

        Ok(TransferStats { total_events, total_value_transferred })
    }
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<TransferEvent> {
    let indexed_at: String = row.get(7)?;
    let indexed_at = DateTime::parse_from_rfc3339(&indexed_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(TransferEvent {
        transaction_hash: row.get(0)?,
        log_index: row.get(1)?,
        block_number: row.get(2)?,
        timestamp: row.get(3)?,
        from: row.get(4)?,
        to: row.get(5)?,
        value: row.get(6)?,
        indexed_at,
    })
}
