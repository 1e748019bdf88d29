//! Transferscope configuration
use alloy_primitives::Address;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use url::Url;

/// Upstream RPC endpoint configuration options
#[derive(Debug, Clone, Parser)]
pub struct RpcOpts {
    /// JSON-RPC endpoint; must be a WebSocket URL (ws:// or wss://) so the
    /// live subscription can attach
    #[clap(long, env = "RPC_URL")]
    pub url: Url,
}

/// Tracked contract configuration options
#[derive(Debug, Clone, Parser)]
pub struct ContractOpts {
    /// Address of the ERC-20 contract to index
    #[clap(long, env = "CONTRACT_ADDRESS")]
    pub address: Address,
    /// First block to index; 0 runs the creation-block search instead
    #[clap(long, env = "START_BLOCK", default_value = "0")]
    pub start_block: u64,
}

/// Local store configuration options
#[derive(Debug, Clone, Parser)]
pub struct StoreOpts {
    /// Path of the SQLite database file
    #[clap(long, env = "DB_NAME", default_value = "transfers.db")]
    pub db_name: String,
    /// If set, drop & re-create all tables (local/dev only)
    #[clap(long)]
    pub reset_db: bool,
}

/// Backfill tuning options
#[derive(Debug, Clone, Parser)]
pub struct IndexerOpts {
    /// Starting (and maximum) block-range width for historical batches.
    /// Rate-limited public endpoints usually do better around 200.
    #[clap(long, env = "INITIAL_BATCH_SIZE", default_value = "1000")]
    pub initial_batch_size: u64,
}

/// Query API configuration options
#[derive(Debug, Clone, Parser)]
pub struct ApiOpts {
    /// Interface the API server binds to
    #[clap(long, env = "API_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,
    /// Port the API server binds to
    #[clap(long, env = "API_PORT", default_value = "3000")]
    pub port: u16,
    /// Requests allowed per client IP per rate period
    #[clap(long, env = "API_MAX_REQUESTS", default_value = "50")]
    pub max_requests: u64,
    /// Rate limiting window in seconds
    #[clap(long, env = "API_RATE_PERIOD_SECS", default_value = "1")]
    pub rate_period_secs: u64,
}

impl ApiOpts {
    /// Socket address the server binds to.
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// CLI options for transferscope
#[derive(Debug, Clone, Parser)]
pub struct Opts {
    /// Upstream RPC configuration
    #[clap(flatten)]
    pub rpc: RpcOpts,

    /// Tracked contract configuration
    #[clap(flatten)]
    pub contract: ContractOpts,

    /// Local store configuration
    #[clap(flatten)]
    pub store: StoreOpts,

    /// Backfill tuning
    #[clap(flatten)]
    pub indexer: IndexerOpts,

    /// Query API configuration
    #[clap(flatten)]
    pub api: ApiOpts,
}
