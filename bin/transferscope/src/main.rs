//! Entrypoint.

use std::time::Duration;

use api::ApiState;
use clap::Parser;
use config::Opts;
use dotenvy::dotenv;
use driver::Driver;
use storage::TransferStore;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        dotenvy::from_filename(custom_env_file)?;
    } else {
        // Try the default .env file, and ignore if it doesn't exist.
        dotenv().ok();
    }

    let opts = Opts::parse();
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
    info!(contract = %opts.contract.address, "🔎 Transferscope starting");

    let store = TransferStore::open(&opts.store.db_name)?;
    if opts.store.reset_db {
        store.reset()?;
    }
    store.init_schema()?;

    let (live_tx, _) = broadcast::channel(1024);
    let shutdown = runtime::shutdown_channel();

    let state = ApiState::new(
        store.clone(),
        live_tx.clone(),
        opts.api.max_requests,
        Duration::from_secs(opts.api.rate_period_secs),
    );
    let api_addr = opts.api.socket_addr();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        if let Err(e) = server::run(api_addr, state, server_shutdown).await {
            error!(err = %e, "API server exited with error");
        }
    });

    let driver = Driver::new(&opts, store, live_tx, shutdown.subscribe()).await?;
    driver.start_with_shutdown(shutdown.subscribe()).await
}
