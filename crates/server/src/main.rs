//! vidrec worker entry point.
//!
//! Boots logging and configuration, opens the durable store, refreshes the
//! offline cache and then serves the tool surface over stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use vidrec_core::AppConfig;

mod error;
mod handler;
mod lifecycle;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        cache_version = %config.cache_version,
        db_path = %config.db_path.display(),
        "starting vidrec worker on stdio transport"
    );

    let (state, sync_worker) = lifecycle::start(config).await?;
    lifecycle::bootstrap_cache(&state).await;

    let handler = handler::WorkerServer::new(state);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    if let Some(worker) = sync_worker {
        worker.abort();
    }

    Ok(())
}
