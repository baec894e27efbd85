//! stash server entry point.
//!
//! Boots the caching engine and serves it over MCP on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use stash_client::{ChannelHost, Engine, FetchClient, FetchConfig};
use stash_core::{AppConfig, CacheDb, CacheStore, MemoryStore};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, db_path = ?config.db_path, "starting stash on stdio transport");

    let store: Arc<dyn CacheStore> = match &config.db_path {
        Some(path) => Arc::new(CacheDb::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    };
    let network = Arc::new(FetchClient::new(FetchConfig::from_app(&config)?)?);
    let host = Arc::new(ChannelHost::default());

    let mut clients = host.subscribe();
    tokio::spawn(async move {
        loop {
            match clients.recv().await {
                Ok(message) => tracing::info!(?message, "client message"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "client messages dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let engine = Arc::new(Engine::new(config, store, network, host)?);
    let phase = engine.start().await?;
    tracing::info!(?phase, "engine ready");

    let sweeps = engine.maintenance().spawn_sweeps();

    let server = serve_server(handler::StashServer::new(engine), stdio()).await?;
    server.waiting().await?;

    sweeps.abort();
    Ok(())
}
