//! Keyserver daemon.
//!
//! Wires the resolved configuration into the store and enforcer, builds the
//! router, and serves until interrupted. The only fatal startup error is a
//! storage backend that will not open.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use keyserver_lib::storage::SledEngine;
use keyserver_lib::{AddressStore, PaymentEnforcer};

use keyserverd::config::{Cli, Config, PAYMENT_URL};
use keyserverd::server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("keyserverd=info,keyserver_lib=info")),
        )
        .init();

    let config = Config::resolve(cli)?;
    tracing::info!("starting keyserver daemon");

    let engine = SledEngine::open(&config.dbpath)
        .with_context(|| format!("failed to open database at {}", config.dbpath.display()))?;
    let store = Arc::new(AddressStore::new(engine));
    let enforcer = Arc::new(PaymentEnforcer::new(PAYMENT_URL, Some(config.secret.clone())));

    let app = build_router(AppState {
        store: Arc::clone(&store),
        enforcer,
    });

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(bind = %config.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
