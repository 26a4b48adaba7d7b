//! Coin-Ledger Service - query/mutation and RPC surfaces over the ledger.
//!
//! This is the main entry point for the coin-ledger service.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coin_ledger_notify::TxLogClient;
use coin_ledger_service::{create_router, AppState, ServiceConfig};
use coin_ledger_store::LedgerStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,coin_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Coin-Ledger Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();
    if config.database_url.is_empty() {
        return Err("DATABASE_URL not set".into());
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        tx_log_configured = %config.tx_log_url.is_some(),
        "Service configuration loaded"
    );

    // Connect to PostgreSQL and ensure the schema exists
    let mut store = LedgerStore::connect(&config.database_url).await?;
    store.ensure_schema().await?;

    // Wire the transaction-log notifier when configured
    if let Some(url) = &config.tx_log_url {
        let client = TxLogClient::new(url.clone(), config.tx_log_api_key.clone());
        store = store.with_notifier(Arc::new(client));
        tracing::info!(tx_log_url = %url, "transaction log notifier connected");
    } else {
        tracing::warn!("TX_LOG_URL not set - balance changes will not be posted to the log");
    }

    // Build app state and the router
    let state = AppState::new(Arc::new(store), config.clone());
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server. Peer addresses feed the gateway's client keys.
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
