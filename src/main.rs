//! Interbank Payment Gateway - Main Application Entry Point
//!
//! This is a REST API server that orchestrates fund transfers between
//! accounts held at independently-operated account services. The gateway
//! routes each account reference to its owning institution, obtains
//! authorization from the sender's institution, and drives the non-atomic
//! debit/credit saga with a compensation path for the window where funds
//! have left the sender but not reached the receiver.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Outbound calls**: reqwest with a fixed per-call timeout
//! - **State**: in-process transaction ledger, owned by the orchestrator
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Build the institution directory and validate its base URLs
//! 3. Wire the account client, ledger, health monitor, and orchestrator
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod directory;
mod error;
mod handlers;
mod ledger;
mod models;
mod services;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::directory::Directory;
use crate::ledger::TransactionLedger;
use crate::services::account_client::{AccountService, HttpAccountClient};
use crate::services::health_service::HealthMonitor;
use crate::services::transfer_service::{SagaSettings, TransferOrchestrator};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Build the institution directory (validates base URLs)
    let directory = Arc::new(Directory::from_config(&config)?);
    tracing::info!(
        institutions = ?directory
            .institutions()
            .iter()
            .map(|i| i.id.as_str())
            .collect::<Vec<_>>(),
        "Directory loaded"
    );

    // Wire the services around the shared client and ledger
    let accounts: Arc<dyn AccountService> = Arc::new(HttpAccountClient::new(
        Duration::from_secs(config.request_timeout_secs),
        Duration::from_secs(config.health_timeout_secs),
    )?);
    let ledger = Arc::new(TransactionLedger::new());
    let health = Arc::new(HealthMonitor::new(directory.clone(), accounts.clone()));
    let orchestrator = Arc::new(TransferOrchestrator::new(
        directory.clone(),
        accounts,
        ledger.clone(),
        health.clone(),
        SagaSettings {
            credit_retry_attempts: config.credit_retry_attempts,
            credit_retry_delay: Duration::from_millis(config.credit_retry_delay_ms),
        },
    ));

    let app_state = AppState {
        directory,
        orchestrator,
        ledger,
        health,
    };

    let app = Router::new()
        .route("/", get(handlers::health::read_root))
        .route("/health", get(handlers::health::health_check))
        .route("/transfer", post(handlers::transfers::create_transfer))
        .route(
            "/transaction/{id}",
            get(handlers::transfers::get_transaction),
        )
        .route("/transactions", get(handlers::transfers::list_transactions))
        .route(
            "/transactions/pending",
            get(handlers::transfers::list_pending_transactions),
        )
        // The gateway is called from browser frontends on other origins
        .layer(CorsLayer::permissive())
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Gateway listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
