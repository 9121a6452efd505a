//! Nifty Options Paper Trading Backend
//!
//! Simulated trading for NIFTY/BANKNIFTY index options: virtual wallets,
//! paper orders and positions, tournaments, and a live tick feed over
//! WebSocket. No real money moves anywhere in this service.

mod api;
mod auth;
mod charges;
mod config;
mod db;
mod inr;
mod market;
mod trading;
mod types;

use crate::api::{create_router, spawn_market_fanout, ConnectionManager};
use crate::config::Settings;
use crate::db::Database;
use crate::market::MarketHub;
use crate::trading::PaperTradingEngine;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across all handlers
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub market: Arc<MarketHub>,
    pub engine: Arc<PaperTradingEngine>,
    pub ws: Arc<ConnectionManager>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║      Nifty Options Paper Trading Backend v{}          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════════════════════════╝");

    let settings = Settings::from_env();

    // Initialize database
    info!("Connecting to database...");
    let db = Database::new(&settings.database_url).await?;
    db.init_schema().await?;
    info!("Database connected");

    // Start the simulated market feed
    let market = Arc::new(MarketHub::new());
    market.start();

    // Paper trading engine
    let engine = Arc::new(PaperTradingEngine::new(
        db.clone(),
        Arc::clone(&market),
        settings.max_position_size,
        settings.initial_virtual_balance,
    ));

    // WebSocket connection registry
    let ws = Arc::new(ConnectionManager::new());

    let port = settings.port;
    let state = Arc::new(AppState {
        db,
        settings,
        market: Arc::clone(&market),
        engine,
        ws,
    });

    // Route market events to WebSocket subscribers
    spawn_market_fanout(Arc::clone(&state));

    // Create router with all API endpoints
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    market.stop();
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
