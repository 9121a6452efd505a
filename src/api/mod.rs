//! API module - Axum HTTP server and routes
//!
//! All REST and WebSocket endpoints for the paper trading platform.

mod handlers;
pub mod websocket;

pub use websocket::{spawn_market_fanout, ConnectionManager};

use crate::AppState;
use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring malformed CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the main application router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.settings.cors_origins);

    Router::new()
        // ==========================================
        // Service Info & Health
        // ==========================================
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // ==========================================
        // Auth
        // ==========================================
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/me", get(handlers::me))
        .route("/api/auth/logout", post(handlers::logout))
        // ==========================================
        // Paper Trading
        // ==========================================
        .route("/api/paper-trading/orders", post(handlers::place_order))
        .route("/api/paper-trading/orders", get(handlers::get_orders))
        .route(
            "/api/paper-trading/orders/:order_id",
            delete(handlers::cancel_order),
        )
        .route("/api/paper-trading/positions", get(handlers::get_positions))
        .route("/api/paper-trading/wallet", get(handlers::get_wallet))
        .route("/api/paper-trading/wallet/deposit", post(handlers::deposit))
        .route(
            "/api/paper-trading/wallet/withdraw",
            post(handlers::withdraw),
        )
        .route("/api/paper-trading/portfolio", get(handlers::get_portfolio))
        .route("/api/paper-trading/charges", get(handlers::get_charges))
        // ==========================================
        // Market Data
        // ==========================================
        .route("/api/candles", get(handlers::get_candles))
        .route("/api/candles/quotes", get(handlers::get_quotes))
        .route(
            "/api/candles/options-chain/:symbol",
            get(handlers::get_options_chain),
        )
        .route("/api/candles/instruments", get(handlers::get_instruments))
        // ==========================================
        // Tournaments
        // ==========================================
        .route("/api/tournaments", get(handlers::get_tournaments))
        .route("/api/tournaments", post(handlers::create_tournament))
        .route(
            "/api/tournaments/my/tournaments",
            get(handlers::get_my_tournaments),
        )
        .route(
            "/api/tournaments/:tournament_id",
            get(handlers::get_tournament),
        )
        .route(
            "/api/tournaments/:tournament_id/join",
            post(handlers::join_tournament),
        )
        .route(
            "/api/tournaments/:tournament_id/leaderboard",
            get(handlers::get_leaderboard),
        )
        .route(
            "/api/tournaments/:tournament_id/my-rank",
            get(handlers::get_my_rank),
        )
        .route(
            "/api/tournaments/:tournament_id/start",
            post(handlers::start_tournament),
        )
        .route(
            "/api/tournaments/:tournament_id/end",
            post(handlers::end_tournament),
        )
        // ==========================================
        // Teams
        // ==========================================
        .route(
            "/api/tournaments/:tournament_id/teams",
            post(handlers::create_team),
        )
        .route(
            "/api/tournaments/:tournament_id/teams",
            get(handlers::list_teams),
        )
        .route("/api/teams/:team_id/join", post(handlers::join_team))
        // ==========================================
        // WebSocket for real-time streaming
        // ==========================================
        .route("/ws", get(websocket::ws_handler))
        // Apply middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
