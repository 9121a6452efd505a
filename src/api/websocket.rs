//! WebSocket handler for real-time streaming to the dashboard.
//!
//! Pushes:
//! - Ticks and closed candles for subscribed symbols
//! - Per-user position P&L updates
//! - Tournament standing snapshots for the user's live tournaments

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::auth::verify_token;
use crate::market::MarketEvent;
use crate::AppState;

/// Interval between per-user P&L pushes
const PNL_PUSH_SECS: u64 = 3;

/// Registry of connected clients and their symbol subscriptions.
pub struct ConnectionManager {
    /// user_id -> outbound message queue
    connections: DashMap<i32, mpsc::UnboundedSender<Message>>,
    /// symbol -> subscribed user ids
    subscriptions: DashMap<String, HashSet<i32>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            subscriptions: DashMap::new(),
        }
    }

    fn connect(&self, user_id: i32, tx: mpsc::UnboundedSender<Message>) {
        self.connections.insert(user_id, tx);
        info!("WebSocket connected: user {}", user_id);
    }

    fn disconnect(&self, user_id: i32) {
        self.connections.remove(&user_id);
        self.subscriptions.retain(|_, users| {
            users.remove(&user_id);
            !users.is_empty()
        });
        info!("WebSocket disconnected: user {}", user_id);
    }

    fn subscribe(&self, user_id: i32, symbol: &str) {
        self.subscriptions
            .entry(symbol.to_string())
            .or_default()
            .insert(user_id);
        info!("User {} subscribed to {}", user_id, symbol);
    }

    fn unsubscribe(&self, user_id: i32, symbol: &str) {
        if let Some(mut users) = self.subscriptions.get_mut(symbol) {
            users.remove(&user_id);
        }
        self.subscriptions.retain(|_, users| !users.is_empty());
        info!("User {} unsubscribed from {}", user_id, symbol);
    }

    /// Queue a message to one user. Dead connections are dropped.
    pub fn send_personal(&self, user_id: i32, message: &serde_json::Value) {
        let Some(tx) = self.connections.get(&user_id) else {
            return;
        };
        if tx.send(Message::Text(message.to_string())).is_err() {
            drop(tx);
            self.disconnect(user_id);
        }
    }

    /// Queue a message to every subscriber of a symbol.
    pub fn broadcast_to_symbol(&self, symbol: &str, message: &serde_json::Value) {
        // Snapshot the subscriber set so slow sends never hold the map lock
        let users: Vec<i32> = match self.subscriptions.get(symbol) {
            Some(users) => users.iter().copied().collect(),
            None => return,
        };
        let text = message.to_string();

        let mut dead = Vec::new();
        for user_id in users {
            if let Some(tx) = self.connections.get(&user_id) {
                if tx.send(Message::Text(text.clone())).is_err() {
                    dead.push(user_id);
                }
            }
        }
        for user_id in dead {
            self.disconnect(user_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// Route market events to symbol subscribers. Spawned once at startup.
pub fn spawn_market_fanout(state: Arc<AppState>) {
    let mut events = state.market.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MarketEvent::Tick(tick)) => {
                    state.ws.broadcast_to_symbol(
                        &tick.symbol,
                        &serde_json::json!({
                            "type": "tick",
                            "data": tick
                        }),
                    );
                }
                Ok(MarketEvent::CandleClosed { symbol, candle }) => {
                    state.ws.broadcast_to_symbol(
                        &symbol,
                        &serde_json::json!({
                            "type": "candle",
                            "symbol": symbol,
                            "data": candle
                        }),
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket fan-out lagged, dropped {} market events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("Market fan-out stopped");
    });
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// WebSocket upgrade handler. The JWT rides in the query string because
/// browsers cannot set headers on WebSocket requests.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(user_id) = verify_token(&query.token, &state.settings.jwt_secret) else {
        return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: i32) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    state.ws.connect(user_id, tx);
    state.ws.send_personal(
        user_id,
        &serde_json::json!({
            "type": "connected",
            "message": "WebSocket connected successfully",
            "user_id": user_id
        }),
    );

    // Drain the outbound queue into the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Periodic P&L pushes for this user
    let pnl_state = Arc::clone(&state);
    let mut pnl_task = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(PNL_PUSH_SECS));
        loop {
            ticker.tick().await;
            push_pnl_update(&pnl_state, user_id).await;
        }
    });

    // Inbound commands
    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => handle_message(&recv_state, user_id, &text).await,
                Ok(Message::Ping(_)) => debug!("Received ping from user {}", user_id),
                Ok(Message::Close(_)) => {
                    info!("WebSocket client requested close: user {}", user_id);
                    break;
                }
                Err(e) => {
                    warn!("WebSocket error for user {}: {}", user_id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => { recv_task.abort(); pnl_task.abort(); }
        _ = &mut recv_task => { send_task.abort(); pnl_task.abort(); }
        _ = &mut pnl_task => { send_task.abort(); recv_task.abort(); }
    }

    state.ws.disconnect(user_id);
}

async fn handle_message(state: &Arc<AppState>, user_id: i32, text: &str) {
    let data: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            state.ws.send_personal(
                user_id,
                &serde_json::json!({
                    "type": "error",
                    "message": "Invalid JSON format"
                }),
            );
            return;
        }
    };

    match data.get("type").and_then(|t| t.as_str()) {
        Some("subscribe") => {
            let Some(symbol) = data.get("symbol").and_then(|s| s.as_str()) else {
                state.ws.send_personal(
                    user_id,
                    &serde_json::json!({
                        "type": "error",
                        "message": "Symbol is required for subscription"
                    }),
                );
                return;
            };

            let base_price = data.get("base_price").and_then(|p| p.as_f64());
            state.market.subscribe_symbol(symbol, base_price);
            state.ws.subscribe(user_id, symbol);
            state.ws.send_personal(
                user_id,
                &serde_json::json!({
                    "type": "subscribed",
                    "symbol": symbol,
                    "message": format!("Subscribed to {}", symbol)
                }),
            );
        }
        Some("unsubscribe") => {
            let Some(symbol) = data.get("symbol").and_then(|s| s.as_str()) else {
                state.ws.send_personal(
                    user_id,
                    &serde_json::json!({
                        "type": "error",
                        "message": "Symbol is required for unsubscription"
                    }),
                );
                return;
            };

            state.ws.unsubscribe(user_id, symbol);
            state.ws.send_personal(
                user_id,
                &serde_json::json!({
                    "type": "unsubscribed",
                    "symbol": symbol,
                    "message": format!("Unsubscribed from {}", symbol)
                }),
            );
        }
        Some("ping") => {
            state
                .ws
                .send_personal(user_id, &serde_json::json!({ "type": "pong" }));
        }
        other => {
            state.ws.send_personal(
                user_id,
                &serde_json::json!({
                    "type": "error",
                    "message": format!("Unknown message type: {}", other.unwrap_or("none"))
                }),
            );
        }
    }
}

/// Re-mark the user's positions and push P&L, plus a standing snapshot for
/// each live tournament they are in.
async fn push_pnl_update(state: &Arc<AppState>, user_id: i32) {
    let positions = match state.engine.update_positions_prices(user_id).await {
        Ok(p) => p,
        Err(e) => {
            error!("P&L refresh failed for user {}: {}", user_id, e);
            return;
        }
    };

    let total_unrealized: f64 = positions.iter().map(|p| p.unrealized_pnl).sum();
    let total_realized: f64 = positions.iter().map(|p| p.realized_pnl).sum();

    state.ws.send_personal(
        user_id,
        &serde_json::json!({
            "type": "paper:pnl:update",
            "data": {
                "positions": positions,
                "total_unrealized_pnl": total_unrealized,
                "total_realized_pnl": total_realized,
            }
        }),
    );

    let participations = match state
        .db
        .get_active_participations(user_id, chrono::Utc::now())
        .await
    {
        Ok(p) => p,
        Err(e) => {
            error!("Tournament lookup failed for user {}: {}", user_id, e);
            return;
        }
    };

    for participation in participations {
        if let Ok(Some(ranking)) = state
            .db
            .get_user_rank(participation.tournament_id, user_id)
            .await
        {
            state.ws.send_personal(
                user_id,
                &serde_json::json!({
                    "type": format!("tournament:{}:pnl", participation.tournament_id),
                    "data": ranking
                }),
            );
        }
    }
}
