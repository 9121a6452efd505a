//! API request handlers
//!
//! All endpoint handlers for the paper trading platform.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::{self, AdminUser, AuthUser};
use crate::db::{
    DbError, OrderCreate, OrderSide, TournamentCreate, TournamentStatus, TournamentType,
};
use crate::trading::EngineError;
use crate::types::{Timeframe, Underlying};
use crate::AppState;

// ==========================================
// Response Helpers
// ==========================================

pub fn error_response(error: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "success": false,
            "error": error
        })),
    )
        .into_response()
}

pub fn bad_request(error: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "success": false,
            "error": error
        })),
    )
        .into_response()
}

pub fn not_found(error: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": error
        })),
    )
        .into_response()
}

fn unauthorized(error: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "success": false,
            "error": error
        })),
    )
        .into_response()
}

fn engine_error(e: EngineError) -> Response {
    match e {
        EngineError::Validation(msg) => bad_request(&msg),
        EngineError::PriceUnavailable(_) => bad_request(&e.to_string()),
        EngineError::Database(DbError::NotFound) => not_found("Record not found"),
        EngineError::Database(DbError::InvalidData(msg)) => bad_request(&msg),
        EngineError::Database(e) => {
            error!("Database failure: {}", e);
            error_response(&e.to_string())
        }
    }
}

fn db_error(e: DbError) -> Response {
    match e {
        DbError::NotFound => not_found("Record not found"),
        DbError::InvalidData(msg) => bad_request(&msg),
        other => {
            error!("Database failure: {}", other);
            error_response(&other.to_string())
        }
    }
}

// ==========================================
// Service Info & Health
// ==========================================

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Nifty Options Paper Trading Backend",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "paper_trading_only": true,
        "websocket": "/ws"
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => "healthy",
        Err(e) => {
            error!("Database health check failed: {}", e);
            "unhealthy"
        }
    };

    Json(serde_json::json!({
        "status": if db_status == "healthy" { "healthy" } else { "degraded" },
        "database": db_status,
        "feed_running": state.market.simulator.is_running(),
        "websocket_connections": state.ws.connection_count()
    }))
}

// ==========================================
// Auth Handlers
// ==========================================

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn validate_signup(req: &SignupRequest) -> Result<(), String> {
    let email = req.email.trim();
    if !email.contains('@') || !email.contains('.') || email.len() < 5 {
        return Err("Invalid email address".to_string());
    }
    if req.username.trim().len() < 3 {
        return Err("Username must be at least 3 characters".to_string());
    }
    if req.password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    Ok(())
}

/// POST /api/auth/signup
/// Creates the account plus a wallet seeded with the starting balance.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Response {
    if let Err(msg) = validate_signup(&req) {
        return bad_request(&msg);
    }

    let password_hash = match auth::hash_password(&req.password) {
        Ok(h) => h,
        Err(e) => {
            error!("Password hashing failed: {}", e);
            return error_response("Failed to create account");
        }
    };

    match state
        .db
        .create_user(
            req.email.trim(),
            req.username.trim(),
            &password_hash,
            state.settings.initial_virtual_balance,
        )
        .await
    {
        Ok(user) => {
            info!("Created new user: {} (ID: {})", user.email, user.id);
            (StatusCode::CREATED, Json(user)).into_response()
        }
        Err(e) => db_error(e),
    }
}

/// POST /api/auth/login
pub async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> Response {
    let user = match state.db.get_user_by_email(req.email.trim()).await {
        Ok(Some(user)) => user,
        Ok(None) => return unauthorized("Incorrect email or password"),
        Err(e) => return db_error(e),
    };

    if !user.is_active {
        return unauthorized("Incorrect email or password");
    }

    if !auth::verify_password(&req.password, &user.password_hash) {
        info!("Failed login attempt for user: {}", user.email);
        return unauthorized("Incorrect email or password");
    }

    let token = match auth::create_access_token(
        user.id,
        &user.email,
        &state.settings.jwt_secret,
        state.settings.access_token_expire_minutes,
    ) {
        Ok(t) => t,
        Err(e) => {
            error!("Token creation failed: {}", e);
            return error_response("Failed to create session");
        }
    };

    info!("Successful login: {} (ID: {})", user.email, user.id);
    Json(serde_json::json!({
        "access_token": token,
        "token_type": "bearer"
    }))
    .into_response()
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(user)
}

/// POST /api/auth/logout
/// Stateless tokens: logout happens client-side, this is an ack.
pub async fn logout(AuthUser(_user): AuthUser) -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Successfully logged out" }))
}

// ==========================================
// Paper Trading Handlers
// ==========================================

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    #[serde(default = "default_order_limit")]
    pub limit: i64,
}

fn default_order_limit() -> i64 {
    100
}

/// POST /api/paper-trading/orders
/// Place a simulated order. MARKET orders fill at the live tape.
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(order): Json<OrderCreate>,
) -> Response {
    match state.engine.place_order(user.id, order).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /api/paper-trading/orders
pub async fn get_orders(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<OrdersQuery>,
) -> Response {
    let limit = params.limit.clamp(1, 500);
    match state.engine.get_user_orders(user.id, limit).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => engine_error(e),
    }
}

/// DELETE /api/paper-trading/orders/:order_id
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(order_id): Path<i32>,
) -> Response {
    match state.engine.cancel_order(order_id, user.id).await {
        Ok(true) => Json(serde_json::json!({
            "message": "Order cancelled successfully"
        }))
        .into_response(),
        Ok(false) => not_found("Order not found or cannot be cancelled"),
        Err(e) => engine_error(e),
    }
}

/// GET /api/paper-trading/positions
pub async fn get_positions(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Response {
    match state.engine.get_user_positions(user.id).await {
        Ok(positions) => Json(positions).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /api/paper-trading/wallet
pub async fn get_wallet(State(state): State<Arc<AppState>>, AuthUser(user): AuthUser) -> Response {
    match state.db.get_wallet(user.id).await {
        Ok(wallet) => Json(wallet).into_response(),
        Err(DbError::NotFound) => not_found("Wallet not found"),
        Err(e) => db_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: f64,
}

/// POST /api/paper-trading/wallet/deposit
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<AmountRequest>,
) -> Response {
    if req.amount <= 0.0 || !req.amount.is_finite() {
        return bad_request("Amount must be greater than zero");
    }

    match state.db.deposit(user.id, req.amount).await {
        Ok(wallet) => {
            info!(
                "Simulated deposit of {} for user {}",
                crate::inr::format_currency(req.amount),
                user.id
            );
            Json(wallet).into_response()
        }
        Err(e) => db_error(e),
    }
}

/// POST /api/paper-trading/wallet/withdraw
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<AmountRequest>,
) -> Response {
    if req.amount <= 0.0 || !req.amount.is_finite() {
        return bad_request("Amount must be greater than zero");
    }

    match state.db.withdraw(user.id, req.amount).await {
        Ok(wallet) => Json(wallet).into_response(),
        Err(e) => db_error(e),
    }
}

/// GET /api/paper-trading/portfolio
pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Response {
    match state.engine.get_portfolio_summary(user.id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => engine_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChargesQuery {
    pub order_value: f64,
    pub side: String,
}

/// GET /api/paper-trading/charges
/// Itemized charge estimate for the order ticket.
pub async fn get_charges(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Query(params): Query<ChargesQuery>,
) -> Response {
    if params.order_value <= 0.0 || !params.order_value.is_finite() {
        return bad_request("order_value must be greater than zero");
    }
    let Some(side) = OrderSide::parse(&params.side.to_ascii_uppercase()) else {
        return bad_request("side must be BUY or SELL");
    };

    let breakdown = state.engine.charge_estimate(params.order_value, side);
    Json(serde_json::json!({
        "success": true,
        "data": breakdown
    }))
    .into_response()
}

// ==========================================
// Market Data Handlers
// ==========================================

#[derive(Debug, Deserialize)]
pub struct CandlesQuery {
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_candle_limit")]
    pub limit: usize,
}

fn default_timeframe() -> String {
    "5minute".to_string()
}

fn default_candle_limit() -> usize {
    200
}

/// GET /api/candles
pub async fn get_candles(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Query(params): Query<CandlesQuery>,
) -> Response {
    let Some(timeframe) = Timeframe::parse(&params.timeframe) else {
        return bad_request(&format!("Unknown timeframe: {}", params.timeframe));
    };
    let limit = params.limit.clamp(1, 1000);

    // Make sure the symbol ticks from now on
    state.market.subscribe_symbol(&params.symbol, None);

    let candles = state.market.candle_history(&params.symbol, timeframe, limit);
    Json(candles).into_response()
}

#[derive(Debug, Deserialize)]
pub struct QuotesQuery {
    /// Comma-separated symbol list
    pub symbols: String,
}

/// GET /api/candles/quotes
/// Watchlist quotes with the day-change derivation.
pub async fn get_quotes(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Query(params): Query<QuotesQuery>,
) -> Response {
    let quotes: Vec<_> = params
        .symbols
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|symbol| state.market.watchlist_quote(symbol))
        .collect();

    Json(serde_json::json!({
        "success": true,
        "data": quotes
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub expiry_date: Option<String>,
}

/// GET /api/candles/options-chain/:symbol
pub async fn get_options_chain(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(symbol): Path<String>,
    Query(params): Query<ChainQuery>,
) -> Response {
    let Some(underlying) = Underlying::parse(&symbol) else {
        return bad_request("Symbol must be NIFTY or BANKNIFTY");
    };

    let chain = state
        .market
        .options_chain(underlying, params.expiry_date.as_deref());
    Json(chain).into_response()
}

#[derive(Debug, Deserialize)]
pub struct InstrumentsQuery {
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

fn default_exchange() -> String {
    "NFO".to_string()
}

/// GET /api/candles/instruments
/// NIFTY and BANKNIFTY option contracts for the order ticket search box.
pub async fn get_instruments(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Query(params): Query<InstrumentsQuery>,
) -> Response {
    if params.exchange != "NFO" {
        return bad_request("Only the NFO exchange is available");
    }

    let mut instruments = state.market.instruments(Underlying::Nifty);
    instruments.extend(state.market.instruments(Underlying::BankNifty));

    Json(serde_json::json!({
        "exchange": params.exchange,
        "count": instruments.len(),
        "instruments": instruments
    }))
    .into_response()
}

// ==========================================
// Tournament Handlers
// ==========================================

#[derive(Debug, Deserialize)]
pub struct TournamentsQuery {
    pub status_filter: Option<String>,
}

/// GET /api/tournaments
/// Status is derived from the clock; the stored column only wins for
/// CANCELLED.
pub async fn get_tournaments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TournamentsQuery>,
) -> Response {
    if let Some(ref filter) = params.status_filter {
        if !matches!(
            filter.as_str(),
            "UPCOMING" | "REGISTRATION_OPEN" | "ACTIVE" | "COMPLETED"
        ) {
            return bad_request("Invalid status filter");
        }
    }

    let now = Utc::now();
    match state
        .db
        .list_tournaments(params.status_filter.as_deref(), now)
        .await
    {
        Ok(mut tournaments) => {
            for tournament in tournaments.iter_mut() {
                tournament.status = tournament.derived_status(now);
            }
            Json(tournaments).into_response()
        }
        Err(e) => db_error(e),
    }
}

/// GET /api/tournaments/:id
pub async fn get_tournament(
    State(state): State<Arc<AppState>>,
    Path(tournament_id): Path<i32>,
) -> Response {
    match state.db.get_tournament(tournament_id).await {
        Ok(Some(mut tournament)) => {
            tournament.status = tournament.derived_status(Utc::now());
            Json(tournament).into_response()
        }
        Ok(None) => not_found("Tournament not found"),
        Err(e) => db_error(e),
    }
}

/// POST /api/tournaments/:id/join
pub async fn join_tournament(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(tournament_id): Path<i32>,
) -> Response {
    let tournament = match state.db.get_tournament(tournament_id).await {
        Ok(Some(t)) => t,
        Ok(None) => return not_found("Tournament not found"),
        Err(e) => return db_error(e),
    };

    if tournament.tournament_type == TournamentType::Team {
        return bad_request("This is a team tournament. Create or join a team to participate");
    }

    if !tournament.is_registration_open(Utc::now()) {
        return bad_request("Registration is closed for this tournament");
    }

    match state.db.get_participant(tournament_id, user.id).await {
        Ok(Some(_)) => return bad_request("Already registered for this tournament"),
        Ok(None) => {}
        Err(e) => return db_error(e),
    }

    match state.db.join_tournament(&tournament, user.id).await {
        Ok(participant) => {
            info!("User {} joined tournament {}", user.id, tournament_id);
            Json(serde_json::json!({
                "message": "Successfully joined tournament",
                "tournament_id": tournament_id,
                "starting_balance": participant.starting_balance
            }))
            .into_response()
        }
        Err(e) => db_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_leaderboard_limit")]
    pub limit: i64,
}

fn default_leaderboard_limit() -> i64 {
    100
}

/// GET /api/tournaments/:id/leaderboard
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(tournament_id): Path<i32>,
    Query(params): Query<LeaderboardQuery>,
) -> Response {
    match state.db.get_tournament(tournament_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Tournament not found"),
        Err(e) => return db_error(e),
    }

    let limit = params.limit.clamp(1, 500);
    match state.db.get_leaderboard(tournament_id, limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => db_error(e),
    }
}

/// GET /api/tournaments/:id/my-rank
pub async fn get_my_rank(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(tournament_id): Path<i32>,
) -> Response {
    match state.db.get_user_rank(tournament_id, user.id).await {
        Ok(Some(ranking)) => Json(ranking).into_response(),
        Ok(None) => not_found("You are not participating in this tournament"),
        Err(e) => db_error(e),
    }
}

/// GET /api/tournaments/my/tournaments
pub async fn get_my_tournaments(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Response {
    let now = Utc::now();
    match state.db.get_user_tournaments(user.id).await {
        Ok(mut tournaments) => {
            for tournament in tournaments.iter_mut() {
                tournament.status = tournament.derived_status(now);
            }
            Json(tournaments).into_response()
        }
        Err(e) => db_error(e),
    }
}

/// POST /api/tournaments (admin)
pub async fn create_tournament(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(data): Json<TournamentCreate>,
) -> Response {
    if data.name.trim().is_empty() {
        return bad_request("Tournament name is required");
    }
    if data.end_date <= data.start_date {
        return bad_request("End date must be after start date");
    }
    if data.registration_deadline > data.start_date {
        return bad_request("Registration deadline must not be after the start date");
    }
    if data.starting_balance <= 0.0 {
        return bad_request("Starting balance must be greater than zero");
    }
    if data.tournament_type == TournamentType::Team && data.team_size.unwrap_or(0) < 2 {
        return bad_request("Team tournaments need a team size of at least 2");
    }

    match state.db.create_tournament(&data, admin.id).await {
        Ok(tournament) => {
            info!(
                "Tournament created: {} (ID: {})",
                tournament.name, tournament.id
            );
            (StatusCode::CREATED, Json(tournament)).into_response()
        }
        Err(e) => db_error(e),
    }
}

/// POST /api/tournaments/:id/start (admin)
pub async fn start_tournament(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(tournament_id): Path<i32>,
) -> Response {
    match state
        .db
        .set_tournament_status(tournament_id, TournamentStatus::Active)
        .await
    {
        Ok(Some(tournament)) => {
            info!("Tournament started: {}", tournament_id);
            Json(tournament).into_response()
        }
        Ok(None) => not_found("Tournament not found"),
        Err(e) => db_error(e),
    }
}

/// POST /api/tournaments/:id/end (admin)
/// Marks completion and runs a final ranking pass.
pub async fn end_tournament(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(tournament_id): Path<i32>,
) -> Response {
    let tournament = match state
        .db
        .set_tournament_status(tournament_id, TournamentStatus::Completed)
        .await
    {
        Ok(Some(t)) => t,
        Ok(None) => return not_found("Tournament not found"),
        Err(e) => return db_error(e),
    };

    if let Err(e) = state.db.update_rankings(tournament_id).await {
        return db_error(e);
    }

    info!("Tournament ended: {}", tournament_id);
    Json(tournament).into_response()
}

// ==========================================
// Team Handlers
// ==========================================

/// POST /api/tournaments/:id/teams
pub async fn create_team(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(tournament_id): Path<i32>,
    Json(data): Json<crate::db::TeamCreate>,
) -> Response {
    if data.name.trim().len() < 3 {
        return bad_request("Team name must be at least 3 characters");
    }

    let tournament = match state.db.get_tournament(tournament_id).await {
        Ok(Some(t)) => t,
        Ok(None) => return not_found("Tournament not found"),
        Err(e) => return db_error(e),
    };

    if tournament.tournament_type != TournamentType::Team {
        return bad_request("This is a solo tournament");
    }
    if !tournament.is_registration_open(Utc::now()) {
        return bad_request("Registration is closed for this tournament");
    }

    match state
        .db
        .create_team(tournament_id, data.name.trim(), user.id)
        .await
    {
        Ok(team) => {
            info!("Team created: {} (ID: {})", team.name, team.id);
            (StatusCode::CREATED, Json(team)).into_response()
        }
        Err(e) => db_error(e),
    }
}

/// POST /api/teams/:id/join
pub async fn join_team(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<i32>,
) -> Response {
    let team = match state.db.get_team(team_id).await {
        Ok(Some(t)) => t,
        Ok(None) => return not_found("Team not found"),
        Err(e) => return db_error(e),
    };

    let tournament = match state.db.get_tournament(team.tournament_id).await {
        Ok(Some(t)) => t,
        Ok(None) => return not_found("Tournament not found"),
        Err(e) => return db_error(e),
    };

    if !tournament.is_registration_open(Utc::now()) {
        return bad_request("Registration is closed for this tournament");
    }

    let team_size = tournament.team_size.unwrap_or(2);
    match state.db.join_team(team_id, user.id, team_size).await {
        Ok(team) => Json(serde_json::json!({
            "message": "Successfully joined team",
            "team": team
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

/// GET /api/tournaments/:id/teams
pub async fn list_teams(
    State(state): State<Arc<AppState>>,
    Path(tournament_id): Path<i32>,
) -> Response {
    match state.db.list_teams(tournament_id).await {
        Ok(teams) => Json(teams).into_response(),
        Err(e) => db_error(e),
    }
}
