//! Database module for PostgreSQL operations using SQLx
//! Uses runtime query checking (no compile-time DATABASE_URL needed)

mod models;

pub use models::*;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        info!("Database pool created with max 10 connections");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema on startup. Idempotent.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                is_admin BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                balance DOUBLE PRECISION NOT NULL DEFAULT 0,
                currency TEXT NOT NULL DEFAULT 'INR',
                total_deposits DOUBLE PRECISION NOT NULL DEFAULT 0,
                total_withdrawals DOUBLE PRECISION NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS paper_orders (
                id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                symbol TEXT NOT NULL,
                instrument_type TEXT NOT NULL,
                instrument_token BIGINT,
                order_type TEXT NOT NULL,
                order_side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price DOUBLE PRECISION,
                trigger_price DOUBLE PRECISION,
                executed_price DOUBLE PRECISION,
                executed_quantity INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'PENDING',
                stop_loss DOUBLE PRECISION,
                take_profit DOUBLE PRECISION,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                executed_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_paper_orders_user
                ON paper_orders (user_id, created_at DESC)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS paper_positions (
                id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                symbol TEXT NOT NULL,
                instrument_type TEXT NOT NULL,
                instrument_token BIGINT,
                quantity INTEGER NOT NULL,
                average_price DOUBLE PRECISION NOT NULL,
                current_price DOUBLE PRECISION,
                unrealized_pnl DOUBLE PRECISION NOT NULL DEFAULT 0,
                realized_pnl DOUBLE PRECISION NOT NULL DEFAULT 0,
                stop_loss DOUBLE PRECISION,
                take_profit DOUBLE PRECISION,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (user_id, symbol)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tournaments (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'UPCOMING',
                tournament_type TEXT NOT NULL DEFAULT 'SOLO',
                team_size INTEGER,
                entry_fee DOUBLE PRECISION NOT NULL DEFAULT 0,
                prize_pool DOUBLE PRECISION NOT NULL,
                starting_balance DOUBLE PRECISION NOT NULL DEFAULT 100000,
                max_participants INTEGER,
                current_participants INTEGER NOT NULL DEFAULT 0,
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ NOT NULL,
                registration_deadline TIMESTAMPTZ NOT NULL,
                rules TEXT,
                created_by INTEGER,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id SERIAL PRIMARY KEY,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                captain_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (tournament_id, name)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS team_members (
                id SERIAL PRIMARY KEY,
                team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (team_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tournament_participants (
                id SERIAL PRIMARY KEY,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
                user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                team_id INTEGER REFERENCES teams(id) ON DELETE CASCADE,
                entry_fee_paid BOOLEAN NOT NULL DEFAULT FALSE,
                starting_balance DOUBLE PRECISION NOT NULL,
                current_balance DOUBLE PRECISION NOT NULL,
                total_pnl DOUBLE PRECISION NOT NULL DEFAULT 0,
                total_trades INTEGER NOT NULL DEFAULT 0,
                winning_trades INTEGER NOT NULL DEFAULT 0,
                losing_trades INTEGER NOT NULL DEFAULT 0,
                joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_trade_at TIMESTAMPTZ,
                UNIQUE (tournament_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tournament_rankings (
                id SERIAL PRIMARY KEY,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                rank INTEGER NOT NULL,
                total_pnl DOUBLE PRECISION NOT NULL DEFAULT 0,
                roi DOUBLE PRECISION NOT NULL DEFAULT 0,
                total_trades INTEGER NOT NULL DEFAULT 0,
                win_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
                current_balance DOUBLE PRECISION NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (tournament_id, user_id)
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_tournament_rank
                ON tournament_rankings (tournament_id, rank)
            "#,
        ];

        for stmt in statements {
            sqlx::query(stmt).execute(self.pool()).await?;
        }

        info!("Database schema ready");
        Ok(())
    }

    // ==========================================
    // User Operations
    // ==========================================

    /// Create a user together with a seeded wallet.
    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        initial_balance: f64,
    ) -> Result<User, DbError> {
        if self.get_user_by_email(email).await?.is_some() {
            return Err(DbError::InvalidData("Email already registered".to_string()));
        }
        if self.get_user_by_username(username).await?.is_some() {
            return Err(DbError::InvalidData("Username already taken".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (email, username, password_hash, is_active, is_admin)
            VALUES ($1, $2, $3, TRUE, FALSE)
            RETURNING id, email, username, password_hash, is_active, is_admin,
                      created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await?;

        let user = User::from_row(&row)?;

        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance, currency, total_deposits)
            VALUES ($1, $2, 'INR', $2)
            "#,
        )
        .bind(user.id)
        .bind(initial_balance)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: i32) -> Result<Option<User>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, username, password_hash, is_active, is_admin,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(User::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, username, password_hash, is_active, is_admin,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(User::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, username, password_hash, is_active, is_admin,
                   created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(User::from_row(&row)?)),
            None => Ok(None),
        }
    }

    // ==========================================
    // Wallet Operations
    // ==========================================

    pub async fn get_wallet(&self, user_id: i32) -> Result<Wallet, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, balance, currency, total_deposits, total_withdrawals,
                   created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Wallet::from_row(&row)?),
            None => Err(DbError::NotFound),
        }
    }

    /// Simulated deposit: credit balance and bump the running total.
    pub async fn deposit(&self, user_id: i32, amount: f64) -> Result<Wallet, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                total_deposits = total_deposits + $2,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING id, user_id, balance, currency, total_deposits, total_withdrawals,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Wallet::from_row(&row)?),
            None => Err(DbError::NotFound),
        }
    }

    /// Simulated withdrawal. Fails when the balance would go negative.
    pub async fn withdraw(&self, user_id: i32, amount: f64) -> Result<Wallet, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance - $2,
                total_withdrawals = total_withdrawals + $2,
                updated_at = NOW()
            WHERE user_id = $1 AND balance >= $2
            RETURNING id, user_id, balance, currency, total_deposits, total_withdrawals,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Wallet::from_row(&row)?),
            None => Err(DbError::InvalidData("Insufficient balance".to_string())),
        }
    }

    /// Apply an execution cashflow (negative debits, positive credits).
    pub async fn apply_cashflow(&self, user_id: i32, delta: f64) -> Result<Wallet, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING id, user_id, balance, currency, total_deposits, total_withdrawals,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Wallet::from_row(&row)?),
            None => Err(DbError::NotFound),
        }
    }

    // ==========================================
    // Paper Order Operations
    // ==========================================

    pub async fn insert_order(
        &self,
        user_id: i32,
        order: &OrderCreate,
        status: OrderStatus,
    ) -> Result<PaperOrder, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO paper_orders (
                user_id, symbol, instrument_type, instrument_token,
                order_type, order_side, quantity, price, trigger_price,
                stop_loss, take_profit, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, user_id, symbol, instrument_type, instrument_token,
                      order_type, order_side, quantity, price, trigger_price,
                      executed_price, executed_quantity, status, stop_loss, take_profit,
                      created_at, executed_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&order.symbol)
        .bind(order.instrument_type.as_str())
        .bind(order.instrument_token)
        .bind(order.order_type.as_str())
        .bind(order.order_side.as_str())
        .bind(order.quantity)
        .bind(order.price)
        .bind(order.trigger_price)
        .bind(order.stop_loss)
        .bind(order.take_profit)
        .bind(status.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(PaperOrder::from_row(&row)?)
    }

    pub async fn mark_order_executed(
        &self,
        order_id: i32,
        executed_price: f64,
        executed_quantity: i32,
    ) -> Result<PaperOrder, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE paper_orders
            SET executed_price = $2,
                executed_quantity = $3,
                status = 'EXECUTED',
                executed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, symbol, instrument_type, instrument_token,
                      order_type, order_side, quantity, price, trigger_price,
                      executed_price, executed_quantity, status, stop_loss, take_profit,
                      created_at, executed_at, updated_at
            "#,
        )
        .bind(order_id)
        .bind(executed_price)
        .bind(executed_quantity)
        .fetch_one(self.pool())
        .await?;

        Ok(PaperOrder::from_row(&row)?)
    }

    /// Order history, most recent first
    pub async fn get_orders(&self, user_id: i32, limit: i64) -> Result<Vec<PaperOrder>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, symbol, instrument_type, instrument_token,
                   order_type, order_side, quantity, price, trigger_price,
                   executed_price, executed_quantity, status, stop_loss, take_profit,
                   created_at, executed_at, updated_at
            FROM paper_orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(PaperOrder::from_row(&row)?);
        }
        Ok(orders)
    }

    /// Cancel a pending or open order. Returns None when the order does not
    /// exist, belongs to someone else, or is no longer cancellable.
    pub async fn cancel_order(
        &self,
        order_id: i32,
        user_id: i32,
    ) -> Result<Option<PaperOrder>, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE paper_orders
            SET status = 'CANCELLED', updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status IN ('PENDING', 'OPEN')
            RETURNING id, user_id, symbol, instrument_type, instrument_token,
                      order_type, order_side, quantity, price, trigger_price,
                      executed_price, executed_quantity, status, stop_loss, take_profit,
                      created_at, executed_at, updated_at
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(PaperOrder::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn count_executed_orders(&self, user_id: i32) -> Result<i64, DbError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM paper_orders
            WHERE user_id = $1 AND status = 'EXECUTED'
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0)
    }

    // ==========================================
    // Paper Position Operations
    // ==========================================

    pub async fn get_positions(&self, user_id: i32) -> Result<Vec<PaperPosition>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, symbol, instrument_type, instrument_token,
                   quantity, average_price, current_price, unrealized_pnl, realized_pnl,
                   stop_loss, take_profit, created_at, updated_at
            FROM paper_positions
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let mut positions = Vec::new();
        for row in rows {
            positions.push(PaperPosition::from_row(&row)?);
        }
        Ok(positions)
    }

    pub async fn get_position(
        &self,
        user_id: i32,
        symbol: &str,
    ) -> Result<Option<PaperPosition>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, symbol, instrument_type, instrument_token,
                   quantity, average_price, current_price, unrealized_pnl, realized_pnl,
                   stop_loss, take_profit, created_at, updated_at
            FROM paper_positions
            WHERE user_id = $1 AND symbol = $2
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(PaperPosition::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn insert_position(&self, position: &NewPosition<'_>) -> Result<PaperPosition, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO paper_positions (
                user_id, symbol, instrument_type, instrument_token,
                quantity, average_price, current_price, stop_loss, take_profit
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, symbol, instrument_type, instrument_token,
                      quantity, average_price, current_price, unrealized_pnl, realized_pnl,
                      stop_loss, take_profit, created_at, updated_at
            "#,
        )
        .bind(position.user_id)
        .bind(position.symbol)
        .bind(position.instrument_type.as_str())
        .bind(position.instrument_token)
        .bind(position.quantity)
        .bind(position.average_price)
        .bind(position.current_price)
        .bind(position.stop_loss)
        .bind(position.take_profit)
        .fetch_one(self.pool())
        .await?;

        Ok(PaperPosition::from_row(&row)?)
    }

    pub async fn update_position(
        &self,
        position_id: i32,
        quantity: i32,
        average_price: f64,
        current_price: f64,
        unrealized_pnl: f64,
        realized_pnl: f64,
    ) -> Result<PaperPosition, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE paper_positions
            SET quantity = $2,
                average_price = $3,
                current_price = $4,
                unrealized_pnl = $5,
                realized_pnl = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, symbol, instrument_type, instrument_token,
                      quantity, average_price, current_price, unrealized_pnl, realized_pnl,
                      stop_loss, take_profit, created_at, updated_at
            "#,
        )
        .bind(position_id)
        .bind(quantity)
        .bind(average_price)
        .bind(current_price)
        .bind(unrealized_pnl)
        .bind(realized_pnl)
        .fetch_one(self.pool())
        .await?;

        Ok(PaperPosition::from_row(&row)?)
    }

    /// Refresh mark price and unrealized P&L only
    pub async fn update_position_price(
        &self,
        position_id: i32,
        current_price: f64,
        unrealized_pnl: f64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE paper_positions
            SET current_price = $2, unrealized_pnl = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(position_id)
        .bind(current_price)
        .bind(unrealized_pnl)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn delete_position(&self, position_id: i32) -> Result<(), DbError> {
        sqlx::query("DELETE FROM paper_positions WHERE id = $1")
            .bind(position_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    // ==========================================
    // Tournament Operations
    // ==========================================

    pub async fn create_tournament(
        &self,
        data: &TournamentCreate,
        created_by: i32,
    ) -> Result<Tournament, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO tournaments (
                name, description, status, tournament_type, team_size,
                entry_fee, prize_pool, starting_balance, max_participants,
                start_date, end_date, registration_deadline, rules, created_by
            )
            VALUES ($1, $2, 'REGISTRATION_OPEN', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, name, description, status, tournament_type, team_size,
                      entry_fee, prize_pool, starting_balance, max_participants,
                      current_participants, start_date, end_date, registration_deadline,
                      rules, created_by, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.tournament_type.as_str())
        .bind(data.team_size)
        .bind(data.entry_fee)
        .bind(data.prize_pool)
        .bind(data.starting_balance)
        .bind(data.max_participants)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.registration_deadline)
        .bind(&data.rules)
        .bind(created_by)
        .fetch_one(self.pool())
        .await?;

        Ok(Tournament::from_row(&row)?)
    }

    /// List tournaments by wall-clock status. No filter hides completed ones.
    pub async fn list_tournaments(
        &self,
        status_filter: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Tournament>, DbError> {
        let base = r#"
            SELECT id, name, description, status, tournament_type, team_size,
                   entry_fee, prize_pool, starting_balance, max_participants,
                   current_participants, start_date, end_date, registration_deadline,
                   rules, created_by, created_at, updated_at
            FROM tournaments
        "#;

        let query = match status_filter {
            Some("UPCOMING") => format!("{} WHERE start_date > $1 ORDER BY created_at DESC", base),
            Some("ACTIVE") => format!(
                "{} WHERE start_date <= $1 AND end_date > $1 ORDER BY created_at DESC",
                base
            ),
            Some("COMPLETED") => format!("{} WHERE end_date <= $1 ORDER BY created_at DESC", base),
            _ => format!("{} WHERE end_date > $1 ORDER BY created_at DESC", base),
        };

        let rows = sqlx::query(&query).bind(now).fetch_all(self.pool()).await?;

        let mut tournaments = Vec::new();
        for row in rows {
            tournaments.push(Tournament::from_row(&row)?);
        }
        Ok(tournaments)
    }

    pub async fn get_tournament(&self, tournament_id: i32) -> Result<Option<Tournament>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, status, tournament_type, team_size,
                   entry_fee, prize_pool, starting_balance, max_participants,
                   current_participants, start_date, end_date, registration_deadline,
                   rules, created_by, created_at, updated_at
            FROM tournaments
            WHERE id = $1
            "#,
        )
        .bind(tournament_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(Tournament::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn set_tournament_status(
        &self,
        tournament_id: i32,
        status: TournamentStatus,
    ) -> Result<Option<Tournament>, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE tournaments
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, status, tournament_type, team_size,
                      entry_fee, prize_pool, starting_balance, max_participants,
                      current_participants, start_date, end_date, registration_deadline,
                      rules, created_by, created_at, updated_at
            "#,
        )
        .bind(tournament_id)
        .bind(status.as_str())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(Tournament::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Register a user for a solo tournament: participant row, seat count,
    /// and an initial ranking entry, atomically.
    pub async fn join_tournament(
        &self,
        tournament: &Tournament,
        user_id: i32,
    ) -> Result<TournamentParticipant, DbError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO tournament_participants (
                tournament_id, user_id, entry_fee_paid,
                starting_balance, current_balance
            )
            VALUES ($1, $2, TRUE, $3, $3)
            RETURNING id, tournament_id, user_id, team_id, entry_fee_paid,
                      starting_balance, current_balance, total_pnl,
                      total_trades, winning_trades, losing_trades,
                      joined_at, last_trade_at
            "#,
        )
        .bind(tournament.id)
        .bind(user_id)
        .bind(tournament.starting_balance)
        .fetch_one(&mut *tx)
        .await?;

        let participant = TournamentParticipant::from_row(&row)?;

        let seat: (i32,) = sqlx::query_as(
            r#"
            UPDATE tournaments
            SET current_participants = current_participants + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING current_participants
            "#,
        )
        .bind(tournament.id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO tournament_rankings (tournament_id, user_id, rank, current_balance)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(tournament.id)
        .bind(user_id)
        .bind(seat.0)
        .bind(tournament.starting_balance)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(participant)
    }

    pub async fn get_participant(
        &self,
        tournament_id: i32,
        user_id: i32,
    ) -> Result<Option<TournamentParticipant>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, tournament_id, user_id, team_id, entry_fee_paid,
                   starting_balance, current_balance, total_pnl,
                   total_trades, winning_trades, losing_trades,
                   joined_at, last_trade_at
            FROM tournament_participants
            WHERE tournament_id = $1 AND user_id = $2
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(TournamentParticipant::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Tournaments the user has joined that are live right now
    pub async fn get_active_participations(
        &self,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<TournamentParticipant>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.tournament_id, p.user_id, p.team_id, p.entry_fee_paid,
                   p.starting_balance, p.current_balance, p.total_pnl,
                   p.total_trades, p.winning_trades, p.losing_trades,
                   p.joined_at, p.last_trade_at
            FROM tournament_participants p
            JOIN tournaments t ON t.id = p.tournament_id
            WHERE p.user_id = $1 AND t.start_date <= $2 AND t.end_date > $2
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(self.pool())
        .await?;

        let mut participants = Vec::new();
        for row in rows {
            participants.push(TournamentParticipant::from_row(&row)?);
        }
        Ok(participants)
    }

    /// Fold a realized trade into the participant's running stats.
    pub async fn record_participant_trade(
        &self,
        tournament_id: i32,
        user_id: i32,
        trade_pnl: f64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE tournament_participants
            SET total_trades = total_trades + 1,
                total_pnl = total_pnl + $3,
                current_balance = current_balance + $3,
                winning_trades = winning_trades + CASE WHEN $3 > 0 THEN 1 ELSE 0 END,
                losing_trades = losing_trades + CASE WHEN $3 < 0 THEN 1 ELSE 0 END,
                last_trade_at = NOW()
            WHERE tournament_id = $1 AND user_id = $2
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(trade_pnl)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Recompute the leaderboard: rank by total P&L descending.
    pub async fn update_rankings(&self, tournament_id: i32) -> Result<(), DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tournament_id, user_id, team_id, entry_fee_paid,
                   starting_balance, current_balance, total_pnl,
                   total_trades, winning_trades, losing_trades,
                   joined_at, last_trade_at
            FROM tournament_participants
            WHERE tournament_id = $1 AND user_id IS NOT NULL
            ORDER BY total_pnl DESC
            "#,
        )
        .bind(tournament_id)
        .fetch_all(self.pool())
        .await?;

        let mut tx = self.pool.begin().await?;

        for (idx, row) in rows.iter().enumerate() {
            let participant = TournamentParticipant::from_row(row)?;
            let user_id = match participant.user_id {
                Some(id) => id,
                None => continue,
            };

            sqlx::query(
                r#"
                UPDATE tournament_rankings
                SET rank = $3,
                    total_pnl = $4,
                    roi = $5,
                    total_trades = $6,
                    win_rate = $7,
                    current_balance = $8,
                    last_updated = NOW()
                WHERE tournament_id = $1 AND user_id = $2
                "#,
            )
            .bind(tournament_id)
            .bind(user_id)
            .bind((idx + 1) as i32)
            .bind(participant.total_pnl)
            .bind(participant.roi())
            .bind(participant.total_trades)
            .bind(participant.win_rate())
            .bind(participant.current_balance)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    pub async fn get_leaderboard(
        &self,
        tournament_id: i32,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT r.rank, r.user_id, u.username, r.total_pnl, r.roi,
                   r.total_trades, r.win_rate, r.current_balance, r.last_updated
            FROM tournament_rankings r
            JOIN users u ON u.id = r.user_id
            WHERE r.tournament_id = $1
            ORDER BY r.rank
            LIMIT $2
            "#,
        )
        .bind(tournament_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(LeaderboardEntry::from_row(&row)?);
        }
        Ok(entries)
    }

    pub async fn get_user_rank(
        &self,
        tournament_id: i32,
        user_id: i32,
    ) -> Result<Option<TournamentRanking>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, tournament_id, user_id, rank, total_pnl, roi,
                   total_trades, win_rate, current_balance, last_updated
            FROM tournament_rankings
            WHERE tournament_id = $1 AND user_id = $2
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(TournamentRanking::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_user_tournaments(&self, user_id: i32) -> Result<Vec<Tournament>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.description, t.status, t.tournament_type, t.team_size,
                   t.entry_fee, t.prize_pool, t.starting_balance, t.max_participants,
                   t.current_participants, t.start_date, t.end_date, t.registration_deadline,
                   t.rules, t.created_by, t.created_at, t.updated_at
            FROM tournaments t
            JOIN tournament_participants p ON p.tournament_id = t.id
            WHERE p.user_id = $1
            ORDER BY t.start_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let mut tournaments = Vec::new();
        for row in rows {
            tournaments.push(Tournament::from_row(&row)?);
        }
        Ok(tournaments)
    }

    // ==========================================
    // Team Operations
    // ==========================================

    /// Create a team; the creator joins as captain.
    pub async fn create_team(
        &self,
        tournament_id: i32,
        name: &str,
        captain_id: i32,
    ) -> Result<Team, DbError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO teams (tournament_id, name, captain_id)
            VALUES ($1, $2, $3)
            RETURNING id, tournament_id, name, captain_id, 1::bigint AS member_count, created_at
            "#,
        )
        .bind(tournament_id)
        .bind(name)
        .bind(captain_id)
        .fetch_one(&mut *tx)
        .await?;

        let team = Team::from_row(&row)?;

        sqlx::query(
            r#"
            INSERT INTO team_members (team_id, user_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(team.id)
        .bind(captain_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(team)
    }

    pub async fn get_team(&self, team_id: i32) -> Result<Option<Team>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT t.id, t.tournament_id, t.name, t.captain_id,
                   (SELECT COUNT(*) FROM team_members m WHERE m.team_id = t.id) AS member_count,
                   t.created_at
            FROM teams t
            WHERE t.id = $1
            "#,
        )
        .bind(team_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(Team::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Join a team, enforcing the tournament's team size.
    pub async fn join_team(&self, team_id: i32, user_id: i32, team_size: i32) -> Result<Team, DbError> {
        let mut tx = self.pool.begin().await?;

        // Serialize joins against this team row
        sqlx::query("SELECT id FROM teams WHERE id = $1 FOR UPDATE")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE team_id = $1")
            .bind(team_id)
            .fetch_one(&mut *tx)
            .await?;

        if count.0 >= team_size as i64 {
            return Err(DbError::InvalidData("Team is full".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO team_members (team_id, user_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_team(team_id).await?.ok_or(DbError::NotFound)
    }

    pub async fn list_teams(&self, tournament_id: i32) -> Result<Vec<Team>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.tournament_id, t.name, t.captain_id,
                   (SELECT COUNT(*) FROM team_members m WHERE m.team_id = t.id) AS member_count,
                   t.created_at
            FROM teams t
            WHERE t.tournament_id = $1
            ORDER BY t.created_at
            "#,
        )
        .bind(tournament_id)
        .fetch_all(self.pool())
        .await?;

        let mut teams = Vec::new();
        for row in rows {
            teams.push(Team::from_row(&row)?);
        }
        Ok(teams)
    }
}

/// New position to insert after an execution opens a fresh symbol
#[derive(Debug)]
pub struct NewPosition<'a> {
    pub user_id: i32,
    pub symbol: &'a str,
    pub instrument_type: InstrumentType,
    pub instrument_token: Option<i64>,
    pub quantity: i32,
    pub average_price: f64,
    pub current_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}
