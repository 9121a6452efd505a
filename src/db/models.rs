//! Database models matching the PostgreSQL schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

// ==========================================
// Enumerations (stored as TEXT)
// ==========================================

/// Order types supported in paper trading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    StopLossMarket,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopLoss => "STOP_LOSS",
            Self::StopLossMarket => "STOP_LOSS_MARKET",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MARKET" => Some(Self::Market),
            "LIMIT" => Some(Self::Limit),
            "STOP_LOSS" => Some(Self::StopLoss),
            "STOP_LOSS_MARKET" => Some(Self::StopLossMarket),
            _ => None,
        }
    }
}

/// Buy or sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// Order execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Open,
    Executed,
    PartiallyFilled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Open => "OPEN",
            Self::Executed => "EXECUTED",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "OPEN" => Some(Self::Open),
            "EXECUTED" => Some(Self::Executed),
            "PARTIALLY_FILLED" => Some(Self::PartiallyFilled),
            "CANCELLED" => Some(Self::Cancelled),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Orders that can still be cancelled or filled
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Open | Self::PartiallyFilled)
    }
}

/// Type of instrument being traded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    /// NIFTY, BANKNIFTY spot indices
    Index,
    OptionCe,
    OptionPe,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "INDEX",
            Self::OptionCe => "OPTION_CE",
            Self::OptionPe => "OPTION_PE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INDEX" => Some(Self::Index),
            "OPTION_CE" => Some(Self::OptionCe),
            "OPTION_PE" => Some(Self::OptionPe),
            _ => None,
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self, Self::OptionCe | Self::OptionPe)
    }
}

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    Upcoming,
    RegistrationOpen,
    Active,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::RegistrationOpen => "REGISTRATION_OPEN",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPCOMING" => Some(Self::Upcoming),
            "REGISTRATION_OPEN" => Some(Self::RegistrationOpen),
            "ACTIVE" => Some(Self::Active),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Solo or team competition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentType {
    Solo,
    Team,
}

impl TournamentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solo => "SOLO",
            Self::Team => "TEAM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SOLO" => Some(Self::Solo),
            "TEAM" => Some(Self::Team),
            _ => None,
        }
    }
}

fn parse_enum<T>(row: &PgRow, column: &str, parse: fn(&str) -> Option<T>) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse(&raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unrecognized value '{}'", raw).into(),
    })
}

// ==========================================
// Users & Wallets
// ==========================================

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            is_active: row.try_get("is_active")?,
            is_admin: row.try_get("is_admin")?,
            created_at: row.try_get("created_at").ok(),
            updated_at: row.try_get("updated_at").ok(),
        })
    }
}

/// Virtual wallet. Paper money only, denominated in INR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i32,
    pub user_id: i32,
    pub balance: f64,
    pub currency: String,
    pub total_deposits: f64,
    pub total_withdrawals: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Wallet {
    pub fn can_afford(&self, amount: f64) -> bool {
        self.balance >= amount
    }
}

impl<'r> FromRow<'r, PgRow> for Wallet {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            balance: row.try_get("balance")?,
            currency: row.try_get("currency")?,
            total_deposits: row.try_get("total_deposits")?,
            total_withdrawals: row.try_get("total_withdrawals")?,
            created_at: row.try_get("created_at").ok(),
            updated_at: row.try_get("updated_at").ok(),
        })
    }
}

// ==========================================
// Paper Orders & Positions
// ==========================================

/// Paper trading order. All orders are virtual; nothing reaches a broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperOrder {
    pub id: i32,
    pub user_id: i32,
    pub symbol: String,
    pub instrument_type: InstrumentType,
    pub instrument_token: Option<i64>,
    pub order_type: OrderType,
    pub order_side: OrderSide,
    pub quantity: i32,
    pub price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub executed_price: Option<f64>,
    pub executed_quantity: i32,
    pub status: OrderStatus,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaperOrder {
    /// Executed notional if filled, otherwise the limit notional
    pub fn total_value(&self) -> f64 {
        if let (Some(price), qty) = (self.executed_price, self.executed_quantity) {
            if qty > 0 {
                return price * qty as f64;
            }
        }
        self.price.map(|p| p * self.quantity as f64).unwrap_or(0.0)
    }
}

impl<'r> FromRow<'r, PgRow> for PaperOrder {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            symbol: row.try_get("symbol")?,
            instrument_type: parse_enum(row, "instrument_type", InstrumentType::parse)?,
            instrument_token: row.try_get("instrument_token").ok(),
            order_type: parse_enum(row, "order_type", OrderType::parse)?,
            order_side: parse_enum(row, "order_side", OrderSide::parse)?,
            quantity: row.try_get("quantity")?,
            price: row.try_get("price").ok(),
            trigger_price: row.try_get("trigger_price").ok(),
            executed_price: row.try_get("executed_price").ok(),
            executed_quantity: row.try_get("executed_quantity")?,
            status: parse_enum(row, "status", OrderStatus::parse)?,
            stop_loss: row.try_get("stop_loss").ok(),
            take_profit: row.try_get("take_profit").ok(),
            created_at: row.try_get("created_at").ok(),
            executed_at: row.try_get("executed_at").ok(),
            updated_at: row.try_get("updated_at").ok(),
        })
    }
}

/// Order placement request
#[derive(Debug, Clone, Deserialize)]
pub struct OrderCreate {
    pub symbol: String,
    pub instrument_type: InstrumentType,
    pub order_type: OrderType,
    pub order_side: OrderSide,
    pub quantity: i32,
    pub price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub instrument_token: Option<i64>,
}

impl OrderCreate {
    /// Form-level validation, mirrored from the order ticket
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.trim().is_empty() {
            return Err("Symbol is required".to_string());
        }
        if self.quantity <= 0 {
            return Err("Quantity must be greater than zero".to_string());
        }
        if self.order_type == OrderType::Limit && self.price.is_none() {
            return Err("Price is required for LIMIT orders".to_string());
        }
        if matches!(self.order_type, OrderType::StopLoss | OrderType::StopLossMarket)
            && self.trigger_price.is_none()
        {
            return Err("Trigger price is required for STOP_LOSS orders".to_string());
        }
        if let Some(price) = self.price {
            if price <= 0.0 {
                return Err("Price must be greater than zero".to_string());
            }
        }
        if let Some(trigger) = self.trigger_price {
            if trigger <= 0.0 {
                return Err("Trigger price must be greater than zero".to_string());
            }
        }
        Ok(())
    }
}

/// Open position. Positive quantity is long, negative is short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPosition {
    pub id: i32,
    pub user_id: i32,
    pub symbol: String,
    pub instrument_type: InstrumentType,
    pub instrument_token: Option<i64>,
    pub quantity: i32,
    pub average_price: f64,
    pub current_price: Option<f64>,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaperPosition {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    /// Current notional at the last known price (entry price if no tick yet)
    pub fn position_value(&self) -> f64 {
        let price = self.current_price.unwrap_or(self.average_price);
        self.quantity.unsigned_abs() as f64 * price
    }

    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl
    }

    /// Total P&L as a percentage of the amount invested
    pub fn pnl_percentage(&self) -> f64 {
        let investment = self.quantity.unsigned_abs() as f64 * self.average_price;
        if investment == 0.0 {
            return 0.0;
        }
        (self.total_pnl() / investment) * 100.0
    }
}

impl<'r> FromRow<'r, PgRow> for PaperPosition {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            symbol: row.try_get("symbol")?,
            instrument_type: parse_enum(row, "instrument_type", InstrumentType::parse)?,
            instrument_token: row.try_get("instrument_token").ok(),
            quantity: row.try_get("quantity")?,
            average_price: row.try_get("average_price")?,
            current_price: row.try_get("current_price").ok(),
            unrealized_pnl: row.try_get("unrealized_pnl")?,
            realized_pnl: row.try_get("realized_pnl")?,
            stop_loss: row.try_get("stop_loss").ok(),
            take_profit: row.try_get("take_profit").ok(),
            created_at: row.try_get("created_at").ok(),
            updated_at: row.try_get("updated_at").ok(),
        })
    }
}

/// Portfolio summary for the dashboard header
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub total_balance: f64,
    pub available_balance: f64,
    pub invested_amount: f64,
    pub total_pnl: f64,
    pub total_pnl_percentage: f64,
    pub open_positions_count: i64,
    pub total_trades: i64,
}

// ==========================================
// Tournaments
// ==========================================

/// Trading competition. Participants trade virtual balances; prizes are real.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub status: TournamentStatus,
    pub tournament_type: TournamentType,
    pub team_size: Option<i32>,
    pub entry_fee: f64,
    pub prize_pool: f64,
    pub starting_balance: f64,
    pub max_participants: Option<i32>,
    pub current_participants: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub rules: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// Status derived from the clock, not the stored column. The stored
    /// status only wins for CANCELLED.
    pub fn derived_status(&self, now: DateTime<Utc>) -> TournamentStatus {
        if self.status == TournamentStatus::Cancelled {
            return TournamentStatus::Cancelled;
        }
        if now >= self.end_date {
            TournamentStatus::Completed
        } else if now >= self.start_date {
            TournamentStatus::Active
        } else if now < self.registration_deadline {
            TournamentStatus::RegistrationOpen
        } else {
            TournamentStatus::Upcoming
        }
    }

    pub fn is_full(&self) -> bool {
        match self.max_participants {
            Some(max) => self.current_participants >= max,
            None => false,
        }
    }

    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        self.status == TournamentStatus::RegistrationOpen
            && now < self.registration_deadline
            && !self.is_full()
    }
}

impl<'r> FromRow<'r, PgRow> for Tournament {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description").ok(),
            status: parse_enum(row, "status", TournamentStatus::parse)?,
            tournament_type: parse_enum(row, "tournament_type", TournamentType::parse)?,
            team_size: row.try_get("team_size").ok(),
            entry_fee: row.try_get("entry_fee")?,
            prize_pool: row.try_get("prize_pool")?,
            starting_balance: row.try_get("starting_balance")?,
            max_participants: row.try_get("max_participants").ok(),
            current_participants: row.try_get("current_participants")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            registration_deadline: row.try_get("registration_deadline")?,
            rules: row.try_get("rules").ok(),
            created_by: row.try_get("created_by").ok(),
            created_at: row.try_get("created_at").ok(),
            updated_at: row.try_get("updated_at").ok(),
        })
    }
}

/// Tournament creation request (admin only)
#[derive(Debug, Clone, Deserialize)]
pub struct TournamentCreate {
    pub name: String,
    pub description: Option<String>,
    pub tournament_type: TournamentType,
    pub team_size: Option<i32>,
    #[serde(default)]
    pub entry_fee: f64,
    pub prize_pool: f64,
    pub starting_balance: f64,
    pub max_participants: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub rules: Option<String>,
}

/// A user's registration in a tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentParticipant {
    pub id: i32,
    pub tournament_id: i32,
    pub user_id: Option<i32>,
    pub team_id: Option<i32>,
    pub entry_fee_paid: bool,
    pub starting_balance: f64,
    pub current_balance: f64,
    pub total_pnl: f64,
    pub total_trades: i32,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub joined_at: Option<DateTime<Utc>>,
    pub last_trade_at: Option<DateTime<Utc>>,
}

impl TournamentParticipant {
    pub fn roi(&self) -> f64 {
        if self.starting_balance == 0.0 {
            return 0.0;
        }
        (self.total_pnl / self.starting_balance) * 100.0
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        (self.winning_trades as f64 / self.total_trades as f64) * 100.0
    }
}

impl<'r> FromRow<'r, PgRow> for TournamentParticipant {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tournament_id: row.try_get("tournament_id")?,
            user_id: row.try_get("user_id").ok(),
            team_id: row.try_get("team_id").ok(),
            entry_fee_paid: row.try_get("entry_fee_paid")?,
            starting_balance: row.try_get("starting_balance")?,
            current_balance: row.try_get("current_balance")?,
            total_pnl: row.try_get("total_pnl")?,
            total_trades: row.try_get("total_trades")?,
            winning_trades: row.try_get("winning_trades")?,
            losing_trades: row.try_get("losing_trades")?,
            joined_at: row.try_get("joined_at").ok(),
            last_trade_at: row.try_get("last_trade_at").ok(),
        })
    }
}

/// Leaderboard row, updated after every realized trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentRanking {
    pub id: i32,
    pub tournament_id: i32,
    pub user_id: i32,
    pub rank: i32,
    pub total_pnl: f64,
    pub roi: f64,
    pub total_trades: i32,
    pub win_rate: f64,
    pub current_balance: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for TournamentRanking {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tournament_id: row.try_get("tournament_id")?,
            user_id: row.try_get("user_id")?,
            rank: row.try_get("rank")?,
            total_pnl: row.try_get("total_pnl")?,
            roi: row.try_get("roi")?,
            total_trades: row.try_get("total_trades")?,
            win_rate: row.try_get("win_rate")?,
            current_balance: row.try_get("current_balance")?,
            last_updated: row.try_get("last_updated").ok(),
        })
    }
}

/// Leaderboard entry with the display name joined in
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i32,
    pub user_id: i32,
    pub username: String,
    pub total_pnl: f64,
    pub roi: f64,
    pub total_trades: i32,
    pub win_rate: f64,
    pub current_balance: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for LeaderboardEntry {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            rank: row.try_get("rank")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            total_pnl: row.try_get("total_pnl")?,
            roi: row.try_get("roi")?,
            total_trades: row.try_get("total_trades")?,
            win_rate: row.try_get("win_rate")?,
            current_balance: row.try_get("current_balance")?,
            last_updated: row.try_get("last_updated").ok(),
        })
    }
}

// ==========================================
// Teams
// ==========================================

/// Team competing in a TEAM tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i32,
    pub tournament_id: i32,
    pub name: String,
    pub captain_id: i32,
    pub member_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for Team {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tournament_id: row.try_get("tournament_id")?,
            name: row.try_get("name")?,
            captain_id: row.try_get("captain_id")?,
            member_count: row.try_get("member_count").unwrap_or(0),
            created_at: row.try_get("created_at").ok(),
        })
    }
}

/// Team creation request
#[derive(Debug, Clone, Deserialize)]
pub struct TeamCreate {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tournament(start_h: i64, end_h: i64, reg_h: i64) -> Tournament {
        let now = Utc::now();
        Tournament {
            id: 1,
            name: "Weekly NIFTY Clash".to_string(),
            description: None,
            status: TournamentStatus::RegistrationOpen,
            tournament_type: TournamentType::Solo,
            team_size: None,
            entry_fee: 0.0,
            prize_pool: 10_000.0,
            starting_balance: 100_000.0,
            max_participants: Some(2),
            current_participants: 0,
            start_date: now + Duration::hours(start_h),
            end_date: now + Duration::hours(end_h),
            registration_deadline: now + Duration::hours(reg_h),
            rules: None,
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn derived_status_follows_the_clock() {
        let now = Utc::now();
        assert_eq!(
            tournament(2, 10, 1).derived_status(now),
            TournamentStatus::RegistrationOpen
        );
        assert_eq!(
            tournament(-1, 10, -2).derived_status(now),
            TournamentStatus::Active
        );
        assert_eq!(
            tournament(-10, -1, -12).derived_status(now),
            TournamentStatus::Completed
        );
        // Registration closed but not yet started
        assert_eq!(
            tournament(2, 10, -1).derived_status(now),
            TournamentStatus::Upcoming
        );
    }

    #[test]
    fn registration_respects_capacity() {
        let now = Utc::now();
        let mut t = tournament(2, 10, 1);
        assert!(t.is_registration_open(now));
        t.current_participants = 2;
        assert!(t.is_full());
        assert!(!t.is_registration_open(now));
    }

    #[test]
    fn order_create_validation() {
        let mut order = OrderCreate {
            symbol: "NIFTY24DEC24500CE".to_string(),
            instrument_type: InstrumentType::OptionCe,
            order_type: OrderType::Market,
            order_side: OrderSide::Buy,
            quantity: 50,
            price: None,
            trigger_price: None,
            stop_loss: None,
            take_profit: None,
            instrument_token: None,
        };
        assert!(order.validate().is_ok());

        order.quantity = 0;
        assert!(order.validate().is_err());

        order.quantity = 50;
        order.order_type = OrderType::Limit;
        assert!(order.validate().is_err());
        order.price = Some(120.5);
        assert!(order.validate().is_ok());

        order.order_type = OrderType::StopLoss;
        assert!(order.validate().is_err());
        order.trigger_price = Some(118.0);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn participant_ratios() {
        let p = TournamentParticipant {
            id: 1,
            tournament_id: 1,
            user_id: Some(7),
            team_id: None,
            entry_fee_paid: true,
            starting_balance: 100_000.0,
            current_balance: 104_000.0,
            total_pnl: 4_000.0,
            total_trades: 8,
            winning_trades: 6,
            losing_trades: 2,
            joined_at: None,
            last_trade_at: None,
        };
        assert!((p.roi() - 4.0).abs() < 1e-9);
        assert!((p.win_rate() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn enum_round_trips() {
        for s in ["MARKET", "LIMIT", "STOP_LOSS", "STOP_LOSS_MARKET"] {
            assert_eq!(OrderType::parse(s).unwrap().as_str(), s);
        }
        for s in ["PENDING", "OPEN", "EXECUTED", "PARTIALLY_FILLED", "CANCELLED", "REJECTED"] {
            assert_eq!(OrderStatus::parse(s).unwrap().as_str(), s);
        }
        for s in ["INDEX", "OPTION_CE", "OPTION_PE"] {
            assert_eq!(InstrumentType::parse(s).unwrap().as_str(), s);
        }
    }
}
