//! Type definitions shared across the market data and trading modules.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Market Constants
// ============================================================================

/// NSE market open, IST (09:15)
pub const MARKET_OPEN_MINUTES: u32 = 9 * 60 + 15;

/// NSE market close, IST (15:30)
pub const MARKET_CLOSE_MINUTES: u32 = 15 * 60 + 30;

/// Trading minutes in a session (09:15 - 15:30)
pub const SESSION_MINUTES: i64 = 375;

/// IST offset from UTC in seconds (+05:30, no DST)
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Strikes shown on each side of the ATM strike in a chain response
pub const CHAIN_STRIKE_WINDOW: usize = 16;

/// A single price tick, as produced by the simulator feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub last_price: f64,
    /// Cumulative volume for the day
    pub volume: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Last known quote state for a symbol, kept in the price cache
#[derive(Debug, Clone)]
pub struct Quote {
    pub symbol: String,
    pub last_price: f64,
    pub volume: i64,
    pub day_open: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub last_update: DateTime<Utc>,
}

impl Quote {
    pub fn new(symbol: String, base_price: f64) -> Self {
        Self {
            symbol,
            last_price: base_price,
            volume: 0,
            day_open: base_price,
            day_high: base_price,
            day_low: base_price,
            last_update: Utc::now(),
        }
    }

    /// Fold a tick into the day's running OHLC
    pub fn apply_tick(&mut self, price: f64, volume: i64, ts: DateTime<Utc>) {
        self.last_price = price;
        self.volume = volume;
        self.day_high = self.day_high.max(price);
        self.day_low = self.day_low.min(price);
        self.last_update = ts;
    }

    pub fn staleness_ms(&self) -> i64 {
        (Utc::now() - self.last_update).num_milliseconds()
    }
}

/// OHLCV candle in the shape the charting frontend consumes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    /// Bucket start, epoch milliseconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Candle timeframes accepted by the candles endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Minute,
    Minute3,
    Minute5,
    Minute15,
    Minute30,
    Minute60,
    Day,
}

impl Timeframe {
    /// Parse any of the aliases the dashboard sends ("5m", "5minute", "1D", ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" | "minute" => Some(Self::Minute),
            "3m" | "3minute" => Some(Self::Minute3),
            "5m" | "5minute" => Some(Self::Minute5),
            "15m" | "15minute" => Some(Self::Minute15),
            "30m" | "30minute" => Some(Self::Minute30),
            "1h" | "4h" | "60minute" => Some(Self::Minute60),
            "1D" | "1d" | "day" => Some(Self::Day),
            _ => None,
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Minute3 => 180,
            Self::Minute5 => 300,
            Self::Minute15 => 900,
            Self::Minute30 => 1800,
            Self::Minute60 => 3600,
            Self::Day => 86_400,
        }
    }

    /// Candles per trading session, used to size the history lookback
    pub fn candles_per_session(&self) -> i64 {
        match self {
            Self::Day => 1,
            other => (SESSION_MINUTES * 60) / other.seconds(),
        }
    }
}

/// Option leg type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionSide {
    CE,
    PE,
}

/// A single row of the options chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub tradingsymbol: String,
    pub strike: f64,
    /// Expiry date as YYYY-MM-DD
    pub expiry: String,
    pub option_type: OptionSide,
    pub instrument_token: i64,
    pub ltp: f64,
    pub oi: i64,
    /// Day change percent against the previous close
    pub change: f64,
    pub volume: i64,
    pub bid: f64,
    pub ask: f64,
}

/// Full options chain snapshot returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct OptionsChain {
    pub symbol: String,
    pub spot_price: f64,
    pub expiry_date: String,
    /// The two strikes nearest to spot, ascending
    pub atm_strikes: Vec<f64>,
    pub ce_options: Vec<OptionQuote>,
    pub pe_options: Vec<OptionQuote>,
}

/// Tradable instrument row for the instruments endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Instrument {
    pub instrument_token: i64,
    pub tradingsymbol: String,
    pub name: String,
    pub expiry: String,
    pub strike: f64,
    pub instrument_type: OptionSide,
    pub exchange: String,
    pub lot_size: i32,
}

/// Underlying indices this platform serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Underlying {
    Nifty,
    BankNifty,
}

impl Underlying {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NIFTY" | "NIFTY 50" => Some(Self::Nifty),
            "BANKNIFTY" | "NIFTY BANK" => Some(Self::BankNifty),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nifty => "NIFTY",
            Self::BankNifty => "BANKNIFTY",
        }
    }

    /// Index symbol used by the tick feed and the watchlist
    pub fn spot_symbol(&self) -> &'static str {
        match self {
            Self::Nifty => "NIFTY 50",
            Self::BankNifty => "NIFTY BANK",
        }
    }

    /// Strike grid spacing on the NFO
    pub fn strike_interval(&self) -> f64 {
        match self {
            Self::Nifty => 50.0,
            Self::BankNifty => 100.0,
        }
    }

    /// Contract lot size (units per lot)
    pub fn lot_size(&self) -> i32 {
        match self {
            Self::Nifty => 50,
            Self::BankNifty => 15,
        }
    }

    /// Default base price used to seed the simulator before any tick
    pub fn default_base_price(&self) -> f64 {
        match self {
            Self::Nifty => 24_500.0,
            Self::BankNifty => 52_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_aliases_resolve() {
        assert_eq!(Timeframe::parse("5m"), Some(Timeframe::Minute5));
        assert_eq!(Timeframe::parse("5minute"), Some(Timeframe::Minute5));
        assert_eq!(Timeframe::parse("1D"), Some(Timeframe::Day));
        assert_eq!(Timeframe::parse("4h"), Some(Timeframe::Minute60));
        assert_eq!(Timeframe::parse("2h"), None);
    }

    #[test]
    fn session_candle_counts() {
        assert_eq!(Timeframe::Minute.candles_per_session(), 375);
        assert_eq!(Timeframe::Minute5.candles_per_session(), 75);
        assert_eq!(Timeframe::Minute60.candles_per_session(), 6);
        assert_eq!(Timeframe::Day.candles_per_session(), 1);
    }

    #[test]
    fn underlying_lookup() {
        assert_eq!(Underlying::parse("NIFTY"), Some(Underlying::Nifty));
        assert_eq!(Underlying::parse("nifty 50"), Some(Underlying::Nifty));
        assert_eq!(Underlying::parse("BANKNIFTY"), Some(Underlying::BankNifty));
        assert_eq!(Underlying::parse("SENSEX"), None);
    }

    #[test]
    fn quote_tracks_day_ohlc() {
        let mut q = Quote::new("NIFTY 50".to_string(), 24_500.0);
        q.apply_tick(24_550.0, 100, Utc::now());
        q.apply_tick(24_480.0, 250, Utc::now());
        assert_eq!(q.day_high, 24_550.0);
        assert_eq!(q.day_low, 24_480.0);
        assert_eq!(q.last_price, 24_480.0);
        assert_eq!(q.volume, 250);
    }
}
