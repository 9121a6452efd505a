//! Market data: price cache, tick simulator, candles, options chains.

pub mod cache;
pub mod candles;
pub mod hours;
pub mod options;
pub mod simulator;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::inr::{format_currency, format_large_number};
use crate::types::{Candle, OptionsChain, Quote, Tick, Timeframe, Underlying};
use cache::PriceCache;
use candles::CandleStore;
use simulator::PriceSimulator;

/// Events fanned out to WebSocket subscribers
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Tick(Tick),
    CandleClosed { symbol: String, candle: Candle },
}

/// Watchlist row: live price plus the day-change derivation
#[derive(Debug, Clone, Serialize)]
pub struct WatchlistQuote {
    pub symbol: String,
    pub ltp: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: i64,
    pub ltp_display: String,
    pub volume_display: String,
}

/// Owns all live market state and the simulator driving it.
pub struct MarketHub {
    pub cache: Arc<PriceCache>,
    pub candles: Arc<CandleStore>,
    pub simulator: Arc<PriceSimulator>,
    events: broadcast::Sender<MarketEvent>,
}

impl MarketHub {
    pub fn new() -> Self {
        let cache = Arc::new(PriceCache::new());
        let candles = Arc::new(CandleStore::new());
        let (events, _) = broadcast::channel(1024);
        let simulator = Arc::new(PriceSimulator::new(
            Arc::clone(&cache),
            Arc::clone(&candles),
            events.clone(),
        ));

        // The two indices are always live
        for underlying in [Underlying::Nifty, Underlying::BankNifty] {
            simulator.add_symbol(underlying.spot_symbol(), underlying.default_base_price());
        }

        Self {
            cache,
            candles,
            simulator,
            events,
        }
    }

    pub fn start(&self) {
        self.simulator.start();
        info!("Market hub started ({} symbols)", self.cache.len());
    }

    pub fn stop(&self) {
        self.simulator.stop();
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    /// Register a symbol with the feed; unknown option symbols get a
    /// theoretical seed price derived from the live spot.
    pub fn subscribe_symbol(&self, symbol: &str, base_price: Option<f64>) {
        let base = base_price.or_else(|| self.seed_price(symbol)).unwrap_or(100.0);
        self.simulator.add_symbol(symbol, base);
    }

    pub fn unsubscribe_symbol(&self, symbol: &str) {
        self.simulator.remove_symbol(symbol);
    }

    /// Last traded price if the symbol is known, seeding it when it can be
    /// priced off the spot.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        if let Some(price) = self.cache.get_price(symbol) {
            return Some(price);
        }
        let seed = self.seed_price(symbol)?;
        self.simulator.add_symbol(symbol, seed);
        Some(seed)
    }

    pub fn quote(&self, symbol: &str) -> Option<Quote> {
        self.cache.get_quote(symbol)
    }

    fn seed_price(&self, symbol: &str) -> Option<f64> {
        if let Some(underlying) = Underlying::parse(symbol) {
            return Some(
                self.cache
                    .get_price(underlying.spot_symbol())
                    .unwrap_or_else(|| underlying.default_base_price()),
            );
        }

        let (underlying, strike, side) = options::parse_option_symbol(symbol)?;
        let spot = self
            .cache
            .get_price(underlying.spot_symbol())
            .unwrap_or_else(|| underlying.default_base_price());
        Some(options::theoretical_ltp(side, spot, strike, underlying))
    }

    /// Spot price for an underlying, seeded if the feed has not started.
    pub fn spot_price(&self, underlying: Underlying) -> f64 {
        self.cache
            .get_price(underlying.spot_symbol())
            .unwrap_or_else(|| underlying.default_base_price())
    }

    /// Candle history for the chart: recorded minute candles when we have
    /// them, synthesized history otherwise.
    pub fn candle_history(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        let anchor = self.price(symbol).unwrap_or(100.0);

        if timeframe == Timeframe::Minute {
            let recorded = self.candles.recorded_minutes(symbol);
            if recorded.len() >= limit {
                return recorded[recorded.len() - limit..].to_vec();
            }
            if !recorded.is_empty() {
                // Synthesize the tail and splice the real candles on top
                let mut history =
                    candles::synthesize_history(anchor, timeframe, limit - recorded.len());
                history.retain(|c| c.timestamp < recorded[0].timestamp);
                history.extend(recorded);
                return history;
            }
        }

        candles::synthesize_history(anchor, timeframe, limit)
    }

    /// Watchlist quote with the market-open/closed day-change branches.
    pub fn watchlist_quote(&self, symbol: &str) -> Option<WatchlistQuote> {
        let ltp = self.price(symbol)?;
        let quote = self.cache.get_quote(symbol)?;

        let daily = self.candle_history(symbol, Timeframe::Day, 2);
        let market_open = hours::is_market_open(&hours::now_ist());

        let (change, change_percent) = match daily.as_slice() {
            [older, newer] => candles::watchlist_change(older, newer, ltp, market_open),
            _ => (0.0, 0.0),
        };

        Some(WatchlistQuote {
            symbol: symbol.to_string(),
            ltp,
            change,
            change_percent,
            volume: quote.volume,
            ltp_display: format_currency(ltp),
            volume_display: format_large_number(quote.volume as f64),
        })
    }

    /// Options chain for an underlying at the given (or next weekly) expiry.
    pub fn options_chain(&self, underlying: Underlying, expiry: Option<&str>) -> OptionsChain {
        let expiry = expiry
            .map(|e| e.to_string())
            .unwrap_or_else(options::default_expiry);
        options::build_chain(underlying, self.spot_price(underlying), &expiry)
    }

    pub fn instruments(&self, underlying: Underlying) -> Vec<crate::types::Instrument> {
        let expiry = options::default_expiry();
        options::build_instruments(underlying, self.spot_price(underlying), &expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_seeds_indices() {
        let hub = MarketHub::new();
        assert!(hub.price("NIFTY 50").is_some());
        assert!(hub.price("NIFTY BANK").is_some());
    }

    #[test]
    fn unknown_option_symbol_gets_theoretical_seed() {
        let hub = MarketHub::new();
        let price = hub.price("NIFTY24DEC24500CE");
        assert!(price.is_some());
        assert!(price.unwrap() > 0.0);
        // Now tracked by the cache
        assert!(hub.cache.contains("NIFTY24DEC24500CE"));
    }

    #[test]
    fn junk_symbol_has_no_price() {
        let hub = MarketHub::new();
        assert!(hub.price("RELIANCE").is_none());
    }

    #[test]
    fn history_has_requested_length() {
        let hub = MarketHub::new();
        let candles = hub.candle_history("NIFTY 50", Timeframe::Minute5, 200);
        assert_eq!(candles.len(), 200);
    }

    #[test]
    fn watchlist_quote_present_for_index() {
        let hub = MarketHub::new();
        let quote = hub.watchlist_quote("NIFTY 50").unwrap();
        assert!(quote.ltp > 0.0);
        assert!(quote.ltp_display.starts_with('₹'));
    }
}
