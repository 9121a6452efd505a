//! In-memory quote cache keyed by symbol.
//!
//! Single writer (the simulator feed), many readers (handlers, the P&L
//! refresher, the WebSocket fan-out).

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::types::Quote;

pub struct PriceCache {
    quotes: DashMap<String, Quote>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
        }
    }

    /// Register a symbol with a base price unless it is already tracked.
    pub fn ensure_symbol(&self, symbol: &str, base_price: f64) {
        self.quotes
            .entry(symbol.to_string())
            .or_insert_with(|| Quote::new(symbol.to_string(), base_price));
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.quotes.contains_key(symbol)
    }

    /// Fold a tick into the cached quote. Unknown symbols are created on
    /// the fly so late registrations never drop data.
    pub fn apply_tick(&self, symbol: &str, price: f64, volume: i64, ts: DateTime<Utc>) {
        let mut entry = self
            .quotes
            .entry(symbol.to_string())
            .or_insert_with(|| Quote::new(symbol.to_string(), price));
        entry.apply_tick(price, volume, ts);
    }

    pub fn get_quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.get(symbol).map(|q| q.clone())
    }

    pub fn get_price(&self, symbol: &str) -> Option<f64> {
        self.quotes.get(symbol).map(|q| q.last_price)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.quotes.iter().map(|q| q.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_idempotent() {
        let cache = PriceCache::new();
        cache.ensure_symbol("NIFTY 50", 24_500.0);
        cache.apply_tick("NIFTY 50", 24_600.0, 100, Utc::now());
        cache.ensure_symbol("NIFTY 50", 24_500.0);
        assert_eq!(cache.get_price("NIFTY 50"), Some(24_600.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tick_on_unknown_symbol_creates_quote() {
        let cache = PriceCache::new();
        cache.apply_tick("NIFTY BANK", 52_100.0, 10, Utc::now());
        assert_eq!(cache.get_price("NIFTY BANK"), Some(52_100.0));
    }

    #[test]
    fn missing_symbol_is_none() {
        let cache = PriceCache::new();
        assert_eq!(cache.get_price("FINNIFTY"), None);
    }
}
