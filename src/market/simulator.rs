//! Tick simulator.
//!
//! Stands in for the upstream broker feed: every 1-3 seconds each
//! registered symbol takes a random walk step of up to ±0.5%, which is
//! folded into the price cache and the candle builder and fanned out to
//! WebSocket subscribers. NO REAL MARKET DATA is involved.

use chrono::Utc;
use dashmap::DashSet;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::cache::PriceCache;
use super::candles::CandleStore;
use super::MarketEvent;
use crate::types::Tick;

pub struct PriceSimulator {
    cache: Arc<PriceCache>,
    candles: Arc<CandleStore>,
    events: broadcast::Sender<MarketEvent>,
    subscribed: DashSet<String>,
    running: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PriceSimulator {
    pub fn new(
        cache: Arc<PriceCache>,
        candles: Arc<CandleStore>,
        events: broadcast::Sender<MarketEvent>,
    ) -> Self {
        Self {
            cache,
            candles,
            events,
            subscribed: DashSet::new(),
            running: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Register a symbol for simulation; the base price seeds the cache
    /// on first sight only.
    pub fn add_symbol(&self, symbol: &str, base_price: f64) {
        self.cache.ensure_symbol(symbol, base_price);
        if self.subscribed.insert(symbol.to_string()) {
            info!("Simulator tracking {} (base ₹{:.2})", symbol, base_price);
        }
    }

    pub fn remove_symbol(&self, symbol: &str) {
        self.subscribed.remove(symbol);
        debug!("Simulator dropped {}", symbol);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the tick loop. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let sim = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!("Price simulator started");
            while sim.running.load(Ordering::Relaxed) {
                let sleep_ms = sim.step();
                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
            }
            info!("Price simulator stopped");
        });

        *self.task.lock() = Some(handle);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    /// One simulation step across all tracked symbols. Returns the delay
    /// until the next step in milliseconds.
    fn step(&self) -> u64 {
        let now = Utc::now();
        let mut ticks = Vec::new();

        {
            let mut rng = rand::thread_rng();
            for symbol in self.subscribed.iter() {
                let quote = match self.cache.get_quote(symbol.key()) {
                    Some(q) => q,
                    None => continue,
                };

                let change_pct: f64 = rng.gen_range(-0.005..0.005);
                let new_price = round2(quote.last_price * (1.0 + change_pct));
                let volume = quote.volume + rng.gen_range(100..1000);

                ticks.push(Tick {
                    symbol: symbol.key().clone(),
                    last_price: new_price,
                    volume,
                    timestamp: now,
                });
            }
        }

        for tick in ticks {
            self.cache
                .apply_tick(&tick.symbol, tick.last_price, tick.volume, tick.timestamp);

            if let Some(candle) = self
                .candles
                .process_tick(&tick.symbol, tick.last_price, tick.volume, tick.timestamp)
            {
                // Nobody listening is fine; the send result only signals that
                let _ = self.events.send(MarketEvent::CandleClosed {
                    symbol: tick.symbol.clone(),
                    candle,
                });
            }

            let _ = self.events.send(MarketEvent::Tick(tick));
        }

        let mut rng = rand::thread_rng();
        rng.gen_range(1_000..3_000)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator() -> (Arc<PriceSimulator>, broadcast::Receiver<MarketEvent>) {
        let (tx, rx) = broadcast::channel(64);
        let sim = Arc::new(PriceSimulator::new(
            Arc::new(PriceCache::new()),
            Arc::new(CandleStore::new()),
            tx,
        ));
        (sim, rx)
    }

    #[test]
    fn step_moves_prices_within_bounds() {
        let (sim, mut rx) = simulator();
        sim.add_symbol("NIFTY 50", 24_500.0);

        for _ in 0..50 {
            sim.step();
        }

        let price = sim.cache.get_price("NIFTY 50").unwrap();
        // 50 steps of at most ±0.5% each
        assert!(price > 24_500.0 * 0.995_f64.powi(50));
        assert!(price < 24_500.0 * 1.005_f64.powi(50));

        // At least one tick event was published
        let mut saw_tick = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, MarketEvent::Tick(_)) {
                saw_tick = true;
            }
        }
        assert!(saw_tick);
    }

    #[test]
    fn add_symbol_keeps_existing_price() {
        let (sim, _rx) = simulator();
        sim.add_symbol("NIFTY 50", 24_500.0);
        sim.step();
        let moved = sim.cache.get_price("NIFTY 50").unwrap();
        sim.add_symbol("NIFTY 50", 1.0);
        assert_eq!(sim.cache.get_price("NIFTY 50").unwrap(), moved);
    }

    #[test]
    fn volume_is_cumulative() {
        let (sim, _rx) = simulator();
        sim.add_symbol("NIFTY BANK", 52_000.0);
        sim.step();
        let v1 = sim.cache.get_quote("NIFTY BANK").unwrap().volume;
        sim.step();
        let v2 = sim.cache.get_quote("NIFTY BANK").unwrap().volume;
        assert!(v2 > v1);
        assert!(v1 >= 100);
    }
}
