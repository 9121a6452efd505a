//! Candle aggregation and history.
//!
//! Live ticks are folded into one-minute candles; chart history is
//! synthesized with a bounded random walk anchored at the live price,
//! clamped to market hours. The upstream data vendor is out of scope for
//! the paper platform, so synthesized history stands in for it the same
//! way the original service's fallback path did.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;

use super::hours;
use crate::inr::percentage_change;
use crate::types::{Candle, Timeframe, SESSION_MINUTES};

/// How many completed minute candles to retain per symbol
const RECORDED_CANDLE_CAP: usize = 2_000;

/// Builds fixed-interval candles from a tick stream.
///
/// Tick volume is cumulative for the day; the builder differences it per
/// tick (clamped at zero across day rollovers) so candle volume is the
/// traded amount within the bucket.
pub struct CandleBuilder {
    timeframe_seconds: i64,
    current: HashMap<String, Candle>,
    last_volume: HashMap<String, i64>,
}

impl CandleBuilder {
    pub fn new(timeframe_seconds: i64) -> Self {
        Self {
            timeframe_seconds,
            current: HashMap::new(),
            last_volume: HashMap::new(),
        }
    }

    fn bucket_start_ms(&self, ts: DateTime<Utc>) -> i64 {
        let secs = ts.timestamp();
        (secs / self.timeframe_seconds) * self.timeframe_seconds * 1000
    }

    /// Fold a tick in. Returns the completed candle when the tick opens a
    /// new bucket.
    pub fn process_tick(
        &mut self,
        symbol: &str,
        price: f64,
        volume: i64,
        ts: DateTime<Utc>,
    ) -> Option<Candle> {
        let bucket = self.bucket_start_ms(ts);

        let volume_delta = match self.last_volume.get(symbol) {
            Some(last) => (volume - last).max(0),
            None => 0,
        };
        self.last_volume.insert(symbol.to_string(), volume);

        match self.current.get_mut(symbol) {
            None => {
                self.current.insert(
                    symbol.to_string(),
                    Candle {
                        timestamp: bucket,
                        open: price,
                        high: price,
                        low: price,
                        close: price,
                        volume: volume_delta,
                    },
                );
                None
            }
            Some(current) if bucket > current.timestamp => {
                let completed = *current;
                *current = Candle {
                    timestamp: bucket,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: volume_delta,
                };
                Some(completed)
            }
            Some(current) => {
                current.high = current.high.max(price);
                current.low = current.low.min(price);
                current.close = price;
                current.volume += volume_delta;
                None
            }
        }
    }

    pub fn current_candle(&self, symbol: &str) -> Option<Candle> {
        self.current.get(symbol).copied()
    }
}

/// Thread-safe candle state: the live one-minute builder plus a capped
/// ring of completed candles per symbol.
pub struct CandleStore {
    builder: Mutex<CandleBuilder>,
    recorded: DashMap<String, Vec<Candle>>,
}

impl CandleStore {
    pub fn new() -> Self {
        Self {
            builder: Mutex::new(CandleBuilder::new(60)),
            recorded: DashMap::new(),
        }
    }

    /// Feed a tick; returns the completed minute candle, if any, for
    /// broadcasting to chart subscribers.
    pub fn process_tick(
        &self,
        symbol: &str,
        price: f64,
        volume: i64,
        ts: DateTime<Utc>,
    ) -> Option<Candle> {
        let completed = self.builder.lock().process_tick(symbol, price, volume, ts)?;

        let mut entry = self.recorded.entry(symbol.to_string()).or_default();
        entry.push(completed);
        if entry.len() > RECORDED_CANDLE_CAP {
            let excess = entry.len() - RECORDED_CANDLE_CAP;
            entry.drain(..excess);
        }

        Some(completed)
    }

    pub fn current_candle(&self, symbol: &str) -> Option<Candle> {
        self.builder.lock().current_candle(symbol)
    }

    pub fn recorded_minutes(&self, symbol: &str) -> Vec<Candle> {
        self.recorded
            .get(symbol)
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

/// Previous intraday bucket start, hopping across session boundaries.
fn prev_intraday_slot(ts: DateTime<FixedOffset>, interval_secs: i64) -> DateTime<FixedOffset> {
    let session_open = hours::market_start_time(ts);
    let candidate = ts - Duration::seconds(interval_secs);

    if candidate >= session_open {
        return candidate;
    }

    // Jump to the last full slot of the previous trading day
    let prev_session_open = hours::market_start_time(ts - Duration::days(1));
    let slots = (SESSION_MINUTES * 60) / interval_secs;
    prev_session_open + Duration::seconds((slots - 1) * interval_secs)
}

/// Align a clamped end time down to its bucket start within the session.
fn align_to_slot(end: DateTime<FixedOffset>, interval_secs: i64) -> DateTime<FixedOffset> {
    let session_open = hours::market_start_time(end);
    if end <= session_open {
        return session_open;
    }
    let elapsed = (end - session_open).num_seconds();
    let mut slot = (elapsed / interval_secs) * interval_secs;
    // The close itself starts no new bucket
    if slot >= SESSION_MINUTES * 60 {
        slot -= interval_secs;
    }
    session_open + Duration::seconds(slot)
}

/// Synthesize `limit` candles ending at the last market timestamp, walking
/// the price backwards from the live anchor so the chart meets the tape.
pub fn synthesize_history(anchor_price: f64, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
    synthesize_history_at(anchor_price, timeframe, limit, hours::now_ist())
}

pub fn synthesize_history_at(
    anchor_price: f64,
    timeframe: Timeframe,
    limit: usize,
    now: DateTime<FixedOffset>,
) -> Vec<Candle> {
    let mut rng = rand::thread_rng();
    let end = hours::market_end_time(now);

    // Build bucket timestamps newest-first
    let mut stamps = Vec::with_capacity(limit);
    match timeframe {
        Timeframe::Day => {
            let mut day = hours::market_start_time(end);
            for _ in 0..limit {
                stamps.push(day);
                day = hours::market_start_time(day - Duration::days(1));
            }
        }
        intraday => {
            let interval = intraday.seconds();
            let mut slot = align_to_slot(end, interval);
            for _ in 0..limit {
                stamps.push(slot);
                slot = prev_intraday_slot(slot, interval);
            }
        }
    }

    // Walk prices backwards from the anchor: each candle closes where the
    // next one opens.
    let mut candles = Vec::with_capacity(limit);
    let mut close = anchor_price;
    for stamp in stamps {
        let drift: f64 = rng.gen_range(-0.002..0.002);
        let open = close / (1.0 + drift);
        let top = open.max(close);
        let bottom = open.min(close);
        let high = top * (1.0 + rng.gen_range(0.0..0.001));
        let low = bottom * (1.0 - rng.gen_range(0.0..0.001));

        candles.push(Candle {
            timestamp: stamp.timestamp() * 1000,
            open: round2(open),
            high: round2(high),
            low: round2(low),
            close: round2(close),
            volume: rng.gen_range(1_000..10_000),
        });

        close = open;
    }

    candles.reverse();
    candles
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Watchlist day change from the last two daily candles.
///
/// While the market is open the most recent candle is still forming, so
/// the change compares the live price against the prior close; after hours
/// it compares the last two settled closes.
pub fn watchlist_change(
    older: &Candle,
    newer: &Candle,
    ltp: f64,
    market_open: bool,
) -> (f64, f64) {
    if market_open {
        (ltp - older.close, percentage_change(older.close, ltp))
    } else {
        (
            newer.close - older.close,
            percentage_change(older.close, newer.close),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn ticks_merge_within_a_bucket() {
        let mut builder = CandleBuilder::new(60);
        assert!(builder.process_tick("NIFTY 50", 100.0, 0, at(600)).is_none());
        assert!(builder.process_tick("NIFTY 50", 105.0, 300, at(610)).is_none());
        assert!(builder.process_tick("NIFTY 50", 98.0, 500, at(650)).is_none());

        let current = builder.current_candle("NIFTY 50").unwrap();
        assert_eq!(current.open, 100.0);
        assert_eq!(current.high, 105.0);
        assert_eq!(current.low, 98.0);
        assert_eq!(current.close, 98.0);
        // First tick carries no delta; 300 + 200 afterwards
        assert_eq!(current.volume, 500);
    }

    #[test]
    fn next_bucket_completes_the_candle() {
        let mut builder = CandleBuilder::new(60);
        builder.process_tick("NIFTY 50", 100.0, 100, at(600));
        let completed = builder.process_tick("NIFTY 50", 101.0, 150, at(661)).unwrap();

        assert_eq!(completed.timestamp, 600 * 1000);
        assert_eq!(completed.close, 100.0);

        let current = builder.current_candle("NIFTY 50").unwrap();
        assert_eq!(current.timestamp, 660 * 1000);
        assert_eq!(current.open, 101.0);
        assert_eq!(current.volume, 50);
    }

    #[test]
    fn volume_delta_clamps_at_zero() {
        let mut builder = CandleBuilder::new(60);
        builder.process_tick("NIFTY 50", 100.0, 500, at(600));
        // Day rollover: cumulative volume resets below the last seen value
        builder.process_tick("NIFTY 50", 100.5, 10, at(620));
        let current = builder.current_candle("NIFTY 50").unwrap();
        assert_eq!(current.volume, 0);
    }

    #[test]
    fn synthesized_history_is_contiguous_and_anchored() {
        let now = hours::ist_offset()
            .with_ymd_and_hms(2025, 6, 11, 11, 0, 0)
            .unwrap();
        let candles = synthesize_history_at(24_500.0, Timeframe::Minute5, 100, now);
        assert_eq!(candles.len(), 100);

        // Newest candle closes at the anchor
        assert!((candles.last().unwrap().close - 24_500.0).abs() < 0.01);

        // Each candle closes where its successor opens
        for pair in candles.windows(2) {
            assert!((pair[0].close - pair[1].open).abs() < 0.01);
            assert!(pair[0].timestamp < pair[1].timestamp);
        }

        for c in &candles {
            assert!(c.high >= c.open.max(c.close));
            assert!(c.low <= c.open.min(c.close));
        }
    }

    #[test]
    fn synthesized_daily_history_skips_weekends() {
        let now = hours::ist_offset()
            .with_ymd_and_hms(2025, 6, 11, 11, 0, 0)
            .unwrap();
        let candles = synthesize_history_at(24_500.0, Timeframe::Day, 10, now);
        for c in &candles {
            let dt = Utc.timestamp_millis_opt(c.timestamp).unwrap();
            let ist = dt.with_timezone(&hours::ist_offset());
            assert!(!matches!(
                ist.weekday(),
                chrono::Weekday::Sat | chrono::Weekday::Sun
            ));
        }
    }

    #[test]
    fn watchlist_change_branches() {
        let older = Candle {
            timestamp: 0,
            open: 24_000.0,
            high: 24_300.0,
            low: 23_900.0,
            close: 24_200.0,
            volume: 0,
        };
        let newer = Candle {
            timestamp: 86_400_000,
            open: 24_200.0,
            high: 24_500.0,
            low: 24_100.0,
            close: 24_400.0,
            volume: 0,
        };

        // Market open: live price against the prior close
        let (change, pct) = watchlist_change(&older, &newer, 24_350.0, true);
        assert!((change - 150.0).abs() < 1e-9);
        assert!((pct - (150.0 / 24_200.0 * 100.0)).abs() < 1e-9);

        // Market closed: settled close vs settled close
        let (change, pct) = watchlist_change(&older, &newer, 24_350.0, false);
        assert!((change - 200.0).abs() < 1e-9);
        assert!((pct - (200.0 / 24_200.0 * 100.0)).abs() < 1e-9);
    }
}
