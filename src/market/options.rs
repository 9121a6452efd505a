//! Options chain construction and ATM-strike selection.
//!
//! Chains are synthesized on the index strike grid around the live spot
//! price. Leg prices are intrinsic value plus a decaying time value, so
//! the chain stays consistent with the simulated spot without an upstream
//! quote vendor.

use chrono::Datelike;
use rand::Rng;

use super::hours;
use crate::inr::percentage_change;
use crate::types::{
    Instrument, OptionQuote, OptionSide, OptionsChain, Underlying, CHAIN_STRIKE_WINDOW,
};

/// The two strikes nearest to spot, ascending. Equidistant strikes resolve
/// toward the lower strike.
pub fn atm_strikes(strikes: &[f64], spot: f64) -> Vec<f64> {
    let mut by_distance: Vec<f64> = strikes.to_vec();
    by_distance.sort_by(|a, b| {
        let da = (a - spot).abs();
        let db = (b - spot).abs();
        da.partial_cmp(&db)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut atm: Vec<f64> = by_distance.into_iter().take(2).collect();
    atm.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    atm
}

/// Index of the strike nearest to spot in an ascending strike list.
/// Equidistant strikes resolve toward the lower strike.
pub fn atm_index(strikes: &[f64], spot: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::MAX;
    for (i, strike) in strikes.iter().enumerate() {
        let distance = (strike - spot).abs();
        if distance < best_distance {
            best_distance = distance;
            best = i;
        }
    }
    best
}

/// Clamp the displayed chain to ±CHAIN_STRIKE_WINDOW strikes around ATM.
pub fn visible_range(len: usize, atm_idx: usize) -> (usize, usize) {
    let start = atm_idx.saturating_sub(CHAIN_STRIKE_WINDOW);
    let end = (atm_idx + CHAIN_STRIKE_WINDOW + 1).min(len);
    (start, end)
}

/// Ascending strike grid centered on the spot's nearest grid point.
pub fn strike_grid(underlying: Underlying, spot: f64, half_width: usize) -> Vec<f64> {
    let interval = underlying.strike_interval();
    let center = (spot / interval).round() * interval;

    let mut strikes = Vec::with_capacity(half_width * 2 + 1);
    for i in -(half_width as i64)..=(half_width as i64) {
        let strike = center + i as f64 * interval;
        if strike > 0.0 {
            strikes.push(strike);
        }
    }
    strikes
}

/// Theoretical option price: intrinsic plus a time value that decays with
/// distance from the money.
pub fn theoretical_ltp(side: OptionSide, spot: f64, strike: f64, underlying: Underlying) -> f64 {
    let intrinsic = match side {
        OptionSide::CE => (spot - strike).max(0.0),
        OptionSide::PE => (strike - spot).max(0.0),
    };

    let interval = underlying.strike_interval();
    let distance = (spot - strike).abs();
    let time_value = (interval * 0.9 * (-distance / (5.0 * interval)).exp()).max(0.5);

    round2(intrinsic + time_value)
}

/// Expiry code used in NFO trading symbols, e.g. "24DEC".
fn expiry_code(expiry: &str) -> String {
    match chrono::NaiveDate::parse_from_str(expiry, "%Y-%m-%d") {
        Ok(date) => {
            let months = [
                "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
            ];
            format!(
                "{:02}{}",
                date.year() % 100,
                months[date.month0() as usize]
            )
        }
        Err(_) => String::new(),
    }
}

pub fn option_tradingsymbol(
    underlying: Underlying,
    expiry: &str,
    strike: f64,
    side: OptionSide,
) -> String {
    format!(
        "{}{}{}{}",
        underlying.name(),
        expiry_code(expiry),
        strike as i64,
        match side {
            OptionSide::CE => "CE",
            OptionSide::PE => "PE",
        }
    )
}

fn instrument_token(underlying: Underlying, strike: f64, side: OptionSide) -> i64 {
    let base = match underlying {
        Underlying::Nifty => 53_000_000,
        Underlying::BankNifty => 54_000_000,
    };
    base + strike as i64 * 10
        + match side {
            OptionSide::CE => 1,
            OptionSide::PE => 2,
        }
}

/// Recover underlying, strike, and side from an NFO trading symbol, e.g.
/// "NIFTY24DEC24500CE". Used to seed prices for option symbols that are
/// traded before the chain was ever requested.
pub fn parse_option_symbol(symbol: &str) -> Option<(Underlying, f64, OptionSide)> {
    let upper = symbol.to_ascii_uppercase();

    let side = if upper.ends_with("CE") {
        OptionSide::CE
    } else if upper.ends_with("PE") {
        OptionSide::PE
    } else {
        return None;
    };

    // BANKNIFTY contains NIFTY, so test it first
    let underlying = if upper.starts_with("BANKNIFTY") {
        Underlying::BankNifty
    } else if upper.starts_with("NIFTY") {
        Underlying::Nifty
    } else {
        return None;
    };

    let body = &upper[..upper.len() - 2];
    let strike_digits: String = body
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let strike: f64 = strike_digits.parse().ok()?;
    if strike <= 0.0 {
        return None;
    }

    Some((underlying, strike, side))
}

/// Build the visible chain around spot. One expiry per response.
pub fn build_chain(underlying: Underlying, spot: f64, expiry: &str) -> OptionsChain {
    let mut rng = rand::thread_rng();
    let interval = underlying.strike_interval();

    // Build a wide grid first, then restrict to the display window
    let grid = strike_grid(underlying, spot, CHAIN_STRIKE_WINDOW + 8);
    let atm_idx = atm_index(&grid, spot);
    let (start, end) = visible_range(grid.len(), atm_idx);
    let visible = &grid[start..end];

    let mut ce_options = Vec::with_capacity(visible.len());
    let mut pe_options = Vec::with_capacity(visible.len());

    for &strike in visible {
        let distance = (spot - strike).abs();
        // Liquidity concentrates near the money
        let liquidity = (-distance / (8.0 * interval)).exp();

        for side in [OptionSide::CE, OptionSide::PE] {
            let ltp = theoretical_ltp(side, spot, strike, underlying);
            let spread = (ltp * 0.002).max(0.05);
            let prev_close = ltp * (1.0 + rng.gen_range(-0.06..0.06));

            let quote = OptionQuote {
                tradingsymbol: option_tradingsymbol(underlying, expiry, strike, side),
                strike,
                expiry: expiry.to_string(),
                option_type: side,
                instrument_token: instrument_token(underlying, strike, side),
                ltp,
                oi: (rng.gen_range(50_000..500_000) as f64 * liquidity) as i64,
                change: percentage_change(prev_close, ltp),
                volume: (rng.gen_range(10_000..200_000) as f64 * liquidity) as i64,
                bid: round2((ltp - spread).max(0.05)),
                ask: round2(ltp + spread),
            };

            match side {
                OptionSide::CE => ce_options.push(quote),
                OptionSide::PE => pe_options.push(quote),
            }
        }
    }

    OptionsChain {
        symbol: underlying.name().to_string(),
        spot_price: spot,
        expiry_date: expiry.to_string(),
        atm_strikes: atm_strikes(visible, spot),
        ce_options,
        pe_options,
    }
}

/// Instrument master rows for the visible grid of one expiry.
pub fn build_instruments(underlying: Underlying, spot: f64, expiry: &str) -> Vec<Instrument> {
    let grid = strike_grid(underlying, spot, CHAIN_STRIKE_WINDOW + 8);
    let atm_idx = atm_index(&grid, spot);
    let (start, end) = visible_range(grid.len(), atm_idx);

    let mut instruments = Vec::new();
    for &strike in &grid[start..end] {
        for side in [OptionSide::CE, OptionSide::PE] {
            instruments.push(Instrument {
                instrument_token: instrument_token(underlying, strike, side),
                tradingsymbol: option_tradingsymbol(underlying, expiry, strike, side),
                name: underlying.name().to_string(),
                expiry: expiry.to_string(),
                strike,
                instrument_type: side,
                exchange: "NFO".to_string(),
                lot_size: underlying.lot_size(),
            });
        }
    }
    instruments
}

/// Default expiry: the next weekly Thursday, as YYYY-MM-DD.
pub fn default_expiry() -> String {
    hours::next_weekly_expiry(hours::now_ist())
        .format("%Y-%m-%d")
        .to_string()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atm_picks_two_nearest_ascending() {
        let strikes = [24_300.0, 24_350.0, 24_400.0, 24_450.0, 24_500.0];
        assert_eq!(atm_strikes(&strikes, 24_412.0), vec![24_400.0, 24_450.0]);
        assert_eq!(atm_strikes(&strikes, 24_301.0), vec![24_300.0, 24_350.0]);
    }

    #[test]
    fn atm_tie_breaks_toward_lower_strike() {
        let strikes = [24_400.0, 24_450.0, 24_500.0];
        // 24425 is equidistant from 24400 and 24450; 24475 from 24450/24500
        assert_eq!(atm_strikes(&strikes, 24_425.0), vec![24_400.0, 24_450.0]);
        assert_eq!(atm_index(&strikes, 24_475.0), 1);
    }

    #[test]
    fn visible_range_clamps_at_edges() {
        assert_eq!(visible_range(100, 50), (34, 67));
        assert_eq!(visible_range(100, 3), (0, 20));
        assert_eq!(visible_range(100, 98), (82, 100));
        assert_eq!(visible_range(10, 5), (0, 10));
    }

    #[test]
    fn grid_is_centered_and_ascending() {
        let grid = strike_grid(Underlying::Nifty, 24_512.0, 4);
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[4], 24_500.0);
        for pair in grid.windows(2) {
            assert_eq!(pair[1] - pair[0], 50.0);
        }
    }

    #[test]
    fn chain_has_window_of_strikes_per_side() {
        let chain = build_chain(Underlying::Nifty, 24_500.0, "2025-06-12");
        assert_eq!(chain.ce_options.len(), 2 * CHAIN_STRIKE_WINDOW + 1);
        assert_eq!(chain.pe_options.len(), chain.ce_options.len());
        assert_eq!(chain.atm_strikes, vec![24_450.0, 24_500.0]);

        // Sorted ascending by strike
        for pair in chain.ce_options.windows(2) {
            assert!(pair[0].strike < pair[1].strike);
        }
        for leg in chain.ce_options.iter().chain(chain.pe_options.iter()) {
            assert!(leg.ltp > 0.0);
            assert!(leg.bid <= leg.ltp);
            assert!(leg.ask >= leg.ltp);
        }
    }

    #[test]
    fn deep_itm_call_carries_intrinsic() {
        let ltp = theoretical_ltp(OptionSide::CE, 24_500.0, 24_000.0, Underlying::Nifty);
        assert!(ltp >= 500.0);
        let ltp = theoretical_ltp(OptionSide::PE, 24_500.0, 25_000.0, Underlying::Nifty);
        assert!(ltp >= 500.0);
        // Far OTM still has a floor
        let ltp = theoretical_ltp(OptionSide::CE, 24_500.0, 30_000.0, Underlying::Nifty);
        assert!(ltp >= 0.5);
    }

    #[test]
    fn tradingsymbol_round_trips() {
        let symbol =
            option_tradingsymbol(Underlying::Nifty, "2024-12-26", 24_500.0, OptionSide::CE);
        assert_eq!(symbol, "NIFTY24DEC24500CE");
        assert_eq!(
            parse_option_symbol(&symbol),
            Some((Underlying::Nifty, 24_500.0, OptionSide::CE))
        );

        let symbol =
            option_tradingsymbol(Underlying::BankNifty, "2024-12-26", 52_100.0, OptionSide::PE);
        assert_eq!(symbol, "BANKNIFTY24DEC52100PE");
        assert_eq!(
            parse_option_symbol(&symbol),
            Some((Underlying::BankNifty, 52_100.0, OptionSide::PE))
        );

        assert_eq!(parse_option_symbol("RELIANCE24DEC3000CE"), None);
        assert_eq!(parse_option_symbol("NIFTY 50"), None);
    }
}
