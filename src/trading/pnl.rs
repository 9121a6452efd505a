//! P&L arithmetic.
//!
//! One place for the formulas the position table, the portfolio summary,
//! and the WebSocket P&L stream all agree on. A missing or non-finite
//! mark price falls back to the average price, i.e. zero P&L.

/// Unrealized P&L for a signed position quantity.
///
/// Long: `(ltp - avg) * qty`. Short: `(avg - ltp) * |qty|`.
pub fn position_unrealized(average_price: f64, ltp: f64, quantity: i32) -> f64 {
    let ltp = guard(ltp, average_price);
    if quantity >= 0 {
        (ltp - average_price) * quantity as f64
    } else {
        (average_price - ltp) * quantity.unsigned_abs() as f64
    }
}

/// P&L for derivative contracts quoted in lots:
/// `(ltp - avg) * multiplier * sign(quantity)`.
pub fn derivative_pnl(average_price: f64, ltp: f64, quantity: i32, multiplier: f64) -> f64 {
    let ltp = guard(ltp, average_price);
    (ltp - average_price) * multiplier * (quantity.signum() as f64)
}

/// P&L for equity-like instruments: `(ltp - avg) * quantity`.
pub fn equity_pnl(average_price: f64, ltp: f64, quantity: i32) -> f64 {
    let ltp = guard(ltp, average_price);
    (ltp - average_price) * quantity as f64
}

/// Realized P&L when `closed_quantity` units of a position are closed at
/// `exit_price`. `position_quantity` carries the direction.
pub fn realized_on_close(
    average_price: f64,
    exit_price: f64,
    closed_quantity: i32,
    position_quantity: i32,
) -> f64 {
    if position_quantity >= 0 {
        (exit_price - average_price) * closed_quantity as f64
    } else {
        (average_price - exit_price) * closed_quantity as f64
    }
}

fn guard(ltp: f64, fallback: f64) -> f64 {
    if ltp.is_finite() {
        ltp
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_position_gains_with_price() {
        assert_eq!(position_unrealized(100.0, 110.0, 50), 500.0);
        assert_eq!(position_unrealized(100.0, 95.0, 50), -250.0);
    }

    #[test]
    fn short_position_gains_as_price_falls() {
        assert_eq!(position_unrealized(100.0, 90.0, -50), 500.0);
        assert_eq!(position_unrealized(100.0, 110.0, -50), -500.0);
    }

    #[test]
    fn derivative_pnl_scales_by_multiplier_and_sign() {
        // Long one NIFTY lot of 50
        assert_eq!(derivative_pnl(120.0, 130.0, 1, 50.0), 500.0);
        // Short: same move loses
        assert_eq!(derivative_pnl(120.0, 130.0, -1, 50.0), -500.0);
        assert_eq!(derivative_pnl(120.0, 120.0, 1, 50.0), 0.0);
    }

    #[test]
    fn equity_pnl_is_linear_in_quantity() {
        assert_eq!(equity_pnl(100.0, 104.0, 25), 100.0);
        assert_eq!(equity_pnl(100.0, 104.0, -25), -100.0);
    }

    #[test]
    fn missing_ltp_defaults_to_average() {
        assert_eq!(position_unrealized(100.0, f64::NAN, 50), 0.0);
        assert_eq!(derivative_pnl(100.0, f64::INFINITY, 1, 50.0), 0.0);
        assert_eq!(equity_pnl(100.0, f64::NAN, 10), 0.0);
    }

    #[test]
    fn realized_close_respects_direction() {
        // Long 100 @ 100, sell 40 @ 110
        assert_eq!(realized_on_close(100.0, 110.0, 40, 100), 400.0);
        // Short 100 @ 100, cover 40 @ 90
        assert_eq!(realized_on_close(100.0, 90.0, 40, -100), 400.0);
        // Short covered at a loss
        assert_eq!(realized_on_close(100.0, 115.0, 40, -100), -600.0);
    }
}
