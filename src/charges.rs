//! Statutory charge schedule for Indian F&O orders.
//!
//! Flat brokerage plus the exchange/regulatory levies charged on NFO
//! derivatives. Decimal arithmetic keeps the components exact so the
//! itemized breakdown always sums to the displayed total. The figure is
//! an estimate shown alongside the order ticket; the simulated wallet is
//! only ever debited for notional.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::OrderSide;

/// Flat brokerage per executed order, in INR
fn brokerage_flat() -> Decimal {
    Decimal::new(20, 0)
}

/// STT on the sell-side notional of derivatives (0.05%)
fn stt_rate() -> Decimal {
    Decimal::new(5, 4)
}

/// Exchange transaction charge on notional (0.05%)
fn exchange_rate() -> Decimal {
    Decimal::new(5, 4)
}

/// GST on brokerage + exchange charge (18%)
fn gst_rate() -> Decimal {
    Decimal::new(18, 2)
}

/// SEBI turnover fee: ₹10 per crore of notional
fn sebi_rate() -> Decimal {
    Decimal::new(1, 6)
}

/// Stamp duty on the buy-side notional (0.003%)
fn stamp_rate() -> Decimal {
    Decimal::new(3, 5)
}

/// Itemized charge estimate for a single order
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChargeBreakdown {
    pub order_value: Decimal,
    pub brokerage: Decimal,
    pub stt: Decimal,
    pub exchange_txn_charge: Decimal,
    pub gst: Decimal,
    pub sebi_charges: Decimal,
    pub stamp_duty: Decimal,
    pub total_charges: Decimal,
    /// Notional plus charges: the figure shown as "total required"
    pub total_required: Decimal,
}

/// Compute the charge estimate for an order of `order_value` INR notional.
pub fn estimate_charges(order_value: f64, side: OrderSide) -> ChargeBreakdown {
    let notional = Decimal::from_f64(order_value).unwrap_or(Decimal::ZERO);

    let brokerage = brokerage_flat();
    let stt = match side {
        OrderSide::Sell => notional * stt_rate(),
        OrderSide::Buy => Decimal::ZERO,
    };
    let exchange_txn_charge = notional * exchange_rate();
    let gst = (brokerage + exchange_txn_charge) * gst_rate();
    let sebi_charges = notional * sebi_rate();
    let stamp_duty = match side {
        OrderSide::Buy => notional * stamp_rate(),
        OrderSide::Sell => Decimal::ZERO,
    };

    let total_charges = brokerage + stt + exchange_txn_charge + gst + sebi_charges + stamp_duty;

    ChargeBreakdown {
        order_value: notional,
        brokerage,
        stt,
        exchange_txn_charge,
        gst,
        sebi_charges,
        stamp_duty,
        total_charges,
        total_required: notional + total_charges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn buy_order_75k() {
        let charges = estimate_charges(75_000.0, OrderSide::Buy);
        assert_eq!(charges.brokerage, dec("20"));
        assert_eq!(charges.stt, Decimal::ZERO);
        assert_eq!(charges.exchange_txn_charge, dec("37.5"));
        assert_eq!(charges.gst, dec("10.35"));
        assert_eq!(charges.sebi_charges, dec("0.075"));
        assert_eq!(charges.stamp_duty, dec("2.25"));
        assert_eq!(charges.total_charges, dec("70.175"));
        assert_eq!(charges.total_required, dec("75070.175"));
    }

    #[test]
    fn sell_order_pays_stt_not_stamp() {
        let charges = estimate_charges(75_000.0, OrderSide::Sell);
        assert_eq!(charges.stt, dec("37.5"));
        assert_eq!(charges.stamp_duty, Decimal::ZERO);
        // brokerage 20 + stt 37.5 + exchange 37.5 + gst 10.35 + sebi 0.075
        assert_eq!(charges.total_charges, dec("105.425"));
    }

    #[test]
    fn components_always_sum_to_total() {
        for &value in &[100.0, 12_345.67, 50_000.0, 1_00_00_000.0] {
            for side in [OrderSide::Buy, OrderSide::Sell] {
                let c = estimate_charges(value, side);
                let sum = c.brokerage
                    + c.stt
                    + c.exchange_txn_charge
                    + c.gst
                    + c.sebi_charges
                    + c.stamp_duty;
                assert_eq!(sum, c.total_charges);
            }
        }
    }

    #[test]
    fn sebi_is_ten_rupees_per_crore() {
        let charges = estimate_charges(10_000_000.0, OrderSide::Buy);
        assert_eq!(charges.sebi_charges, dec("10.000000"));
    }
}
