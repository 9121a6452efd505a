//! Paper trading engine.
//!
//! Simulates order execution against the live simulated tape.
//! NO REAL ORDERS ARE PLACED - this is practice trading only.
//!
//! The engine:
//! 1. Validates orders against the wallet balance and position cap
//! 2. Fills MARKET orders immediately at the cached LTP
//! 3. Creates and merges positions, realizing P&L on reductions
//! 4. Feeds realized P&L into active tournament standings
//! 5. Applies execution cashflows to the wallet

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::charges::{estimate_charges, ChargeBreakdown};
use crate::db::{
    Database, DbError, NewPosition, OrderCreate, OrderSide, OrderStatus, OrderType, PaperOrder,
    PaperPosition, PortfolioSummary,
};
use crate::inr::format_currency;
use crate::market::MarketHub;
use crate::trading::pnl;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),
    #[error("Unable to fetch market price for {0}")]
    PriceUnavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub struct PaperTradingEngine {
    db: Database,
    market: Arc<MarketHub>,
    /// Maximum notional per order, INR
    max_position_size: f64,
    /// Denominator for the portfolio P&L percentage
    initial_virtual_balance: f64,
}

impl PaperTradingEngine {
    pub fn new(
        db: Database,
        market: Arc<MarketHub>,
        max_position_size: f64,
        initial_virtual_balance: f64,
    ) -> Self {
        Self {
            db,
            market,
            max_position_size,
            initial_virtual_balance,
        }
    }

    /// Place a paper order. MARKET orders fill immediately; everything
    /// else rests as OPEN.
    pub async fn place_order(
        &self,
        user_id: i32,
        order_data: OrderCreate,
    ) -> Result<PaperOrder, EngineError> {
        order_data
            .validate()
            .map_err(EngineError::Validation)?;

        let wallet = match self.db.get_wallet(user_id).await {
            Ok(w) => w,
            Err(DbError::NotFound) => {
                return Err(EngineError::Validation("User wallet not found".to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let current_price = self
            .market
            .price(&order_data.symbol)
            .ok_or_else(|| EngineError::PriceUnavailable(order_data.symbol.clone()))?;

        let order_value = self.order_value(&order_data, current_price);

        if order_data.order_side == OrderSide::Buy && !wallet.can_afford(order_value) {
            return Err(EngineError::Validation(format!(
                "Insufficient balance. Required: {}, Available: {}",
                format_currency(order_value),
                format_currency(wallet.balance)
            )));
        }

        if order_value > self.max_position_size {
            return Err(EngineError::Validation(format!(
                "Order value exceeds maximum position size of {}",
                format_currency(self.max_position_size)
            )));
        }

        let initial_status = if order_data.order_type == OrderType::Market {
            OrderStatus::Pending
        } else {
            OrderStatus::Open
        };

        let order = self
            .db
            .insert_order(user_id, &order_data, initial_status)
            .await?;

        let order = if order_data.order_type == OrderType::Market {
            self.execute_order(order, current_price).await?
        } else {
            order
        };

        info!(
            "Order placed: {} - {} {} {} @ {:.2}",
            order.id,
            order.symbol,
            order.order_side.as_str(),
            order.quantity,
            current_price
        );
        Ok(order)
    }

    /// Fill an order: record the execution, move the wallet, merge the
    /// position, and feed any realized P&L into tournament standings.
    async fn execute_order(
        &self,
        order: PaperOrder,
        execution_price: f64,
    ) -> Result<PaperOrder, EngineError> {
        let order = self
            .db
            .mark_order_executed(order.id, execution_price, order.quantity)
            .await?;

        let order_value = execution_price * order.executed_quantity as f64;
        let cashflow = match order.order_side {
            OrderSide::Buy => -order_value,
            OrderSide::Sell => order_value,
        };
        self.db.apply_cashflow(order.user_id, cashflow).await?;
        info!(
            "{} {} to wallet (Order {})",
            if cashflow < 0.0 { "Debited" } else { "Credited" },
            format_currency(order_value),
            order.id
        );

        let realized = self.update_position(&order).await?;

        if let Some(realized_pnl) = realized {
            self.record_tournament_trade(order.user_id, realized_pnl)
                .await?;
        }

        info!("Order executed: {} @ {}", order.id, format_currency(execution_price));
        Ok(order)
    }

    /// Merge an execution into the user's position for the symbol.
    /// Returns the realized P&L when the fill reduced or closed exposure.
    async fn update_position(&self, order: &PaperOrder) -> Result<Option<f64>, EngineError> {
        let exec_price = order.executed_price.unwrap_or(0.0);
        let signed_qty = match order.order_side {
            OrderSide::Buy => order.executed_quantity,
            OrderSide::Sell => -order.executed_quantity,
        };

        let existing = self.db.get_position(order.user_id, &order.symbol).await?;

        let position = match existing {
            None => {
                let position = self
                    .db
                    .insert_position(&NewPosition {
                        user_id: order.user_id,
                        symbol: &order.symbol,
                        instrument_type: order.instrument_type,
                        instrument_token: order.instrument_token,
                        quantity: signed_qty,
                        average_price: exec_price,
                        current_price: exec_price,
                        stop_loss: order.stop_loss,
                        take_profit: order.take_profit,
                    })
                    .await?;
                info!(
                    "Created new position: {} qty={}",
                    position.symbol, position.quantity
                );
                return Ok(None);
            }
            Some(p) => p,
        };

        let merged = merge_fill(
            position.quantity,
            position.average_price,
            signed_qty,
            exec_price,
        );

        if let Some(realized) = merged.realized_pnl {
            info!("Realized P&L: {}", format_currency(realized));
        }

        if merged.quantity == 0 {
            self.db.delete_position(position.id).await?;
            info!("Position closed: {}", position.symbol);
            return Ok(merged.realized_pnl);
        }

        let unrealized =
            pnl::position_unrealized(merged.average_price, exec_price, merged.quantity);
        let updated = self
            .db
            .update_position(
                position.id,
                merged.quantity,
                merged.average_price,
                exec_price,
                unrealized,
                position.realized_pnl + merged.realized_pnl.unwrap_or(0.0),
            )
            .await?;
        info!(
            "Updated position: {} qty={} avg={:.2}",
            updated.symbol, updated.quantity, updated.average_price
        );

        Ok(merged.realized_pnl)
    }

    /// Push a realized trade into every live tournament the user is in.
    async fn record_tournament_trade(
        &self,
        user_id: i32,
        trade_pnl: f64,
    ) -> Result<(), EngineError> {
        let participations = self
            .db
            .get_active_participations(user_id, Utc::now())
            .await?;

        for participation in participations {
            self.db
                .record_participant_trade(participation.tournament_id, user_id, trade_pnl)
                .await?;
            self.db
                .update_rankings(participation.tournament_id)
                .await?;
        }

        Ok(())
    }

    fn order_value(&self, order: &OrderCreate, current_price: f64) -> f64 {
        match (order.order_type, order.price) {
            (OrderType::Limit, Some(price)) => price * order.quantity as f64,
            _ => current_price * order.quantity as f64,
        }
    }

    /// Cancel a pending or open order. False when nothing was cancellable.
    pub async fn cancel_order(&self, order_id: i32, user_id: i32) -> Result<bool, EngineError> {
        let cancelled = self.db.cancel_order(order_id, user_id).await?;
        if cancelled.is_some() {
            info!("Order cancelled: {}", order_id);
        }
        Ok(cancelled.is_some())
    }

    pub async fn get_user_orders(
        &self,
        user_id: i32,
        limit: i64,
    ) -> Result<Vec<PaperOrder>, EngineError> {
        Ok(self.db.get_orders(user_id, limit).await?)
    }

    /// Positions with mark prices refreshed from the tape.
    pub async fn get_user_positions(
        &self,
        user_id: i32,
    ) -> Result<Vec<PaperPosition>, EngineError> {
        self.update_positions_prices(user_id).await
    }

    /// Re-mark every open position at the current LTP.
    pub async fn update_positions_prices(
        &self,
        user_id: i32,
    ) -> Result<Vec<PaperPosition>, EngineError> {
        let mut positions = self.db.get_positions(user_id).await?;

        for position in positions.iter_mut() {
            if let Some(price) = self.market.price(&position.symbol) {
                let unrealized =
                    pnl::position_unrealized(position.average_price, price, position.quantity);
                self.db
                    .update_position_price(position.id, price, unrealized)
                    .await?;
                position.current_price = Some(price);
                position.unrealized_pnl = unrealized;
            }
        }

        Ok(positions)
    }

    /// Portfolio rollup for the dashboard header.
    pub async fn get_portfolio_summary(
        &self,
        user_id: i32,
    ) -> Result<PortfolioSummary, EngineError> {
        let positions = self.update_positions_prices(user_id).await?;
        let wallet = self.db.get_wallet(user_id).await?;

        let invested_amount: f64 = positions
            .iter()
            .map(|p| p.quantity.unsigned_abs() as f64 * p.average_price)
            .sum();
        let total_pnl: f64 = positions.iter().map(|p| p.total_pnl()).sum();
        let total_trades = self.db.count_executed_orders(user_id).await?;

        let total_pnl_percentage = if self.initial_virtual_balance > 0.0 {
            (total_pnl / self.initial_virtual_balance) * 100.0
        } else {
            0.0
        };

        Ok(PortfolioSummary {
            total_balance: wallet.balance + invested_amount + total_pnl,
            available_balance: wallet.balance,
            invested_amount,
            total_pnl,
            total_pnl_percentage,
            open_positions_count: positions.len() as i64,
            total_trades,
        })
    }

    /// Charge estimate for the order ticket.
    pub fn charge_estimate(&self, order_value: f64, side: OrderSide) -> ChargeBreakdown {
        estimate_charges(order_value, side)
    }
}

/// Result of folding a fill into an existing position
#[derive(Debug, Clone, Copy, PartialEq)]
struct MergedPosition {
    quantity: i32,
    average_price: f64,
    /// Some when the fill reduced or closed exposure
    realized_pnl: Option<f64>,
}

/// Position-merge arithmetic, free of I/O.
///
/// Same-direction fills recompute the volume-weighted average. Opposing
/// fills realize P&L against the average on the closed portion, keep the
/// entry price on a partial reduction, and restart at the fill price when
/// filled through to the other side.
fn merge_fill(
    position_qty: i32,
    average_price: f64,
    signed_fill_qty: i32,
    fill_price: f64,
) -> MergedPosition {
    let same_direction = position_qty == 0 || position_qty.signum() == signed_fill_qty.signum();

    if same_direction {
        let new_qty = position_qty + signed_fill_qty;
        let total_cost =
            position_qty as f64 * average_price + signed_fill_qty as f64 * fill_price;
        let new_avg = if new_qty != 0 {
            total_cost / new_qty as f64
        } else {
            0.0
        };
        return MergedPosition {
            quantity: new_qty,
            average_price: new_avg,
            realized_pnl: None,
        };
    }

    let closing_qty = signed_fill_qty.abs().min(position_qty.abs());
    let realized = pnl::realized_on_close(average_price, fill_price, closing_qty, position_qty);
    let remaining = position_qty + signed_fill_qty;

    let new_avg = if remaining == 0 || remaining.signum() == position_qty.signum() {
        average_price
    } else {
        fill_price
    };

    MergedPosition {
        quantity: remaining,
        average_price: new_avg,
        realized_pnl: Some(realized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_into_long_reaverages() {
        // Long 100 @ 100, buy 100 more @ 110 -> 200 @ 105
        let merged = merge_fill(100, 100.0, 100, 110.0);
        assert_eq!(merged.quantity, 200);
        assert!((merged.average_price - 105.0).abs() < 1e-9);
        assert_eq!(merged.realized_pnl, None);
    }

    #[test]
    fn first_fill_sets_the_average() {
        let merged = merge_fill(0, 0.0, -50, 120.0);
        assert_eq!(merged.quantity, -50);
        assert!((merged.average_price - 120.0).abs() < 1e-9);
        assert_eq!(merged.realized_pnl, None);
    }

    #[test]
    fn partial_sell_realizes_and_keeps_entry() {
        // Long 100 @ 100, sell 40 @ 110
        let merged = merge_fill(100, 100.0, -40, 110.0);
        assert_eq!(merged.quantity, 60);
        assert!((merged.average_price - 100.0).abs() < 1e-9);
        assert_eq!(merged.realized_pnl, Some(400.0));
    }

    #[test]
    fn full_close_zeroes_the_position() {
        let merged = merge_fill(100, 100.0, -100, 95.0);
        assert_eq!(merged.quantity, 0);
        assert_eq!(merged.realized_pnl, Some(-500.0));
    }

    #[test]
    fn oversell_flips_to_short_at_fill_price() {
        // Long 100 @ 100, sell 150 @ 110: realize on 100, short 50 @ 110
        let merged = merge_fill(100, 100.0, -150, 110.0);
        assert_eq!(merged.quantity, -50);
        assert!((merged.average_price - 110.0).abs() < 1e-9);
        assert_eq!(merged.realized_pnl, Some(1_000.0));
    }

    #[test]
    fn cover_reduces_a_short() {
        // Short 100 @ 100, buy 60 @ 90
        let merged = merge_fill(-100, 100.0, 60, 90.0);
        assert_eq!(merged.quantity, -40);
        assert!((merged.average_price - 100.0).abs() < 1e-9);
        assert_eq!(merged.realized_pnl, Some(600.0));
    }

    #[test]
    fn add_to_short_reaverages() {
        let merged = merge_fill(-50, 100.0, -50, 90.0);
        assert_eq!(merged.quantity, -100);
        assert!((merged.average_price - 95.0).abs() < 1e-9);
        assert_eq!(merged.realized_pnl, None);
    }
}
