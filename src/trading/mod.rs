//! Paper trading: order simulation, position tracking, P&L.

mod engine;
pub mod pnl;

pub use engine::{EngineError, PaperTradingEngine};
