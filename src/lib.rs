//! Momentum Scanner
//!
//! A real-time market scanner for intraday momentum: rolling price/volume
//! history per symbol, composable alert conditions behind a VWAP gate,
//! deterministic backtest replay, and take-profit / stop-loss P&L scoring
//! of the alerts a session would have produced.

pub mod backtest;
pub mod buckets;
pub mod conditions;
pub mod config;
pub mod feed;
pub mod history;
pub mod monitor;
pub mod pnl;
pub mod types;
pub mod vwap;

pub use config::Config;
pub use types::*;
