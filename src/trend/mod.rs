//! Trade history analysis
//!
//! Rebuilds the swap history of a pool and derives two signals from it:
//! whether it was already dumped, and how the price moved in its first
//! minute of trading.

pub mod analyzer;
pub mod trades;

pub use analyzer::{
    analyze_trend, find_dump, DumpPair, TrendAssessment, TrendKind, TrendParams, TrendStats,
};
pub use trades::{fetch_latest_trades, parse_trade, TradeKind, TradeRecord};
