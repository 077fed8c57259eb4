//! Dump detection and early price trend

use super::trades::{TradeKind, TradeRecord};

/// Adjacent buy then sell with a large price drop
#[derive(Debug, Clone, PartialEq)]
pub struct DumpPair {
    pub buy: TradeRecord,
    pub sell: TradeRecord,
    /// Percent drop from the buy price to the sell price
    pub drop_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendKind {
    Pumping,
    Dumping,
    Equilibrium,
}

impl std::fmt::Display for TrendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendKind::Pumping => write!(f, "PUMPING"),
            TrendKind::Dumping => write!(f, "DUMPING"),
            TrendKind::Equilibrium => write!(f, "EQUILIBRIUM"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendStats {
    pub kind: TrendKind,
    /// Mean of successive fractional price changes
    pub average_growth_rate: f64,
    /// Population standard deviation of those changes
    pub volatility: f64,
    pub buys_in_first_minute: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendParams {
    pub window_secs: i64,
    pub growth_threshold: f64,
    /// Buys priced at or above this are treated as outliers
    pub price_ceiling: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            window_secs: 60,
            growth_threshold: 0.001,
            price_ceiling: 2.0,
        }
    }
}

/// Combined trend output handed to the decision engine
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrendAssessment {
    pub dump_detected: Option<DumpPair>,
    /// `None` when there was not enough data
    pub stats: Option<TrendStats>,
}

impl TrendAssessment {
    pub fn from_trades(trades: &[TradeRecord], params: &TrendParams, dump_threshold_pct: f64) -> Self {
        Self {
            dump_detected: find_dump(trades, dump_threshold_pct),
            stats: analyze_trend(trades, params),
        }
    }

    /// Trade history could not be fetched
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// Newest adjacent (BUY, SELL) pair whose price fell by at least `threshold_pct`.
/// `trades` must be ordered oldest first.
pub fn find_dump(trades: &[TradeRecord], threshold_pct: f64) -> Option<DumpPair> {
    (1..trades.len()).rev().find_map(|i| {
        let sell = &trades[i];
        let buy = &trades[i - 1];
        if sell.kind != TradeKind::Sell || buy.kind != TradeKind::Buy || buy.price <= 0.0 {
            return None;
        }

        let drop_pct = (buy.price - sell.price) / buy.price * 100.0;
        (drop_pct >= threshold_pct).then(|| DumpPair {
            buy: buy.clone(),
            sell: sell.clone(),
            drop_pct,
        })
    })
}

/// Classify the price trend of the first `window_secs` of trading.
///
/// Only buys priced under the ceiling are used. Fewer than two of them
/// leaves the growth rate undefined and yields `None`.
pub fn analyze_trend(trades: &[TradeRecord], params: &TrendParams) -> Option<TrendStats> {
    let first = trades.first()?.timestamp;

    let prices: Vec<f64> = trades
        .iter()
        .filter(|t| t.timestamp - first <= params.window_secs)
        .filter(|t| t.kind == TradeKind::Buy && t.price > 0.0 && t.price < params.price_ceiling)
        .map(|t| t.price)
        .collect();

    if prices.len() < 2 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
    let n = changes.len() as f64;
    let mean = changes.iter().sum::<f64>() / n;
    let variance = changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;

    if !mean.is_finite() || !variance.is_finite() {
        return None;
    }

    let kind = if mean >= params.growth_threshold {
        TrendKind::Pumping
    } else if mean <= -params.growth_threshold {
        TrendKind::Dumping
    } else {
        TrendKind::Equilibrium
    };

    Some(TrendStats {
        kind,
        average_growth_rate: mean,
        volatility: variance.sqrt(),
        buys_in_first_minute: prices.len(),
    })
}
