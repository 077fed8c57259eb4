//! Trade admission gate

use super::{SafetyVerdict, VerdictLevel};
use crate::trend::TrendAssessment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Small,
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeDecision {
    Trade(SizeClass),
    Skip(String),
}

impl TradeDecision {
    pub fn is_trade(&self) -> bool {
        matches!(self, TradeDecision::Trade(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionGate {
    pub allowed: Vec<VerdictLevel>,
    /// YELLOW pools above this volatility are skipped
    pub max_volatility: f64,
    /// YELLOW pools need at least this many early buys
    pub min_buys: usize,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self {
            allowed: vec![VerdictLevel::Green, VerdictLevel::Yellow],
            max_volatility: 0.5,
            min_buys: 3,
        }
    }
}

/// GREEN trades large. YELLOW trades small only when the early trading
/// activity is calm and busy enough. RED never trades.
pub fn admit(verdict: &SafetyVerdict, trend: Option<&TrendAssessment>, gate: &AdmissionGate) -> TradeDecision {
    if !gate.allowed.contains(&verdict.level) {
        return TradeDecision::Skip(format!("{} verdict: {}", verdict.level, verdict.reason));
    }

    match verdict.level {
        VerdictLevel::Red => TradeDecision::Skip(format!("RED verdict: {}", verdict.reason)),
        VerdictLevel::Green => TradeDecision::Trade(SizeClass::Large),
        VerdictLevel::Yellow => {
            let Some(stats) = trend.and_then(|t| t.stats.as_ref()) else {
                return TradeDecision::Skip("YELLOW verdict without trend data".to_string());
            };
            if stats.volatility > gate.max_volatility {
                return TradeDecision::Skip(format!(
                    "YELLOW verdict with volatility {:.3} above {:.3}",
                    stats.volatility, gate.max_volatility
                ));
            }
            if stats.buys_in_first_minute < gate.min_buys {
                return TradeDecision::Skip(format!(
                    "YELLOW verdict with {} early buys, need {}",
                    stats.buys_in_first_minute, gate.min_buys
                ));
            }
            TradeDecision::Trade(SizeClass::Small)
        }
    }
}
