//! Verdict table

use super::SafetyVerdict;
use crate::safety::SafetyAssessment;
use crate::trend::{TrendAssessment, TrendKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionThresholds {
    pub min_liquidity_usd: f64,
    pub max_liquidity_usd: f64,
    /// Share of supply in pool at which a non-mintable token is GREEN
    pub green_pool_share: f64,
    /// Below this share the pool is always RED
    pub min_pool_share: f64,
    /// Share at which a mintable token is still YELLOW
    pub mintable_yellow_pool_share: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            min_liquidity_usd: 500.0,
            max_liquidity_usd: 100_000_000.0,
            green_pool_share: 0.99,
            min_pool_share: 0.10,
            mintable_yellow_pool_share: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub swap_enabled: bool,
    pub safety: Option<&'a SafetyAssessment>,
    pub trend: Option<&'a TrendAssessment>,
}

/// First matching rule wins. Pure: identical inputs give identical verdicts.
pub fn evaluate(input: &DecisionInput<'_>, thresholds: &DecisionThresholds) -> SafetyVerdict {
    if let Some(dump) = input.trend.and_then(|t| t.dump_detected.as_ref()) {
        return SafetyVerdict::red(format!(
            "Already dumped. TX1: {} TX2: {}",
            dump.buy.signature, dump.sell.signature
        ));
    }

    if !input.swap_enabled {
        return SafetyVerdict::red("Swapping is disabled");
    }

    let Some(safety) = input.safety else {
        return SafetyVerdict::red("Couldn't verify safety");
    };

    let Some(trend) = input.trend.and_then(|t| t.stats.as_ref()) else {
        return SafetyVerdict::red("Couldn't check price trend for last transactions");
    };

    if trend.kind == TrendKind::Dumping {
        return SafetyVerdict::red(format!("Price trend is {}", trend.kind));
    }

    if safety.supply_changed_during_check {
        return SafetyVerdict::red("New tokens were minted during validation");
    }

    let usd = safety.total_liquidity.amount_usd;
    if usd < thresholds.min_liquidity_usd || usd > thresholds.max_liquidity_usd {
        return SafetyVerdict::red(format!(
            "Liquidity is too low or too high. {} {}",
            safety.total_liquidity.amount, safety.total_liquidity.symbol
        ));
    }

    if !safety.is_liquidity_locked {
        return SafetyVerdict::red("Liquidity is not locked");
    }

    let share = safety.new_token_pool_balance_percent;
    if share >= thresholds.green_pool_share {
        if safety.is_mintable {
            SafetyVerdict::yellow("Most of the tokens are in pool, but token is still mintable")
        } else {
            SafetyVerdict::green("Liquidity is locked. Token is not mintable. Green light")
        }
    } else if share >= thresholds.min_pool_share {
        if !safety.is_mintable {
            SafetyVerdict::yellow(format!(
                "At least {:.0}% of tokens are in pool and token is not mintable",
                thresholds.min_pool_share * 100.0
            ))
        } else if share >= thresholds.mintable_yellow_pool_share {
            SafetyVerdict::yellow(format!(
                ">{:.0}% of tokens are in pool, but token is still mintable",
                thresholds.mintable_yellow_pool_share * 100.0
            ))
        } else {
            SafetyVerdict::red("Many tokens are not in pool and token is mintable")
        }
    } else {
        SafetyVerdict::red(format!(
            "Less then {:.0}% of tokens are in pool.",
            thresholds.min_pool_share * 100.0
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::VerdictLevel;
    use crate::safety::LiquidityValue;
    use crate::trend::{DumpPair, TradeKind, TradeRecord, TrendStats};
    use solana_sdk::pubkey::Pubkey;

    fn safety(share: f64, mintable: bool) -> SafetyAssessment {
        let authority = Pubkey::new_unique();
        SafetyAssessment {
            creator: Pubkey::new_unique(),
            token_mint: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            is_liquidity_locked: true,
            new_token_pool_balance_percent: share,
            creator_balance_percent: 0.0,
            authority_balance_percent: 0.0,
            mint_authority: mintable.then_some(authority),
            freeze_authority: None,
            is_mintable: mintable,
            total_liquidity: LiquidityValue {
                amount: 30.0,
                amount_usd: 3300.0,
                symbol: "SOL".into(),
            },
            supply_changed_during_check: false,
            waited_for_lp_burn: false,
        }
    }

    fn trend(kind: TrendKind) -> TrendAssessment {
        TrendAssessment {
            dump_detected: None,
            stats: Some(TrendStats {
                kind,
                average_growth_rate: 0.05,
                volatility: 0.1,
                buys_in_first_minute: 12,
            }),
        }
    }

    fn verdict(safety: Option<&SafetyAssessment>, trend: Option<&TrendAssessment>) -> SafetyVerdict {
        evaluate(
            &DecisionInput {
                swap_enabled: true,
                safety,
                trend,
            },
            &DecisionThresholds::default(),
        )
    }

    #[test]
    fn test_green_when_full_pool_and_not_mintable() {
        let v = verdict(Some(&safety(0.995, false)), Some(&trend(TrendKind::Pumping)));
        assert_eq!(v.level, VerdictLevel::Green);
        assert!(v.reason.contains("Liquidity is locked. Token is not mintable."));
    }

    #[test]
    fn test_yellow_when_full_pool_but_mintable() {
        let v = verdict(Some(&safety(0.995, true)), Some(&trend(TrendKind::Pumping)));
        assert_eq!(v.level, VerdictLevel::Yellow);
    }

    #[test]
    fn test_red_when_few_tokens_in_pool() {
        for mintable in [false, true] {
            let v = verdict(Some(&safety(0.05, mintable)), Some(&trend(TrendKind::Equilibrium)));
            assert_eq!(v.level, VerdictLevel::Red);
        }
    }

    #[test]
    fn test_middle_band() {
        let t = trend(TrendKind::Equilibrium);
        assert_eq!(verdict(Some(&safety(0.5, false)), Some(&t)).level, VerdictLevel::Yellow);
        assert_eq!(verdict(Some(&safety(0.96, true)), Some(&t)).level, VerdictLevel::Yellow);
        assert_eq!(verdict(Some(&safety(0.5, true)), Some(&t)).level, VerdictLevel::Red);
    }

    #[test]
    fn test_dump_overrides_everything() {
        let mut t = trend(TrendKind::Pumping);
        let record = |sig: &str, kind, price| TradeRecord {
            signature: sig.into(),
            timestamp: 0,
            kind,
            raw_amount: 1,
            price,
        };
        t.dump_detected = Some(DumpPair {
            buy: record("buy_sig", TradeKind::Buy, 1.0),
            sell: record("sell_sig", TradeKind::Sell, 0.1),
            drop_pct: 90.0,
        });

        let v = evaluate(
            &DecisionInput {
                swap_enabled: false,
                safety: None,
                trend: Some(&t),
            },
            &DecisionThresholds::default(),
        );
        assert_eq!(v.level, VerdictLevel::Red);
        assert!(v.reason.contains("buy_sig") && v.reason.contains("sell_sig"));
    }

    #[test]
    fn test_rule_order() {
        let t = trend(TrendKind::Pumping);
        assert_eq!(verdict(None, Some(&t)).reason, "Couldn't verify safety");

        let s = safety(0.995, false);
        assert!(verdict(Some(&s), None).reason.contains("price trend"));
        assert!(verdict(Some(&s), Some(&TrendAssessment::unavailable()))
            .reason
            .contains("price trend"));

        let dumping = trend(TrendKind::Dumping);
        assert_eq!(verdict(Some(&s), Some(&dumping)).reason, "Price trend is DUMPING");

        let mut minted = s.clone();
        minted.supply_changed_during_check = true;
        assert_eq!(verdict(Some(&minted), Some(&t)).level, VerdictLevel::Red);

        let mut poor = s.clone();
        poor.total_liquidity.amount_usd = 100.0;
        assert!(verdict(Some(&poor), Some(&t)).reason.starts_with("Liquidity is too low"));

        let mut unlocked = s.clone();
        unlocked.is_liquidity_locked = false;
        assert_eq!(verdict(Some(&unlocked), Some(&t)).reason, "Liquidity is not locked");
    }

    #[test]
    fn test_deterministic() {
        let s = safety(0.97, true);
        let t = trend(TrendKind::Equilibrium);
        let first = verdict(Some(&s), Some(&t));
        for _ in 0..10 {
            assert_eq!(verdict(Some(&s), Some(&t)), first);
        }
    }
}
