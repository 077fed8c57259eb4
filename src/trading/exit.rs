//! Exit strategies handed to the executor on sell

use std::time::Duration;

use crate::decision::SizeClass;

/// When to give up waiting for profit and sell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitStrategy {
    pub name: &'static str,
    /// Sell no later than this after the buy
    pub timeout: Duration,
    /// Sell once `(value - spent) / spent` reaches this
    pub target_profit: f64,
    pub poll_interval: Duration,
}

impl ExitStrategy {
    /// Long hold for tokens that passed every check
    pub const SAFE: ExitStrategy = ExitStrategy {
        name: "SAFE",
        timeout: Duration::from_secs(24 * 60 * 60),
        target_profit: 2.9,
        poll_interval: Duration::from_secs(10),
    };

    /// Quick in and out: the owner can still dump
    pub const DANGEROUS: ExitStrategy = ExitStrategy {
        name: "DANGEROUS",
        timeout: Duration::from_secs(60),
        target_profit: 0.19,
        poll_interval: Duration::from_millis(500),
    };

    /// Sell right away; used for the sell retry
    pub const IMMEDIATE: ExitStrategy = ExitStrategy {
        name: "IMMEDIATE",
        timeout: Duration::ZERO,
        target_profit: 0.0,
        poll_interval: Duration::ZERO,
    };

    pub fn for_size(size: SizeClass) -> ExitStrategy {
        match size {
            SizeClass::Large => Self::SAFE,
            SizeClass::Small => Self::DANGEROUS,
        }
    }
}

impl std::fmt::Display for ExitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (target +{:.0}%, timeout {}s)",
            self.name,
            self.target_profit * 100.0,
            self.timeout.as_secs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_per_size() {
        assert_eq!(ExitStrategy::for_size(SizeClass::Large), ExitStrategy::SAFE);
        assert_eq!(ExitStrategy::for_size(SizeClass::Small), ExitStrategy::DANGEROUS);
        assert!(ExitStrategy::DANGEROUS.timeout < ExitStrategy::SAFE.timeout);
    }
}
