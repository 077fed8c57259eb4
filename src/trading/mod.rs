//! Trading collaborator
//!
//! The pipeline only decides *whether* and *how much*. Swaps go through a
//! [`SwapExecutor`]:
//! - `simulation::PaperExecutor`: paper trading against live vault balances
//!
//! [`execute_trade`] runs one buy/sell round trip with the exit strategy
//! that matches the size class, retrying a failed sell once.

pub mod exit;
pub mod simulation;
pub mod wallet;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::TradingConfig;
use crate::decision::SizeClass;
use crate::error::Result;
use crate::pool::PoolIdentity;

pub use exit::ExitStrategy;
pub use simulation::PaperExecutor;
pub use wallet::TradingWallet;

/// Result of a buy
#[derive(Debug, Clone, PartialEq)]
pub struct BuyFill {
    pub signature: Option<String>,
    pub spent_sol: f64,
    /// UI amount of the new token received
    pub token_amount: f64,
}

/// Result of a sell
#[derive(Debug, Clone, PartialEq)]
pub struct SellFill {
    pub signature: Option<String>,
    pub received_sol: f64,
    /// Profit ratio observed when the exit condition fired
    pub estimated_profit: f64,
}

/// Executes swaps against a pool
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn buy(&self, pool: &PoolIdentity, amount_sol: f64) -> Result<BuyFill>;

    /// Wait for the exit condition of `exit`, then sell the whole fill
    async fn sell(&self, pool: &PoolIdentity, fill: &BuyFill, exit: &ExitStrategy) -> Result<SellFill>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Success {
        bought_sol: f64,
        sold_sol: f64,
        /// `(sold - bought) / bought`
        profit_ratio: f64,
        sell_signature: Option<String>,
    },
    Failed {
        reason: String,
        /// Set when the buy went through but the sell did not
        spent_sol: Option<f64>,
    },
}

impl TradeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TradeOutcome::Success { .. })
    }

    /// `(bought, sold)` to book in the wallet, if any SOL moved
    pub fn settlement(&self) -> Option<(f64, f64)> {
        match self {
            TradeOutcome::Success {
                bought_sol,
                sold_sol,
                ..
            } => Some((*bought_sol, *sold_sol)),
            TradeOutcome::Failed {
                spent_sol: Some(spent),
                ..
            } => Some((*spent, 0.0)),
            TradeOutcome::Failed { spent_sol: None, .. } => None,
        }
    }
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeOutcome::Success {
                bought_sol,
                sold_sol,
                profit_ratio,
                ..
            } => write!(
                f,
                "bought for {:.4} SOL, sold for {:.4} SOL ({:+.2}%)",
                bought_sol,
                sold_sol,
                profit_ratio * 100.0
            ),
            TradeOutcome::Failed { reason, .. } => write!(f, "trade failed: {}", reason),
        }
    }
}

pub fn buy_amount(size: SizeClass, config: &TradingConfig) -> f64 {
    match size {
        SizeClass::Large => config.large_buy_sol,
        SizeClass::Small => config.small_buy_sol,
    }
}

/// One buy/sell round trip. Never errors: failures become `TradeOutcome::Failed`.
pub async fn execute_trade(
    executor: &dyn SwapExecutor,
    pool: &PoolIdentity,
    size: SizeClass,
    config: &TradingConfig,
) -> TradeOutcome {
    let amount = buy_amount(size, config);
    let exit = ExitStrategy::for_size(size);

    info!(
        "Buying {} SOL of {} in pool {}, exit {}",
        amount,
        pool.token_mint(),
        pool.pool_id,
        exit
    );

    let fill = match executor.buy(pool, amount).await {
        Ok(fill) => fill,
        Err(e) => {
            error!("Buy failed for pool {}: {}", pool.pool_id, e);
            return TradeOutcome::Failed {
                reason: format!("Buy transaction failed: {}", e),
                spent_sol: None,
            };
        }
    };

    info!(
        "Bought {} tokens for {} SOL (tx: {:?})",
        fill.token_amount, fill.spent_sol, fill.signature
    );

    let sold = match executor.sell(pool, &fill, &exit).await {
        Ok(sold) => sold,
        Err(first) => {
            warn!("Sell failed for pool {}: {}. Retrying", pool.pool_id, first);
            match executor.sell(pool, &fill, &ExitStrategy::IMMEDIATE).await {
                Ok(sold) => sold,
                Err(e) => {
                    error!("Sell retry failed for pool {}: {}", pool.pool_id, e);
                    return TradeOutcome::Failed {
                        reason: format!("Sell failed: {}", e),
                        spent_sol: Some(fill.spent_sol),
                    };
                }
            }
        }
    };

    let profit_ratio = (sold.received_sol - fill.spent_sol) / fill.spent_sol;
    info!(
        "Sold for {} SOL (estimated profit {:.2}%, final {:.2}%)",
        sold.received_sol,
        sold.estimated_profit * 100.0,
        profit_ratio * 100.0
    );

    TradeOutcome::Success {
        bought_sol: fill.spent_sol,
        sold_sol: sold.received_sol,
        profit_ratio,
        sell_signature: sold.signature,
    }
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedExecutor;
    use super::*;
    use crate::chain::mock::PoolFixture;
    use crate::pool::parse_creation;

    fn pool() -> std::sync::Arc<PoolIdentity> {
        parse_creation(&PoolFixture::new().creation_transaction(0))
            .unwrap()
            .pool
    }

    #[tokio::test]
    async fn test_successful_round_trip() {
        let executor = ScriptedExecutor::new(1.5);
        let outcome = execute_trade(&executor, &pool(), SizeClass::Large, &TradingConfig::default()).await;

        match outcome {
            TradeOutcome::Success {
                bought_sol,
                sold_sol,
                profit_ratio,
                ..
            } => {
                assert_eq!(bought_sol, 0.3);
                assert!((sold_sol - 0.45).abs() < 1e-12);
                assert!((profit_ratio - 0.5).abs() < 1e-12);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(*executor.sells.lock().unwrap(), vec!["SAFE"]);
    }

    #[tokio::test]
    async fn test_small_size_uses_dangerous_exit() {
        let executor = ScriptedExecutor::new(1.0);
        execute_trade(&executor, &pool(), SizeClass::Small, &TradingConfig::default()).await;

        assert_eq!(*executor.buys.lock().unwrap(), vec![0.1]);
        assert_eq!(*executor.sells.lock().unwrap(), vec!["DANGEROUS"]);
    }

    #[tokio::test]
    async fn test_sell_retried_once() {
        let executor = ScriptedExecutor::new(1.2);
        executor.fail_next_sell("blockhash expired");

        let outcome = execute_trade(&executor, &pool(), SizeClass::Small, &TradingConfig::default()).await;
        assert!(outcome.is_success());
        assert_eq!(*executor.sells.lock().unwrap(), vec!["DANGEROUS", "IMMEDIATE"]);
    }

    #[tokio::test]
    async fn test_sell_failure_keeps_spent_amount() {
        let executor = ScriptedExecutor::new(1.2);
        executor.fail_next_sell("first");
        executor.fail_next_sell("second");

        let outcome = execute_trade(&executor, &pool(), SizeClass::Large, &TradingConfig::default()).await;
        assert_eq!(outcome.settlement(), Some((0.3, 0.0)));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_buy_failure() {
        let executor = ScriptedExecutor::new(1.2);
        executor.fail_next_buy("insufficient funds");

        let outcome = execute_trade(&executor, &pool(), SizeClass::Large, &TradingConfig::default()).await;
        assert_eq!(outcome.settlement(), None);
        assert!(executor.sells.lock().unwrap().is_empty());
    }
}
