//! Paper trading
//!
//! Fills at the spot price implied by the pool's vault balances and
//! tracks the position until the exit strategy fires. No transaction is
//! built or sent.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BuyFill, ExitStrategy, SellFill, SwapExecutor};
use crate::chain::{ChainGateway, RetryPolicy};
use crate::error::{Error, Result};
use crate::pool::PoolIdentity;

/// Consecutive falling polls (net of rises) after which we sell early
const PRICE_DOWN_LIMIT: u32 = 10;

pub struct PaperExecutor {
    gateway: Arc<dyn ChainGateway>,
    retry: RetryPolicy,
    /// Cancelled on shutdown; open positions are sold at once
    cancel: CancellationToken,
}

impl PaperExecutor {
    pub fn new(gateway: Arc<dyn ChainGateway>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            gateway,
            retry,
            cancel,
        }
    }

    /// SOL per token from the vault balances
    async fn spot_price(&self, pool: &PoolIdentity) -> Result<f64> {
        let currency_vault = pool.currency_vault();
        let token_vault = pool.token_vault();

        let currency = self
            .retry
            .run("get_token_account_balance", || {
                self.gateway.get_token_account_balance(&currency_vault)
            })
            .await?;
        let tokens = self
            .retry
            .run("get_token_account_balance", || {
                self.gateway.get_token_account_balance(&token_vault)
            })
            .await?;

        if tokens.amount == 0 {
            return Err(Error::Internal(format!("token vault {} is empty", token_vault)));
        }
        Ok(currency.ui_amount() / tokens.ui_amount())
    }

    /// Poll until the target profit is reached or the price keeps falling.
    /// `estimated_profit` holds the last observed profit ratio.
    async fn wait_for_profit(
        &self,
        pool: &PoolIdentity,
        fill: &BuyFill,
        exit: &ExitStrategy,
        estimated_profit: &mut f64,
    ) {
        let mut down_budget = PRICE_DOWN_LIMIT;
        let mut previous_value = 0.0;

        loop {
            match self.spot_price(pool).await {
                Ok(price) => {
                    let value = fill.token_amount * price;
                    *estimated_profit = (value - fill.spent_sol) / fill.spent_sol;

                    if value < previous_value {
                        down_budget -= 1;
                    } else if down_budget < PRICE_DOWN_LIMIT {
                        down_budget += 1;
                    }
                    previous_value = value;

                    debug!(
                        "Pool {}: value {:.6} SOL, profit {:.2}%, down budget {}",
                        pool.pool_id,
                        value,
                        *estimated_profit * 100.0,
                        down_budget
                    );

                    if *estimated_profit >= exit.target_profit {
                        info!("Target profit reached for pool {}", pool.pool_id);
                        return;
                    }
                    if down_budget == 0 {
                        warn!("Price keeps falling in pool {}, exiting early", pool.pool_id);
                        return;
                    }
                }
                Err(e) => warn!("Failed to price pool {}: {}", pool.pool_id, e),
            }

            sleep(exit.poll_interval).await;
        }
    }
}

#[async_trait]
impl SwapExecutor for PaperExecutor {
    async fn buy(&self, pool: &PoolIdentity, amount_sol: f64) -> Result<BuyFill> {
        if !pool.has_wsol() {
            return Err(Error::Buy("No SOL in pair".into()));
        }

        let price = self
            .spot_price(pool)
            .await
            .map_err(|e| Error::Buy(e.to_string()))?;

        Ok(BuyFill {
            signature: None,
            spent_sol: amount_sol,
            token_amount: amount_sol / price,
        })
    }

    async fn sell(&self, pool: &PoolIdentity, fill: &BuyFill, exit: &ExitStrategy) -> Result<SellFill> {
        let mut estimated_profit = 0.0;

        if !self.cancel.is_cancelled() && !exit.timeout.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested, closing position in pool {}", pool.pool_id);
                }
                waited = timeout(exit.timeout, self.wait_for_profit(pool, fill, exit, &mut estimated_profit)) => {
                    if waited.is_err() {
                        info!("Exit timeout ({}s) for pool {}", exit.timeout.as_secs(), pool.pool_id);
                    }
                }
            }
        }

        let price = self
            .spot_price(pool)
            .await
            .map_err(|e| Error::Sell(e.to_string()))?;

        Ok(SellFill {
            signature: None,
            received_sol: fill.token_amount * price,
            estimated_profit,
        })
    }
}
