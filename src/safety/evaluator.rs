//! Rug-risk assessment of a freshly created pool
//!
//! Evaluation is split into phases so the orchestrator can record the
//! LP burn wait as its own stage:
//!
//! 1. [`SafetyEvaluator::inspect`]: blacklist, mint authorities, creator and
//!    authority holdings, LP mint, pool share of supply, immediate burn check
//! 2. [`SafetyEvaluator::await_lp_burn`]: bounded wait, only when
//!    [`Inspection::needs_lp_wait`] says so
//! 3. [`SafetyEvaluator::finalize`]: supply re-check and liquidity value

use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::blacklist::Blacklist;
use super::lp_lock::{check_burned, wait_for_burn, WaitOutcome};
use super::mint::MintInfo;
use crate::chain::{ChainGateway, RetryPolicy};
use crate::config::SafetyConfig;
use crate::error::{Error, Result};
use crate::pool::program::WSOL_MINT;
use crate::pool::{ParsedCreationEvent, PoolIdentity};

/// Quote-side liquidity of the pool
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityValue {
    pub amount: f64,
    pub amount_usd: f64,
    pub symbol: String,
}

/// Result of a completed safety evaluation. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyAssessment {
    pub creator: Pubkey,
    pub token_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub is_liquidity_locked: bool,
    /// Fraction of token supply sitting in the pool vault (0..1)
    pub new_token_pool_balance_percent: f64,
    /// Fraction of supply in the creator's associated token account
    pub creator_balance_percent: f64,
    /// Fraction of supply held by the mint authority, or by the freeze
    /// authority when minting is renounced
    pub authority_balance_percent: f64,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub is_mintable: bool,
    pub total_liquidity: LiquidityValue,
    pub supply_changed_during_check: bool,
    pub waited_for_lp_burn: bool,
}

/// State carried from `inspect` to `finalize`
#[derive(Debug, Clone)]
pub struct Inspection {
    pub pool: Arc<PoolIdentity>,
    pub creator: Pubkey,
    pub token_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub initial_mint: MintInfo,
    pub pool_share: f64,
    pub creator_share: f64,
    pub authority_share: f64,
    pub lp_burned: bool,
    min_share_for_wait: f64,
}

impl Inspection {
    /// LP not burned yet, but enough supply is in the pool that a burn is likely coming
    pub fn needs_lp_wait(&self) -> bool {
        !self.lp_burned && self.pool_share >= self.min_share_for_wait
    }
}

/// Outcome of the first phase
#[derive(Debug, Clone)]
pub enum SafetyOutcome {
    CreatorBlacklisted(Pubkey),
    /// Could not verify safety; treated as RED downstream
    Unavailable(String),
    Pending(Box<Inspection>),
}

pub struct SafetyEvaluator {
    gateway: Arc<dyn ChainGateway>,
    blacklist: Blacklist,
    config: SafetyConfig,
    retry: RetryPolicy,
}

impl SafetyEvaluator {
    pub fn new(gateway: Arc<dyn ChainGateway>, config: SafetyConfig, retry: RetryPolicy) -> Self {
        let blacklist = Blacklist::new(&config.extra_blacklist);
        Self {
            gateway,
            blacklist,
            config,
            retry,
        }
    }

    /// Phase 1. Never errors: fetch failures become `Unavailable`.
    pub async fn inspect(&self, event: &ParsedCreationEvent) -> SafetyOutcome {
        if self.blacklist.contains(&event.creator) {
            info!("Creator blacklisted: {}", event.creator);
            return SafetyOutcome::CreatorBlacklisted(event.creator);
        }

        match self.try_inspect(event).await {
            Ok(inspection) => SafetyOutcome::Pending(Box::new(inspection)),
            Err(e) => {
                warn!("Safety inspection of {} failed: {}", event.pool.pool_id, e);
                SafetyOutcome::Unavailable(e.to_string())
            }
        }
    }

    async fn try_inspect(&self, event: &ParsedCreationEvent) -> Result<Inspection> {
        let pool = event.pool.clone();
        let token_mint = pool.token_mint();

        let initial_mint = self.fetch_mint(&token_mint).await?;

        let creator_share = self
            .holder_share(&event.creator, &token_mint, &initial_mint)
            .await;
        let authority_share = match initial_mint
            .mint_authority
            .or(initial_mint.freeze_authority)
        {
            Some(authority) => self.holder_share(&authority, &token_mint, &initial_mint).await,
            None => 0.0,
        };

        let lp_mint = event.meta.newly_minted().ok_or_else(|| {
            Error::Parse("no LP token minted by the creation transaction".into())
        })?;

        let pool_share = self.pool_share(&pool, &token_mint, &initial_mint).await?;

        let lp_burned = check_burned(
            self.gateway.as_ref(),
            &lp_mint,
            self.config.lp_burn_threshold,
            self.config.lp_check_attempts,
            Duration::from_millis(self.config.lp_check_delay_ms),
        )
        .await;

        debug!(
            "Inspected {}: share {:.4}, creator {:.4}, authority {:.4}, LP burned {}, mintable {}",
            pool.pool_id,
            pool_share,
            creator_share,
            authority_share,
            lp_burned,
            initial_mint.is_mintable()
        );

        Ok(Inspection {
            pool,
            creator: event.creator,
            token_mint,
            lp_mint,
            initial_mint,
            pool_share,
            creator_share,
            authority_share,
            lp_burned,
            min_share_for_wait: self.config.lp_wait_min_pool_share,
        })
    }

    /// Phase 2. Bounded by `lp_burn_wait_secs` and `cancel`.
    pub async fn await_lp_burn(
        &self,
        inspection: &Inspection,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        info!(
            "{:.1}% of tokens are in pool {}, but LP is not burned yet",
            inspection.pool_share * 100.0,
            inspection.pool.pool_id
        );

        wait_for_burn(
            self.gateway.as_ref(),
            &inspection.lp_mint,
            self.config.lp_burn_threshold,
            Duration::from_secs(self.config.lp_burn_wait_secs),
            cancel,
        )
        .await
    }

    /// Phase 3. `waited` is the LP wait outcome when a wait happened.
    pub async fn finalize(
        &self,
        inspection: &Inspection,
        waited: Option<&WaitOutcome>,
    ) -> Result<SafetyAssessment> {
        let is_liquidity_locked =
            inspection.lp_burned || waited.map(WaitOutcome::is_locked).unwrap_or(false);

        let latest = self.fetch_mint(&inspection.token_mint).await?;
        let supply_changed_during_check = latest.supply != inspection.initial_mint.supply;
        if supply_changed_during_check {
            warn!(
                "Supply of {} changed during validation: {} -> {}",
                inspection.token_mint, inspection.initial_mint.supply, latest.supply
            );
        }

        // After a long wait the authority may have been renounced (or not)
        let mint_authority = if waited.is_some() {
            latest.mint_authority
        } else {
            inspection.initial_mint.mint_authority
        };

        let total_liquidity = self.liquidity(&inspection.pool).await?;
        info!(
            "Real liquidity of {}: {} {}",
            inspection.pool.pool_id, total_liquidity.amount, total_liquidity.symbol
        );

        Ok(SafetyAssessment {
            creator: inspection.creator,
            token_mint: inspection.token_mint,
            lp_mint: inspection.lp_mint,
            is_liquidity_locked,
            new_token_pool_balance_percent: inspection.pool_share,
            creator_balance_percent: inspection.creator_share,
            authority_balance_percent: inspection.authority_share,
            mint_authority,
            freeze_authority: inspection.initial_mint.freeze_authority,
            is_mintable: mint_authority.is_some(),
            total_liquidity,
            supply_changed_during_check,
            waited_for_lp_burn: waited.is_some(),
        })
    }

    async fn fetch_mint(&self, mint: &Pubkey) -> Result<MintInfo> {
        let data = self
            .retry
            .run("get_mint", || self.gateway.get_account_data(mint))
            .await?;
        MintInfo::decode(&data)
    }

    /// Share of supply in `owner`'s associated token account. A missing or
    /// unreadable account counts as holding nothing.
    async fn holder_share(&self, owner: &Pubkey, mint: &Pubkey, info: &MintInfo) -> f64 {
        if info.supply == 0 {
            return 0.0;
        }

        let account = get_associated_token_address(owner, mint);
        match self.gateway.get_token_account_balance(&account).await {
            Ok(balance) => balance.amount as f64 / info.supply as f64,
            Err(e) => {
                debug!("No holdings for {} in {}: {}", owner, mint, e);
                0.0
            }
        }
    }

    /// Share of supply held by the pool's token vault among the largest holders
    async fn pool_share(&self, pool: &PoolIdentity, mint: &Pubkey, info: &MintInfo) -> Result<f64> {
        if info.supply == 0 {
            return Ok(0.0);
        }

        let holders = self
            .retry
            .run("get_token_largest_accounts", || {
                self.gateway.get_token_largest_accounts(mint)
            })
            .await?;

        let vault = pool.token_vault();
        Ok(holders
            .iter()
            .find(|(address, _)| *address == vault)
            .map(|(_, amount)| *amount as f64 / info.supply as f64)
            .unwrap_or(0.0))
    }

    async fn liquidity(&self, pool: &PoolIdentity) -> Result<LiquidityValue> {
        let vault = pool.currency_vault();
        let balance = self
            .retry
            .run("get_token_account_balance", || {
                self.gateway.get_token_account_balance(&vault)
            })
            .await?;

        let amount = balance.ui_amount();
        let is_sol = pool.currency_mint() == *WSOL_MINT;
        Ok(LiquidityValue {
            amount,
            amount_usd: if is_sol {
                amount * self.config.sol_usd_rate
            } else {
                amount
            },
            symbol: if is_sol { "SOL" } else { "USD" }.to_string(),
        })
    }
}
