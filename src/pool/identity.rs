//! Parsed pool keys

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use super::program::WSOL_MINT;
use crate::chain::TokenBalance;

/// Accounts of an AMM v4 pool. Immutable once parsed and shared by `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolIdentity {
    pub pool_id: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub market_id: Pubkey,
    pub authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub withdraw_queue: Pubkey,
    pub market_program_id: Pubkey,
    pub version: u8,
}

impl PoolIdentity {
    pub fn base_is_wsol(&self) -> bool {
        self.base_mint == *WSOL_MINT
    }

    pub fn has_wsol(&self) -> bool {
        self.base_is_wsol() || self.quote_mint == *WSOL_MINT
    }

    /// The newly launched token, i.e. the side that is not WSOL
    pub fn token_mint(&self) -> Pubkey {
        if self.base_is_wsol() {
            self.quote_mint
        } else {
            self.base_mint
        }
    }

    /// Pool vault holding the new token
    pub fn token_vault(&self) -> Pubkey {
        if self.base_is_wsol() {
            self.quote_vault
        } else {
            self.base_vault
        }
    }

    /// Pool vault holding the pricing currency
    pub fn currency_vault(&self) -> Pubkey {
        if self.base_is_wsol() {
            self.base_vault
        } else {
            self.quote_vault
        }
    }

    pub fn currency_mint(&self) -> Pubkey {
        if self.base_is_wsol() {
            self.base_mint
        } else {
            self.quote_mint
        }
    }
}

/// Token balances recorded in the creation transaction's metadata
#[derive(Debug, Clone, Default)]
pub struct CreationMeta {
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

impl CreationMeta {
    /// First mint that shows up in post balances but not in pre balances.
    /// For a pool creation that is the freshly minted LP token.
    pub fn newly_minted(&self) -> Option<Pubkey> {
        self.post_token_balances
            .iter()
            .map(|b| b.mint.as_str())
            .find(|mint| !self.pre_token_balances.iter().any(|b| b.mint == *mint))
            .and_then(|mint| mint.parse().ok())
    }
}

/// One decoded pool creation, produced once per signature
#[derive(Debug, Clone)]
pub struct ParsedCreationEvent {
    pub pool: Arc<PoolIdentity>,
    pub creator: Pubkey,
    pub signature: String,
    /// Start time encoded in the instruction (unix seconds, 0 = immediately)
    pub open_time: u64,
    pub init_pc_amount: u64,
    pub init_coin_amount: u64,
    pub block_time: Option<i64>,
    pub meta: CreationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(mint: &Pubkey) -> TokenBalance {
        TokenBalance {
            account_index: 0,
            mint: mint.to_string(),
            owner: None,
            amount: 1,
            decimals: 9,
        }
    }

    fn identity(base: Pubkey, quote: Pubkey) -> PoolIdentity {
        PoolIdentity {
            pool_id: Pubkey::new_unique(),
            base_mint: base,
            quote_mint: quote,
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            market_id: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            withdraw_queue: Pubkey::new_unique(),
            market_program_id: Pubkey::new_unique(),
            version: 4,
        }
    }

    #[test]
    fn test_token_side_when_base_is_wsol() {
        let token = Pubkey::new_unique();
        let pool = identity(*WSOL_MINT, token);

        assert_eq!(pool.token_mint(), token);
        assert_eq!(pool.token_vault(), pool.quote_vault);
        assert_eq!(pool.currency_vault(), pool.base_vault);
    }

    #[test]
    fn test_token_side_when_quote_is_wsol() {
        let token = Pubkey::new_unique();
        let pool = identity(token, *WSOL_MINT);

        assert_eq!(pool.token_mint(), token);
        assert_eq!(pool.token_vault(), pool.base_vault);
        assert!(pool.has_wsol());
    }

    #[test]
    fn test_newly_minted() {
        let token = Pubkey::new_unique();
        let lp = Pubkey::new_unique();
        let meta = CreationMeta {
            pre_token_balances: vec![balance(&token), balance(&WSOL_MINT)],
            post_token_balances: vec![balance(&token), balance(&WSOL_MINT), balance(&lp)],
        };
        assert_eq!(meta.newly_minted(), Some(lp));

        let unchanged = CreationMeta {
            pre_token_balances: vec![balance(&token)],
            post_token_balances: vec![balance(&token)],
        };
        assert_eq!(unchanged.newly_minted(), None);
    }
}
