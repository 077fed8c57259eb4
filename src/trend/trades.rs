//! Trade history reconstruction from pool swap transactions

use futures::stream::{self, StreamExt};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use tracing::{debug, warn};

use crate::chain::{ChainGateway, ChainInstruction, ChainTransaction, RetryPolicy};
use crate::error::Result;
use crate::pool::program::WSOL_DECIMALS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Buy,
    Sell,
}

/// One swap against the pool
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub signature: String,
    /// Unix seconds
    pub timestamp: i64,
    pub kind: TradeKind,
    /// Token amount in raw units
    pub raw_amount: u64,
    /// SOL per token
    pub price: f64,
}

/// Fetch up to `limit` recent swaps of `pool_id`, oldest first.
///
/// Individual transactions that cannot be fetched are skipped; only the
/// signature listing is fatal.
pub async fn fetch_latest_trades(
    gateway: &dyn ChainGateway,
    pool_id: &Pubkey,
    token_mint: &Pubkey,
    token_decimals: u8,
    limit: usize,
    parallelism: usize,
    retry: RetryPolicy,
) -> Result<Vec<TradeRecord>> {
    let signatures = retry
        .run("get_signatures_for_address", || {
            gateway.get_signatures_for_address(pool_id, limit)
        })
        .await?;

    debug!("Fetched {} signatures for pool {}", signatures.len(), pool_id);

    let transactions: Vec<_> = stream::iter(signatures)
        .map(|signature| async move {
            let result = retry
                .run("get_transaction", || gateway.get_transaction(&signature))
                .await;
            (signature, result)
        })
        .buffer_unordered(parallelism.max(1))
        .collect()
        .await;

    let mut trades: Vec<TradeRecord> = transactions
        .into_iter()
        .filter_map(|(signature, result)| match result {
            Ok(tx) => parse_trade(&tx, token_mint, token_decimals),
            Err(e) => {
                warn!("Skipping trade {}: {}", signature, e);
                None
            }
        })
        .collect();

    trades.sort_by_key(|t| t.timestamp);
    Ok(trades)
}

/// Rebuild a swap from the first inner instruction set that holds at least
/// two token transfers. The first transfer is the user paying in, the
/// second the pool paying out.
pub fn parse_trade(tx: &ChainTransaction, token_mint: &Pubkey, token_decimals: u8) -> Option<TradeRecord> {
    if tx.failed {
        return None;
    }

    let transfers: Vec<&ChainInstruction> = tx
        .inner_instructions
        .iter()
        .map(|set| {
            set.instructions
                .iter()
                .filter(|ix| ix.is_token_transfer() && is_token_program(ix))
                .collect::<Vec<_>>()
        })
        .find(|pair| pair.len() >= 2)?;

    let paid_in = transfers[0];
    let paid_out = transfers[1];

    let authority: Pubkey = paid_in.info_str("authority")?.parse().ok()?;
    let user_token_account = get_associated_token_address(&authority, token_mint);
    let is_sell = paid_in.info_str("source")? == user_token_account.to_string();

    let in_amount: u64 = paid_in.info_str("amount")?.parse().ok()?;
    let out_amount: u64 = paid_out.info_str("amount")?.parse().ok()?;
    let (token_raw, sol_raw) = if is_sell {
        (in_amount, out_amount)
    } else {
        (out_amount, in_amount)
    };

    if token_raw == 0 {
        return None;
    }

    let tokens = token_raw as f64 / 10f64.powi(token_decimals as i32);
    let sol = sol_raw as f64 / 10f64.powi(WSOL_DECIMALS as i32);

    Some(TradeRecord {
        signature: tx.signature.clone(),
        timestamp: tx.block_time.unwrap_or(0),
        kind: if is_sell { TradeKind::Sell } else { TradeKind::Buy },
        raw_amount: token_raw,
        price: sol / tokens,
    })
}

fn is_token_program(ix: &ChainInstruction) -> bool {
    ix.program_id == spl_token::id().to_string()
}
