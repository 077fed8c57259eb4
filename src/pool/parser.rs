//! Pool creation transaction parser

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::debug;

use super::identity::{CreationMeta, ParsedCreationEvent, PoolIdentity};
use super::program::{
    INITIALIZE2_DATA_LEN, INITIALIZE2_TAG, INIT_ACCOUNTS, RAYDIUM_AMM_V4_STR,
};
use crate::chain::{ChainGateway, ChainInstruction, ChainTransaction, RetryPolicy};
use crate::error::{Error, Result};

/// Fetch `signature` and decode it as a pool creation.
///
/// Fetch failures surface after the retry budget as the gateway error
/// (`Rpc`/`NotFound`); shape problems surface as `Error::Parse`.
pub async fn fetch_creation(
    gateway: &dyn ChainGateway,
    signature: &str,
    retry: RetryPolicy,
) -> Result<ParsedCreationEvent> {
    let tx = retry
        .run("get_transaction", || gateway.get_transaction(signature))
        .await?;

    parse_creation(&tx)
}

/// Decode a fetched transaction into pool keys and creation metadata
pub fn parse_creation(tx: &ChainTransaction) -> Result<ParsedCreationEvent> {
    if tx.failed {
        return Err(Error::Parse(format!("{} failed on chain", tx.signature)));
    }

    let ix = tx
        .instructions
        .iter()
        .find(|ix| is_initialize2(ix))
        .ok_or_else(|| Error::Parse(format!("{} has no initialize2 instruction", tx.signature)))?;

    let account = |index: usize| -> Result<Pubkey> {
        let key = &ix.accounts[index];
        key.parse()
            .map_err(|e| Error::Parse(format!("account #{} ({}) is not a pubkey: {}", index, key, e)))
    };

    let pool = PoolIdentity {
        pool_id: account(INIT_ACCOUNTS::AMM_ID)?,
        authority: account(INIT_ACCOUNTS::AUTHORITY)?,
        open_orders: account(INIT_ACCOUNTS::OPEN_ORDERS)?,
        lp_mint: account(INIT_ACCOUNTS::LP_MINT)?,
        base_mint: account(INIT_ACCOUNTS::BASE_MINT)?,
        quote_mint: account(INIT_ACCOUNTS::QUOTE_MINT)?,
        base_vault: account(INIT_ACCOUNTS::BASE_VAULT)?,
        quote_vault: account(INIT_ACCOUNTS::QUOTE_VAULT)?,
        withdraw_queue: account(INIT_ACCOUNTS::WITHDRAW_QUEUE)?,
        target_orders: account(INIT_ACCOUNTS::TARGET_ORDERS)?,
        market_program_id: account(INIT_ACCOUNTS::MARKET_PROGRAM)?,
        market_id: account(INIT_ACCOUNTS::MARKET)?,
        version: 4,
    };

    let data = &ix.data;
    let open_time = read_u64(data, 2);
    let init_pc_amount = read_u64(data, 10);
    let init_coin_amount = read_u64(data, 18);

    let creator = match creator_from_inner(tx) {
        Some(creator) => creator,
        None => {
            debug!("{}: no transfer source in inner instructions, using signer", tx.signature);
            account(INIT_ACCOUNTS::USER_WALLET)?
        }
    };

    Ok(ParsedCreationEvent {
        pool: Arc::new(pool),
        creator,
        signature: tx.signature.clone(),
        open_time,
        init_pc_amount,
        init_coin_amount,
        block_time: tx.block_time,
        meta: CreationMeta {
            pre_token_balances: tx.pre_token_balances.clone(),
            post_token_balances: tx.post_token_balances.clone(),
        },
    })
}

fn is_initialize2(ix: &ChainInstruction) -> bool {
    ix.program_id == RAYDIUM_AMM_V4_STR
        && ix.accounts.len() >= INIT_ACCOUNTS::MIN_ACCOUNTS
        && ix.data.len() >= INITIALIZE2_DATA_LEN
        && ix.data[0] == INITIALIZE2_TAG
}

/// `source` of the first parsed inner instruction that has one
fn creator_from_inner(tx: &ChainTransaction) -> Option<Pubkey> {
    tx.inner_instructions
        .iter()
        .flat_map(|set| set.instructions.iter())
        .find_map(|ix| ix.info_str("source"))
        .and_then(|source| source.parse().ok())
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
