//! In-memory gateway and chain fixtures for tests

use async_trait::async_trait;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use spl_associated_token_account::get_associated_token_address;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    ChainGateway, ChainInstruction, ChainTransaction, InnerInstructionSet, LogEvent,
    ParsedInstruction, Subscription, TokenAmount, TokenBalance,
};
use crate::error::{Error, Result};
use crate::pool::program::{
    INIT_ACCOUNTS, RAYDIUM_AMM_V4_STR, RAYDIUM_AUTHORITY, WSOL_DECIMALS, WSOL_MINT,
};
use crate::pool::{AmmState, PoolStatus};
use crate::safety::MintInfo;

#[derive(Default)]
struct Inner {
    transactions: HashMap<String, ChainTransaction>,
    transaction_reads: HashMap<String, usize>,
    /// Front is served next; the last version repeats forever
    accounts: HashMap<Pubkey, VecDeque<Vec<u8>>>,
    account_reads: HashMap<Pubkey, usize>,
    balances: HashMap<Pubkey, TokenAmount>,
    largest: HashMap<Pubkey, Vec<(Pubkey, u64)>>,
    signatures: HashMap<Pubkey, Vec<String>>,
    watchers: HashMap<Pubkey, Vec<mpsc::Sender<Vec<u8>>>>,
    stalled: HashSet<Pubkey>,
}

pub struct MockGateway {
    inner: Mutex<Inner>,
    log_tx: Mutex<Option<mpsc::Sender<LogEvent>>>,
    log_rx: Mutex<Option<mpsc::Receiver<LogEvent>>>,
    release: CancellationToken,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        let (log_tx, log_rx) = mpsc::channel(1024);
        Self {
            inner: Mutex::new(Inner::default()),
            log_tx: Mutex::new(Some(log_tx)),
            log_rx: Mutex::new(Some(log_rx)),
            release: CancellationToken::new(),
        }
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn push_log(&self, signature: &str, logs: Vec<String>) {
        self.push_log_event(LogEvent {
            signature: signature.to_string(),
            logs,
            failed: false,
        });
    }

    pub fn push_log_event(&self, event: LogEvent) {
        if let Some(tx) = self.log_tx.lock().unwrap().as_ref() {
            tx.try_send(event).unwrap();
        }
    }

    /// Drop the log feed, ending the subscription stream
    pub fn close_logs(&self) {
        self.log_tx.lock().unwrap().take();
    }

    pub fn add_transaction(&self, tx: ChainTransaction) {
        self.inner().transactions.insert(tx.signature.clone(), tx);
    }

    pub fn transaction_reads(&self, signature: &str) -> usize {
        self.inner()
            .transaction_reads
            .get(signature)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.inner()
            .accounts
            .insert(address, VecDeque::from([data]));
    }

    /// Queue a version served after the current ones
    pub fn push_account_version(&self, address: Pubkey, data: Vec<u8>) {
        self.inner()
            .accounts
            .entry(address)
            .or_default()
            .push_back(data);
    }

    pub fn account_reads(&self, address: &Pubkey) -> usize {
        self.inner().account_reads.get(address).copied().unwrap_or(0)
    }

    pub fn set_token_balance(&self, address: Pubkey, amount: TokenAmount) {
        self.inner().balances.insert(address, amount);
    }

    pub fn set_largest_accounts(&self, mint: Pubkey, holders: Vec<(Pubkey, u64)>) {
        self.inner().largest.insert(mint, holders);
    }

    pub fn set_signatures(&self, address: Pubkey, signatures: Vec<String>) {
        self.inner().signatures.insert(address, signatures);
    }

    /// Send `data` to every open watcher of `address`
    pub async fn notify_account(&self, address: &Pubkey, data: Vec<u8>) {
        let senders = self
            .inner()
            .watchers
            .get(address)
            .cloned()
            .unwrap_or_default();
        for sender in senders {
            let _ = sender.send(data.clone()).await;
        }
    }

    pub fn active_watchers(&self, address: &Pubkey) -> usize {
        self.inner()
            .watchers
            .get(address)
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }

    /// Reads of `address` block until [`MockGateway::release_stalled`]
    pub fn stall_account(&self, address: Pubkey) {
        self.inner().stalled.insert(address);
    }

    pub fn release_stalled(&self) {
        self.release.cancel();
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn subscribe_logs(&self, _program: &Pubkey) -> Result<Subscription<LogEvent>> {
        let rx = self
            .log_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Subscription("logs already subscribed".into()))?;
        Ok(Subscription::new(rx, CancellationToken::new()))
    }

    async fn get_transaction(&self, signature: &str) -> Result<ChainTransaction> {
        let mut inner = self.inner();
        *inner
            .transaction_reads
            .entry(signature.to_string())
            .or_default() += 1;
        inner
            .transactions
            .get(signature)
            .cloned()
            .ok_or_else(|| Error::NotFound(signature.to_string()))
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Vec<u8>> {
        let stalled = {
            let mut inner = self.inner();
            *inner.account_reads.entry(*address).or_default() += 1;
            inner.stalled.contains(address)
        };
        if stalled {
            self.release.cancelled().await;
        }

        let mut inner = self.inner();
        let versions = inner
            .accounts
            .get_mut(address)
            .ok_or_else(|| Error::NotFound(address.to_string()))?;
        let data = if versions.len() > 1 {
            versions.pop_front()
        } else {
            versions.front().cloned()
        };
        data.ok_or_else(|| Error::NotFound(address.to_string()))
    }

    async fn get_token_account_balance(&self, address: &Pubkey) -> Result<TokenAmount> {
        self.inner()
            .balances
            .get(address)
            .copied()
            .ok_or_else(|| Error::NotFound(address.to_string()))
    }

    async fn get_token_largest_accounts(&self, mint: &Pubkey) -> Result<Vec<(Pubkey, u64)>> {
        self.inner()
            .largest
            .get(mint)
            .cloned()
            .ok_or_else(|| Error::NotFound(mint.to_string()))
    }

    async fn watch_account(&self, address: &Pubkey) -> Result<Subscription<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(16);
        self.inner().watchers.entry(*address).or_default().push(tx);
        Ok(Subscription::new(rx, CancellationToken::new()))
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<String>> {
        Ok(self
            .inner()
            .signatures
            .get(address)
            .map(|sigs| sigs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

pub fn mint_data(supply: u64, decimals: u8, mint_authority: Option<Pubkey>) -> Vec<u8> {
    MintInfo {
        mint_authority,
        supply,
        decimals,
        freeze_authority: None,
    }
    .to_bytes()
}

fn transfer(source: &Pubkey, destination: &Pubkey, authority: &Pubkey, amount: u64) -> ChainInstruction {
    ChainInstruction {
        program_id: spl_token::id().to_string(),
        parsed: Some(ParsedInstruction {
            program: "spl-token".into(),
            kind: "transfer".into(),
            info: json!({
                "source": source.to_string(),
                "destination": destination.to_string(),
                "authority": authority.to_string(),
                "amount": amount.to_string(),
            }),
        }),
        ..Default::default()
    }
}

/// Swap by `user` against a pool of `mint`. `in_amount` is what the user
/// pays (SOL for a buy, tokens for a sell), `out_amount` what they receive.
pub fn swap_transaction(
    signature: &str,
    block_time: i64,
    user: &Pubkey,
    mint: &Pubkey,
    is_sell: bool,
    in_amount: u64,
    out_amount: u64,
) -> ChainTransaction {
    let user_token = get_associated_token_address(user, mint);
    let user_wsol = get_associated_token_address(user, &WSOL_MINT);
    let (source, destination) = if is_sell {
        (user_token, user_wsol)
    } else {
        (user_wsol, user_token)
    };
    let pool_in = Pubkey::new_unique();
    let pool_out = Pubkey::new_unique();

    ChainTransaction {
        signature: signature.to_string(),
        block_time: Some(block_time),
        inner_instructions: vec![InnerInstructionSet {
            index: 0,
            instructions: vec![
                transfer(&source, &pool_in, user, in_amount),
                transfer(&pool_out, &destination, &RAYDIUM_AUTHORITY, out_amount),
            ],
        }],
        ..Default::default()
    }
}

/// Keys of one fake token/WSOL pool
pub struct PoolFixture {
    pub signature: String,
    pub pool_id: Pubkey,
    pub lp_mint: Pubkey,
    /// Base mint
    pub token_mint: Pubkey,
    /// Quote vault
    pub sol_vault: Pubkey,
    /// Base vault
    pub token_vault: Pubkey,
    pub market: Pubkey,
    pub open_orders: Pubkey,
    /// Source of the first inner transfer
    pub creator: Pubkey,
    /// Fee payer
    pub creator_wallet: Pubkey,
    pub init_pc_amount: u64,
    pub init_coin_amount: u64,
}

impl Default for PoolFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolFixture {
    /// 1B tokens at 6 decimals
    pub const TOKEN_SUPPLY: u64 = 1_000_000_000_000_000;
    pub const TOKEN_DECIMALS: u8 = 6;
    /// 30 SOL
    pub const SOL_LIQUIDITY: u64 = 30_000_000_000;

    pub fn new() -> Self {
        Self {
            signature: Signature::new_unique().to_string(),
            pool_id: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            token_mint: Pubkey::new_unique(),
            sol_vault: Pubkey::new_unique(),
            token_vault: Pubkey::new_unique(),
            market: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            creator: Pubkey::new_unique(),
            creator_wallet: Pubkey::new_unique(),
            init_pc_amount: Self::SOL_LIQUIDITY,
            init_coin_amount: Self::TOKEN_SUPPLY,
        }
    }

    pub fn creation_transaction(&self, open_time: u64) -> ChainTransaction {
        let mut accounts: Vec<String> = (0..INIT_ACCOUNTS::MIN_ACCOUNTS)
            .map(|_| Pubkey::new_unique().to_string())
            .collect();
        for (index, key) in [
            (INIT_ACCOUNTS::AMM_ID, self.pool_id),
            (INIT_ACCOUNTS::AUTHORITY, *RAYDIUM_AUTHORITY),
            (INIT_ACCOUNTS::OPEN_ORDERS, self.open_orders),
            (INIT_ACCOUNTS::LP_MINT, self.lp_mint),
            (INIT_ACCOUNTS::BASE_MINT, self.token_mint),
            (INIT_ACCOUNTS::QUOTE_MINT, *WSOL_MINT),
            (INIT_ACCOUNTS::BASE_VAULT, self.token_vault),
            (INIT_ACCOUNTS::QUOTE_VAULT, self.sol_vault),
            (INIT_ACCOUNTS::MARKET, self.market),
            (INIT_ACCOUNTS::USER_WALLET, self.creator_wallet),
        ] {
            accounts[index] = key.to_string();
        }

        let mut data = vec![1u8, 254];
        data.extend_from_slice(&open_time.to_le_bytes());
        data.extend_from_slice(&self.init_pc_amount.to_le_bytes());
        data.extend_from_slice(&self.init_coin_amount.to_le_bytes());

        let balance = |mint: &Pubkey, decimals: u8| TokenBalance {
            account_index: 0,
            mint: mint.to_string(),
            owner: Some(self.creator_wallet.to_string()),
            amount: 1,
            decimals,
        };
        let pre = vec![
            balance(&self.token_mint, Self::TOKEN_DECIMALS),
            balance(&WSOL_MINT, WSOL_DECIMALS),
        ];
        let mut post = pre.clone();
        post.push(balance(&self.lp_mint, WSOL_DECIMALS));

        ChainTransaction {
            signature: self.signature.clone(),
            block_time: Some(open_time as i64),
            failed: false,
            instructions: vec![ChainInstruction {
                program_id: RAYDIUM_AMM_V4_STR.to_string(),
                accounts,
                data,
                parsed: None,
            }],
            inner_instructions: vec![InnerInstructionSet {
                index: 0,
                instructions: vec![transfer(
                    &self.creator,
                    &self.sol_vault,
                    &self.creator_wallet,
                    self.init_pc_amount,
                )],
            }],
            pre_token_balances: pre,
            post_token_balances: post,
        }
    }

    /// Log lines of the creation, as the program subscription delivers them
    pub fn creation_logs(&self, open_time: u64) -> Vec<String> {
        vec![
            format!("Program {} invoke [1]", RAYDIUM_AMM_V4_STR),
            format!(
                "Program log: initialize2: InitializeInstruction2 {{ nonce: 254, open_time: {}, init_pc_amount: {}, init_coin_amount: {} }}",
                open_time, self.init_pc_amount, self.init_coin_amount
            ),
            format!("Program {} success", RAYDIUM_AMM_V4_STR),
        ]
    }

    pub fn amm_state(&self, status: PoolStatus, open_time: u64) -> AmmState {
        AmmState {
            status,
            base_decimal: Self::TOKEN_DECIMALS,
            quote_decimal: WSOL_DECIMALS,
            pool_open_time: open_time,
            base_vault: self.token_vault,
            quote_vault: self.sol_vault,
            base_mint: self.token_mint,
            quote_mint: *WSOL_MINT,
            lp_mint: self.lp_mint,
            open_orders: self.open_orders,
            market_id: self.market,
        }
    }

    pub fn install_amm_state(&self, mock: &MockGateway, status: PoolStatus, open_time: u64) {
        mock.set_account(self.pool_id, self.amm_state(status, open_time).to_bytes());
    }

    /// Non-mintable token with `share` of supply in the pool and 30 SOL of liquidity
    pub fn install_safe_token(&self, mock: &MockGateway, share: f64, lp_burned: bool) {
        mock.set_account(
            self.token_mint,
            mint_data(Self::TOKEN_SUPPLY, Self::TOKEN_DECIMALS, None),
        );

        let in_pool = (Self::TOKEN_SUPPLY as f64 * share).round() as u64;
        mock.set_largest_accounts(
            self.token_mint,
            vec![
                (self.token_vault, in_pool),
                (Pubkey::new_unique(), Self::TOKEN_SUPPLY - in_pool),
            ],
        );

        let lp_supply = if lp_burned { 0 } else { 5_000_000_000_000 };
        mock.set_account(self.lp_mint, mint_data(lp_supply, 9, None));

        mock.set_token_balance(
            self.sol_vault,
            TokenAmount {
                amount: Self::SOL_LIQUIDITY,
                decimals: WSOL_DECIMALS,
            },
        );
        mock.set_token_balance(
            self.token_vault,
            TokenAmount {
                amount: in_pool,
                decimals: Self::TOKEN_DECIMALS,
            },
        );
    }

    /// Creation transaction, log line and an immediately tradable pool
    pub fn install(&self, mock: &MockGateway, open_time: u64) {
        mock.add_transaction(self.creation_transaction(open_time));
        self.install_amm_state(mock, PoolStatus::Swap, open_time);
    }
}
