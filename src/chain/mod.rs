//! Chain data gateway
//!
//! Everything the pipeline needs from a Solana node goes through
//! [`ChainGateway`]: log subscriptions, parsed transactions, raw account
//! data, token balances and account watches. The production
//! implementation lives in [`rpc`]; the pipeline only sees the trait.
//!
//! Calls are single-shot. Callers wrap them in a [`RetryPolicy`] so every
//! stage decides its own retry budget.

pub mod retry;
pub mod rpc;
pub mod types;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use retry::RetryPolicy;
pub use rpc::RpcGateway;
pub use types::{
    ChainInstruction, ChainTransaction, InnerInstructionSet, LogEvent, ParsedInstruction,
    TokenAmount, TokenBalance,
};

/// Remote chain queries used by the pipeline
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Stream of transaction logs mentioning `program`.
    /// Delivery is at-least-once; consumers must dedup by signature.
    async fn subscribe_logs(&self, program: &Pubkey) -> Result<Subscription<LogEvent>>;

    /// Fetch a jsonParsed transaction. `Error::NotFound` when the node
    /// does not have it yet.
    async fn get_transaction(&self, signature: &str) -> Result<ChainTransaction>;

    /// Raw account data. `Error::NotFound` when the account does not exist.
    async fn get_account_data(&self, address: &Pubkey) -> Result<Vec<u8>>;

    async fn get_token_account_balance(&self, address: &Pubkey) -> Result<TokenAmount>;

    /// Largest token accounts of `mint` as `(address, raw amount)`
    async fn get_token_largest_accounts(&self, mint: &Pubkey) -> Result<Vec<(Pubkey, u64)>>;

    /// Raw data of `address` every time the account changes, until the
    /// returned subscription is dropped.
    async fn watch_account(&self, address: &Pubkey) -> Result<Subscription<Vec<u8>>>;

    /// Signatures of successful transactions touching `address`, newest first
    async fn get_signatures_for_address(&self, address: &Pubkey, limit: usize)
        -> Result<Vec<String>>;
}

/// Push-based stream handed out by the gateway.
///
/// Dropping the subscription cancels its token, which tells the task
/// feeding it to unsubscribe from the node.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::Receiver<T>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Next item, `None` once the feeding side has gone away
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drop_cancels_feeder() {
        let (tx, rx) = mpsc::channel::<u8>(4);
        let cancel = CancellationToken::new();
        let feeder = cancel.clone();

        let mut sub = Subscription::new(rx, cancel);
        tx.send(7).await.unwrap();
        assert_eq!(sub.next().await, Some(7));
        assert!(!feeder.is_cancelled());

        drop(sub);
        assert!(feeder.is_cancelled());
        assert!(tx.is_closed());
    }
}
