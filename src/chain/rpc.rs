//! Gateway over the Solana JSON-RPC and PubSub endpoints

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use solana_account_decoder::parse_token::UiTokenAmount;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcTransactionConfig, RpcTransactionLogsConfig,
    RpcTransactionLogsFilter,
};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionEncoding, UiTransactionTokenBalance,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::types::{
    ChainInstruction, ChainTransaction, InnerInstructionSet, LogEvent, ParsedInstruction,
    TokenAmount, TokenBalance,
};
use super::{ChainGateway, Subscription};
use crate::config::RpcConfig;
use crate::error::{Error, Result};

const LOG_CHANNEL_CAPACITY: usize = 1024;
const WATCH_CHANNEL_CAPACITY: usize = 64;

/// Production gateway
pub struct RpcGateway {
    client: Arc<RpcClient>,
    ws_endpoint: String,
    commitment: CommitmentConfig,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
}

impl RpcGateway {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let commitment = CommitmentConfig::from_str(&config.commitment)
            .map_err(|e| Error::Config(format!("Invalid commitment {}: {}", config.commitment, e)))?;

        let client = RpcClient::new_with_timeout_and_commitment(
            config.endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
            commitment,
        );

        Ok(Self {
            client: Arc::new(client),
            ws_endpoint: config.ws_endpoint.clone(),
            commitment,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
        })
    }

    /// Current slot, used as a reachability probe
    pub async fn health_check(&self) -> Result<u64> {
        Ok(self.client.get_slot().await?)
    }

    /// getTransaction rejects `processed`
    fn transaction_commitment(&self) -> CommitmentConfig {
        if self.commitment.is_at_least_confirmed() {
            self.commitment
        } else {
            CommitmentConfig::confirmed()
        }
    }
}

#[async_trait]
impl ChainGateway for RpcGateway {
    async fn subscribe_logs(&self, program: &Pubkey) -> Result<Subscription<LogEvent>> {
        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let stream = LogStream {
            ws_endpoint: self.ws_endpoint.clone(),
            program: *program,
            commitment: self.commitment,
            reconnect_delay: self.reconnect_delay,
            max_reconnect_attempts: self.max_reconnect_attempts,
        };
        tokio::spawn(stream.run(tx, cancel.clone(), ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Subscription::new(rx, cancel)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Subscription("log stream task exited".into())),
        }
    }

    async fn get_transaction(&self, signature: &str) -> Result<ChainTransaction> {
        let sig = Signature::from_str(signature)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", signature, e)))?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(self.transaction_commitment()),
            max_supported_transaction_version: Some(0),
        };

        match self.client.get_transaction_with_config(&sig, config).await {
            Ok(tx) => convert_transaction(signature, tx),
            // The node answers `null` for transactions it has not seen yet
            Err(e) if e.to_string().contains("null") => Err(Error::NotFound(signature.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?;

        response
            .value
            .map(|account| account.data)
            .ok_or_else(|| Error::NotFound(address.to_string()))
    }

    async fn get_token_account_balance(&self, address: &Pubkey) -> Result<TokenAmount> {
        let response = self
            .client
            .get_token_account_balance_with_commitment(address, self.commitment)
            .await?;

        token_amount(&response.value)
    }

    async fn get_token_largest_accounts(&self, mint: &Pubkey) -> Result<Vec<(Pubkey, u64)>> {
        let response = self
            .client
            .get_token_largest_accounts_with_commitment(mint, self.commitment)
            .await?;

        response
            .value
            .iter()
            .map(|holder| {
                let address = Pubkey::from_str(&holder.address)?;
                Ok((address, token_amount(&holder.amount)?.amount))
            })
            .collect()
    }

    async fn watch_account(&self, address: &Pubkey) -> Result<Subscription<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        tokio::spawn(watch_account_task(
            self.ws_endpoint.clone(),
            *address,
            self.commitment,
            tx,
            cancel.clone(),
            ready_tx,
        ));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Subscription::new(rx, cancel)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Subscription("account watch task exited".into())),
        }
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<String>> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: None,
            until: None,
            limit: Some(limit),
            commitment: Some(self.transaction_commitment()),
        };

        let statuses = self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await?;

        Ok(statuses
            .into_iter()
            .filter(|status| status.err.is_none())
            .map(|status| status.signature)
            .collect())
    }
}

/// Program log subscription with reconnects
struct LogStream {
    ws_endpoint: String,
    program: Pubkey,
    commitment: CommitmentConfig,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
}

impl LogStream {
    async fn run(
        self,
        tx: mpsc::Sender<LogEvent>,
        cancel: CancellationToken,
        ready: oneshot::Sender<Result<()>>,
    ) {
        let mut ready = Some(ready);
        let mut reconnect_attempts = 0u32;

        loop {
            if cancel.is_cancelled() || tx.is_closed() {
                break;
            }

            match self.stream_once(&tx, &cancel, &mut ready).await {
                Ok(()) => {
                    // Clean disconnect
                    reconnect_attempts = 0;
                }
                Err(e) => {
                    // The very first connection is reported to the caller instead
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Err(e));
                        return;
                    }

                    error!("Log subscription error: {}", e);
                    reconnect_attempts += 1;

                    if self.max_reconnect_attempts > 0
                        && reconnect_attempts >= self.max_reconnect_attempts
                    {
                        error!(
                            "Max reconnect attempts ({}) reached, closing log stream",
                            self.max_reconnect_attempts
                        );
                        break;
                    }
                }
            }

            if cancel.is_cancelled() || tx.is_closed() {
                break;
            }

            warn!("Reconnecting log subscription in {:?}...", self.reconnect_delay);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.reconnect_delay) => {}
            }
        }

        info!("Log subscription for {} stopped", self.program);
    }

    async fn stream_once(
        &self,
        tx: &mpsc::Sender<LogEvent>,
        cancel: &CancellationToken,
        ready: &mut Option<oneshot::Sender<Result<()>>>,
    ) -> Result<()> {
        let client = PubsubClient::new(&self.ws_endpoint).await?;
        let (stream, unsubscribe) = client
            .logs_subscribe(
                RpcTransactionLogsFilter::Mentions(vec![self.program.to_string()]),
                RpcTransactionLogsConfig {
                    commitment: Some(self.commitment),
                },
            )
            .await?;

        info!("Subscribed to logs of {}", self.program);
        let end = forward(stream, tx, cancel, ready.take(), |response| {
            let value = response.value;
            Some(LogEvent {
                signature: value.signature,
                logs: value.logs,
                failed: value.err.is_some(),
            })
        })
        .await;

        match end {
            ForwardEnd::ServerClosed => warn!("Log stream ended by server"),
            ForwardEnd::Cancelled | ForwardEnd::Abandoned => {
                debug!("Log subscription released ({:?})", end)
            }
        }

        unsubscribe().await;
        Ok(())
    }
}

async fn watch_account_task(
    ws_endpoint: String,
    address: Pubkey,
    commitment: CommitmentConfig,
    tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
    ready: oneshot::Sender<Result<()>>,
) {
    let client = match PubsubClient::new(&ws_endpoint).await {
        Ok(client) => client,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };

    let config = RpcAccountInfoConfig {
        encoding: Some(UiAccountEncoding::Base64),
        commitment: Some(commitment),
        data_slice: None,
        min_context_slot: None,
    };

    let (stream, unsubscribe) = match client.account_subscribe(&address, Some(config)).await {
        Ok(subscription) => subscription,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };

    debug!("Watching account {}", address);
    let end = forward(stream, &tx, &cancel, Some(ready), |response| {
        let data = response.value.data.decode();
        if data.is_none() {
            warn!("Undecodable account update for {}", address);
        }
        data
    })
    .await;

    if end == ForwardEnd::ServerClosed {
        warn!("Account stream for {} ended by server", address);
    }

    unsubscribe().await;
    debug!("Stopped watching account {}", address);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForwardEnd {
    Cancelled,
    /// The caller stopped waiting for the subscription or dropped it
    Abandoned,
    ServerClosed,
}

/// Hands a fresh node subscription to the caller waiting on `ready`, then
/// forwards converted items until one side goes away. Items converting to
/// `None` are dropped. The node subscription must be released after this
/// returns, whatever the outcome.
async fn forward<S, T, F>(
    mut stream: S,
    tx: &mpsc::Sender<T>,
    cancel: &CancellationToken,
    ready: Option<oneshot::Sender<Result<()>>>,
    mut convert: F,
) -> ForwardEnd
where
    S: Stream + Unpin,
    F: FnMut(S::Item) -> Option<T>,
{
    if let Some(ready) = ready {
        if ready.send(Ok(())).is_err() {
            return ForwardEnd::Abandoned;
        }
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return ForwardEnd::Cancelled,
            _ = tx.closed() => return ForwardEnd::Abandoned,
            item = stream.next() => match item {
                Some(item) => {
                    let Some(value) = convert(item) else {
                        continue;
                    };
                    if tx.send(value).await.is_err() {
                        return ForwardEnd::Abandoned;
                    }
                }
                None => return ForwardEnd::ServerClosed,
            }
        }
    }
}

fn token_amount(amount: &UiTokenAmount) -> Result<TokenAmount> {
    let raw = amount
        .amount
        .parse::<u64>()
        .map_err(|e| Error::Decode(format!("token amount {}: {}", amount.amount, e)))?;

    Ok(TokenAmount {
        amount: raw,
        decimals: amount.decimals,
    })
}

fn convert_transaction(
    signature: &str,
    tx: EncodedConfirmedTransactionWithStatusMeta,
) -> Result<ChainTransaction> {
    let EncodedTransaction::Json(ui_tx) = tx.transaction.transaction else {
        return Err(Error::Decode(format!("{} was not returned as JSON", signature)));
    };
    let UiMessage::Parsed(message) = ui_tx.message else {
        return Err(Error::Decode(format!("{} message was not jsonParsed", signature)));
    };

    let account_keys: Vec<String> = message
        .account_keys
        .iter()
        .map(|key| key.pubkey.clone())
        .collect();

    let instructions = message
        .instructions
        .iter()
        .map(|ix| convert_instruction(ix, &account_keys))
        .collect();

    let mut result = ChainTransaction {
        signature: ui_tx
            .signatures
            .first()
            .cloned()
            .unwrap_or_else(|| signature.to_string()),
        block_time: tx.block_time,
        instructions,
        ..Default::default()
    };

    if let Some(meta) = tx.transaction.meta {
        result.failed = meta.err.is_some();

        let inner: Option<Vec<_>> = meta.inner_instructions.into();
        result.inner_instructions = inner
            .unwrap_or_default()
            .into_iter()
            .map(|set| InnerInstructionSet {
                index: set.index,
                instructions: set
                    .instructions
                    .iter()
                    .map(|ix| convert_instruction(ix, &account_keys))
                    .collect(),
            })
            .collect();

        let pre: Option<Vec<UiTransactionTokenBalance>> = meta.pre_token_balances.into();
        let post: Option<Vec<UiTransactionTokenBalance>> = meta.post_token_balances.into();
        result.pre_token_balances = convert_balances(pre.unwrap_or_default());
        result.post_token_balances = convert_balances(post.unwrap_or_default());
    }

    Ok(result)
}

fn convert_instruction(ix: &UiInstruction, account_keys: &[String]) -> ChainInstruction {
    match ix {
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => ChainInstruction {
            program_id: parsed.program_id.clone(),
            parsed: Some(ParsedInstruction {
                program: parsed.program.clone(),
                kind: parsed
                    .parsed
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
                info: parsed.parsed.get("info").cloned().unwrap_or_default(),
            }),
            ..Default::default()
        },
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(partial)) => ChainInstruction {
            program_id: partial.program_id.clone(),
            accounts: partial.accounts.clone(),
            data: bs58::decode(&partial.data).into_vec().unwrap_or_default(),
            parsed: None,
        },
        UiInstruction::Compiled(compiled) => {
            let key = |index: u8| account_keys.get(index as usize).cloned().unwrap_or_default();
            ChainInstruction {
                program_id: key(compiled.program_id_index),
                accounts: compiled.accounts.iter().map(|&i| key(i)).collect(),
                data: bs58::decode(&compiled.data).into_vec().unwrap_or_default(),
                parsed: None,
            }
        }
    }
}

fn convert_balances(balances: Vec<UiTransactionTokenBalance>) -> Vec<TokenBalance> {
    balances
        .into_iter()
        .filter_map(|balance| {
            let amount = balance.ui_token_amount.amount.parse::<u64>().ok()?;
            let owner: Option<String> = balance.owner.into();
            Some(TokenBalance {
                account_index: balance.account_index,
                mint: balance.mint,
                owner,
                amount,
                decimals: balance.ui_token_amount.decimals,
            })
        })
        .collect()
}
