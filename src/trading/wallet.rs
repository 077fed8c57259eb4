//! Trading wallet profit accounting

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use tracing::{info, warn};

use crate::chain::ChainGateway;
use crate::config::WalletConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingWallet {
    /// SOL at startup
    pub start_value: f64,
    /// SOL after all completed trades
    pub current: f64,
    /// `(current - start_value) / start_value`
    pub total_profit: f64,
}

impl TradingWallet {
    pub fn new(start_value: f64) -> Self {
        Self {
            start_value,
            current: start_value,
            total_profit: 0.0,
        }
    }

    /// Book one round trip. `sold` is 0 when the sell never went through.
    pub fn apply(&mut self, bought: f64, sold: f64) {
        self.current += sold - bought;
        self.total_profit = if self.start_value > 0.0 {
            (self.current - self.start_value) / self.start_value
        } else {
            0.0
        };
    }
}

/// Start from the WSOL account balance when configured, otherwise from
/// the simulated start value
pub async fn initialize(gateway: &dyn ChainGateway, config: &WalletConfig) -> Result<TradingWallet> {
    let Some(account) = config.wsol_account.as_deref() else {
        info!(
            "Using simulated wallet with {} SOL",
            config.simulated_start_value
        );
        return Ok(TradingWallet::new(config.simulated_start_value));
    };

    let address = Pubkey::from_str(account)
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", account, e)))?;

    match gateway.get_token_account_balance(&address).await {
        Ok(balance) => {
            info!("Trading wallet {} holds {} SOL", address, balance.ui_amount());
            Ok(TradingWallet::new(balance.ui_amount()))
        }
        Err(e) => {
            warn!(
                "Failed to read wallet {} ({}), using simulated value {}",
                address, e, config.simulated_start_value
            );
            Ok(TradingWallet::new(config.simulated_start_value))
        }
    }
}
