//! AMM v4 pool account decoding and start-time handling

use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

use crate::error::{Error, Result};

/// Size of the AMM v4 state account
pub const AMM_STATE_LEN: usize = 752;

/// Byte offsets of the fields we read
pub mod offsets {
    pub const STATUS: usize = 0;
    pub const BASE_DECIMAL: usize = 32;
    pub const QUOTE_DECIMAL: usize = 40;
    pub const POOL_OPEN_TIME: usize = 224;
    pub const BASE_VAULT: usize = 336;
    pub const QUOTE_VAULT: usize = 368;
    pub const BASE_MINT: usize = 400;
    pub const QUOTE_MINT: usize = 432;
    pub const LP_MINT: usize = 464;
    pub const OPEN_ORDERS: usize = 496;
    pub const MARKET_ID: usize = 528;
}

/// Pool status as stored on chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Uninitialized,
    Initialized,
    Disabled,
    RemoveLiquidityOnly,
    LiquidityOnly,
    OrderBook,
    Swap,
    WaitingForStart,
    Unknown(u64),
}

impl From<u64> for PoolStatus {
    fn from(value: u64) -> Self {
        match value {
            0 => PoolStatus::Uninitialized,
            1 => PoolStatus::Initialized,
            2 => PoolStatus::Disabled,
            3 => PoolStatus::RemoveLiquidityOnly,
            4 => PoolStatus::LiquidityOnly,
            5 => PoolStatus::OrderBook,
            6 => PoolStatus::Swap,
            7 => PoolStatus::WaitingForStart,
            other => PoolStatus::Unknown(other),
        }
    }
}

impl PoolStatus {
    pub fn as_u64(&self) -> u64 {
        match self {
            PoolStatus::Uninitialized => 0,
            PoolStatus::Initialized => 1,
            PoolStatus::Disabled => 2,
            PoolStatus::RemoveLiquidityOnly => 3,
            PoolStatus::LiquidityOnly => 4,
            PoolStatus::OrderBook => 5,
            PoolStatus::Swap => 6,
            PoolStatus::WaitingForStart => 7,
            PoolStatus::Unknown(other) => *other,
        }
    }
}

/// What the pool currently allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolFeatures {
    pub swap: bool,
    pub add_liquidity: bool,
    pub remove_liquidity: bool,
}

/// Outcome of the start-time check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Postponement {
    /// Swapping is enabled now
    Ready,
    /// Waiting for a start time `delay` from now
    Wait { start_time: u64, delay: Duration },
    /// Start time is beyond the postponement ceiling
    TooFar { start_time: u64 },
    /// Swapping is off for a reason other than a start time
    Disabled,
}

/// Decoded AMM v4 state (subset)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmmState {
    pub status: PoolStatus,
    pub base_decimal: u8,
    pub quote_decimal: u8,
    /// Unix seconds
    pub pool_open_time: u64,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market_id: Pubkey,
}

impl AmmState {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < AMM_STATE_LEN {
            return Err(Error::Decode(format!(
                "AMM state is {} bytes, expected {}",
                data.len(),
                AMM_STATE_LEN
            )));
        }

        Ok(Self {
            status: PoolStatus::from(read_u64(data, offsets::STATUS)),
            base_decimal: read_u64(data, offsets::BASE_DECIMAL) as u8,
            quote_decimal: read_u64(data, offsets::QUOTE_DECIMAL) as u8,
            pool_open_time: read_u64(data, offsets::POOL_OPEN_TIME),
            base_vault: read_pubkey(data, offsets::BASE_VAULT),
            quote_vault: read_pubkey(data, offsets::QUOTE_VAULT),
            base_mint: read_pubkey(data, offsets::BASE_MINT),
            quote_mint: read_pubkey(data, offsets::QUOTE_MINT),
            lp_mint: read_pubkey(data, offsets::LP_MINT),
            open_orders: read_pubkey(data, offsets::OPEN_ORDERS),
            market_id: read_pubkey(data, offsets::MARKET_ID),
        })
    }

    /// Decimals of `mint` if it is one of the pool's sides
    pub fn decimals_of(&self, mint: &Pubkey) -> Option<u8> {
        if *mint == self.base_mint {
            Some(self.base_decimal)
        } else if *mint == self.quote_mint {
            Some(self.quote_decimal)
        } else {
            None
        }
    }

    /// Enabled features at unix time `now`, mirroring the Raydium SDK
    pub fn features(&self, now: u64) -> PoolFeatures {
        match self.status {
            PoolStatus::Uninitialized | PoolStatus::Disabled | PoolStatus::Unknown(_) => {
                PoolFeatures::default()
            }
            PoolStatus::Initialized | PoolStatus::Swap => PoolFeatures {
                swap: true,
                add_liquidity: true,
                remove_liquidity: true,
            },
            PoolStatus::RemoveLiquidityOnly => PoolFeatures {
                remove_liquidity: true,
                ..Default::default()
            },
            PoolStatus::LiquidityOnly | PoolStatus::OrderBook => PoolFeatures {
                swap: false,
                add_liquidity: true,
                remove_liquidity: true,
            },
            PoolStatus::WaitingForStart => PoolFeatures {
                swap: now >= self.pool_open_time,
                add_liquidity: true,
                remove_liquidity: true,
            },
        }
    }

    /// Decide whether the pool can be processed now, later, or not at all
    pub fn postponement(&self, now: u64, max_postpone: Duration) -> Postponement {
        if self.features(now).swap {
            return Postponement::Ready;
        }

        if self.status != PoolStatus::WaitingForStart {
            return Postponement::Disabled;
        }

        let start_time = self.pool_open_time;
        let delta = start_time.saturating_sub(now);
        if delta > 0 && Duration::from_secs(delta) < max_postpone {
            Postponement::Wait {
                start_time,
                delay: Duration::from_secs(delta),
            }
        } else {
            Postponement::TooFar { start_time }
        }
    }

    #[cfg(test)]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; AMM_STATE_LEN];
        let mut put_u64 = |offset: usize, value: u64| {
            data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        };
        put_u64(offsets::STATUS, self.status.as_u64());
        put_u64(offsets::BASE_DECIMAL, self.base_decimal as u64);
        put_u64(offsets::QUOTE_DECIMAL, self.quote_decimal as u64);
        put_u64(offsets::POOL_OPEN_TIME, self.pool_open_time);

        for (offset, key) in [
            (offsets::BASE_VAULT, &self.base_vault),
            (offsets::QUOTE_VAULT, &self.quote_vault),
            (offsets::BASE_MINT, &self.base_mint),
            (offsets::QUOTE_MINT, &self.quote_mint),
            (offsets::LP_MINT, &self.lp_mint),
            (offsets::OPEN_ORDERS, &self.open_orders),
            (offsets::MARKET_ID, &self.market_id),
        ] {
            data[offset..offset + 32].copy_from_slice(key.as_ref());
        }
        data
    }
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn read_pubkey(data: &[u8], offset: usize) -> Pubkey {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&data[offset..offset + 32]);
    Pubkey::new_from_array(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn state(status: PoolStatus, open_time: u64) -> AmmState {
        AmmState {
            status,
            base_decimal: 6,
            quote_decimal: 9,
            pool_open_time: open_time,
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            market_id: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_decode_layout() {
        let original = state(PoolStatus::WaitingForStart, 1_708_000_000);
        let decoded = AmmState::decode(&original.to_bytes()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.decimals_of(&original.quote_mint), Some(9));
    }

    #[test]
    fn test_decode_rejects_short_account() {
        assert!(matches!(AmmState::decode(&[0u8; 100]), Err(Error::Decode(_))));
    }

    #[test]
    fn test_features() {
        let now = 1_000;
        assert!(state(PoolStatus::Swap, 0).features(now).swap);
        assert!(state(PoolStatus::Initialized, 0).features(now).swap);
        assert!(!state(PoolStatus::Disabled, 0).features(now).swap);
        assert!(!state(PoolStatus::LiquidityOnly, 0).features(now).swap);
        assert!(!state(PoolStatus::WaitingForStart, now + 1).features(now).swap);
        assert!(state(PoolStatus::WaitingForStart, now).features(now).swap);
    }

    #[test]
    fn test_postponement_within_a_day() {
        let now = 1_000_000;
        let pool = state(PoolStatus::WaitingForStart, now + 30 * 60);

        assert_eq!(
            pool.postponement(now, DAY),
            Postponement::Wait {
                start_time: now + 30 * 60,
                delay: Duration::from_secs(30 * 60),
            }
        );
    }

    #[test]
    fn test_postponement_too_far() {
        let now = 1_000_000;
        let pool = state(PoolStatus::WaitingForStart, now + 48 * 60 * 60);
        assert!(matches!(pool.postponement(now, DAY), Postponement::TooFar { .. }));
    }

    #[test]
    fn test_postponement_disabled_and_ready() {
        let now = 1_000_000;
        assert_eq!(
            state(PoolStatus::Disabled, 0).postponement(now, DAY),
            Postponement::Disabled
        );
        assert_eq!(
            state(PoolStatus::Swap, now + 60).postponement(now, DAY),
            Postponement::Ready
        );
    }
}
