//! Raydium AMM v4 constants
//!
//! # WARNING
//! Account indexes follow the `initialize2` instruction layout. If Raydium
//! ships a new AMM version these offsets need to be re-checked.

use regex::Regex;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Raydium liquidity pool v4 program
pub const RAYDIUM_AMM_V4_STR: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// PDA that owns every v4 pool vault
pub const RAYDIUM_AUTHORITY_STR: &str = "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1";

/// Wrapped SOL mint
pub const WSOL_MINT_STR: &str = "So11111111111111111111111111111111111111112";

pub const WSOL_DECIMALS: u8 = 9;

/// Log line fragment printed by `initialize2`
pub const INIT_LOG_MARKER: &str = "init_pc_amount";

/// Instruction tag of `initialize2`
pub const INITIALIZE2_TAG: u8 = 1;

/// Minimum data length: tag, nonce, open_time, init_pc_amount, init_coin_amount
pub const INITIALIZE2_DATA_LEN: usize = 1 + 1 + 8 + 8 + 8;

lazy_static::lazy_static! {
    pub static ref RAYDIUM_AMM_V4: Pubkey =
        Pubkey::from_str(RAYDIUM_AMM_V4_STR).expect("Invalid Raydium program ID");

    pub static ref RAYDIUM_AUTHORITY: Pubkey =
        Pubkey::from_str(RAYDIUM_AUTHORITY_STR).expect("Invalid Raydium authority");

    pub static ref WSOL_MINT: Pubkey =
        Pubkey::from_str(WSOL_MINT_STR).expect("Invalid WSOL mint");

    /// `open_time: 1700000000` inside the initialize2 log line
    static ref OPEN_TIME_RE: Regex =
        Regex::new(r"open_time:\s*(\d+)").expect("Invalid open_time regex");
}

/// Account positions inside `initialize2`
#[allow(non_snake_case)]
pub mod INIT_ACCOUNTS {
    pub const AMM_ID: usize = 4;
    pub const AUTHORITY: usize = 5;
    pub const OPEN_ORDERS: usize = 6;
    pub const LP_MINT: usize = 7;
    pub const BASE_MINT: usize = 8;
    pub const QUOTE_MINT: usize = 9;
    pub const BASE_VAULT: usize = 10;
    pub const QUOTE_VAULT: usize = 11;
    pub const WITHDRAW_QUEUE: usize = 12;
    pub const TARGET_ORDERS: usize = 13;
    pub const MARKET_PROGRAM: usize = 15;
    pub const MARKET: usize = 16;
    pub const USER_WALLET: usize = 17;

    /// Anything shorter is not an initialize2 call
    pub const MIN_ACCOUNTS: usize = 18;
}

/// The log line carrying the creation marker, if any
pub fn find_log_entry<'a>(logs: &'a [String], marker: &str) -> Option<&'a str> {
    logs.iter().map(String::as_str).find(|line| line.contains(marker))
}

/// Cheap pre-filter applied before fetching the transaction
pub fn is_creation_log(logs: &[String]) -> bool {
    find_log_entry(logs, INIT_LOG_MARKER).is_some()
}

/// `open_time` printed by initialize2, when present
pub fn open_time_from_logs(logs: &[String]) -> Option<u64> {
    let line = find_log_entry(logs, INIT_LOG_MARKER)?;
    OPEN_TIME_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logs() -> Vec<String> {
        vec![
            "Program 675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8 invoke [1]".to_string(),
            "Program log: initialize2: InitializeInstruction2 { nonce: 254, open_time: 1708000000, init_pc_amount: 30000000000, init_coin_amount: 1000000000000000 }".to_string(),
        ]
    }

    #[test]
    fn test_program_ids() {
        assert_eq!(RAYDIUM_AMM_V4.to_string(), RAYDIUM_AMM_V4_STR);
        assert_eq!(WSOL_MINT.to_string(), WSOL_MINT_STR);
    }

    #[test]
    fn test_creation_log_filter() {
        assert!(is_creation_log(&init_logs()));
        assert!(!is_creation_log(&["Program log: Instruction: Swap".to_string()]));
    }

    #[test]
    fn test_open_time_from_logs() {
        assert_eq!(open_time_from_logs(&init_logs()), Some(1708000000));
        assert_eq!(open_time_from_logs(&[]), None);
    }
}
