//! Raydium AMM v4 new-pool sniper
//!
//! Listens for pool creations, validates the token and liquidity,
//! reads the early price trend and paper-trades the pools that pass.

pub mod chain;
pub mod cli;
pub mod config;
pub mod decision;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod safety;
pub mod trading;
pub mod trend;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
