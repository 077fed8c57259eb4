//! Raydium AMM v4 pool decoding
//!
//! - `program`: program ids, instruction layout, log pre-filter
//! - `identity`: pool keys and the parsed creation event
//! - `parser`: pool creation transaction decoding
//! - `state`: pool account decoding, features and start-time checks

pub mod identity;
pub mod parser;
pub mod program;
pub mod state;

pub use identity::{CreationMeta, ParsedCreationEvent, PoolIdentity};
pub use parser::{fetch_creation, parse_creation};
pub use program::{is_creation_log, open_time_from_logs, RAYDIUM_AMM_V4, WSOL_MINT};
pub use state::{AmmState, PoolFeatures, PoolStatus, Postponement};
