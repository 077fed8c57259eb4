//! Safety evaluation of new pools
//!
//! Checks the creator against a blacklist, reads the token's mint and
//! freeze authorities, measures how much of the supply sits in the pool,
//! and confirms the LP tokens were burned (waiting a bounded time if a
//! burn looks imminent).

pub mod blacklist;
pub mod evaluator;
pub mod lp_lock;
pub mod mint;

pub use blacklist::Blacklist;
pub use evaluator::{
    Inspection, LiquidityValue, SafetyAssessment, SafetyEvaluator, SafetyOutcome,
};
pub use lp_lock::WaitOutcome;
pub use mint::MintInfo;
