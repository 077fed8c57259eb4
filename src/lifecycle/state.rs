//! Per-pool records owned by the orchestrator loop

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use super::events::LifecycleEvent;
use super::stage::Stage;
use crate::decision::{SafetyVerdict, TradeDecision};
use crate::safety::SafetyAssessment;
use crate::trading::{TradeOutcome, TradingWallet};
use crate::trend::TrendAssessment;

/// Everything known about one candidate pool, keyed by creation signature
#[derive(Debug, Clone)]
pub struct PoolRecord {
    pub signature: String,
    pub stage: Stage,
    pub pool_id: Option<Pubkey>,
    /// Unix seconds at which swapping opens, once known
    pub start_time: Option<u64>,
    pub safety: Option<SafetyAssessment>,
    pub trend: Option<TrendAssessment>,
    pub verdict: Option<SafetyVerdict>,
    pub decision: Option<TradeDecision>,
    pub trade: Option<TradeOutcome>,
    /// Reason of the Skipped/Failed transition
    pub last_error: Option<String>,
    pub created_at: Instant,
    pub updated_at: Instant,
    pub finished_at: Option<Instant>,
}

impl PoolRecord {
    fn new(signature: &str, now: Instant) -> Self {
        Self {
            signature: signature.to_string(),
            stage: Stage::Parsing,
            pool_id: None,
            start_time: None,
            safety: None,
            trend: None,
            verdict: None,
            decision: None,
            trade: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }
}

/// Data attached to a record without changing its stage
#[derive(Debug, Clone)]
pub enum RecordPatch {
    Pool(Pubkey),
    StartTime(u64),
    /// `None` when safety could not be verified
    Safety(Option<SafetyAssessment>),
    Trend(TrendAssessment),
    Verdict(SafetyVerdict, TradeDecision),
    /// Also books the round trip in the wallet
    Trade(TradeOutcome),
}

/// Message from a pool task to the orchestrator loop
#[derive(Debug, Clone)]
pub enum StateUpdate {
    Patch {
        signature: String,
        patch: RecordPatch,
    },
    Transition {
        signature: String,
        to: Stage,
        detail: Option<String>,
    },
}

/// Records, dedup memory and the trading wallet
pub struct OrchestratorState {
    records: HashMap<String, PoolRecord>,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    dedup_capacity: usize,
    wallet: TradingWallet,
}

impl OrchestratorState {
    pub fn new(dedup_capacity: usize, wallet: TradingWallet) -> Self {
        Self {
            records: HashMap::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            dedup_capacity: dedup_capacity.max(1),
            wallet,
        }
    }

    /// Create the record for a new signature. `None` for a duplicate.
    pub fn admit(&mut self, signature: &str, now: Instant) -> Option<LifecycleEvent> {
        if self.records.contains_key(signature) || self.seen.contains(signature) {
            return None;
        }

        if self.seen_order.len() >= self.dedup_capacity {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(signature.to_string());
        self.seen_order.push_back(signature.to_string());

        self.records
            .insert(signature.to_string(), PoolRecord::new(signature, now));

        Some(LifecycleEvent {
            signature: signature.to_string(),
            pool_id: None,
            from: None,
            to: Stage::Parsing,
            timestamp: Utc::now(),
            detail: None,
        })
    }

    /// Apply one update. Returns the event for a legal transition.
    pub fn apply(&mut self, update: StateUpdate, now: Instant) -> Option<LifecycleEvent> {
        match update {
            StateUpdate::Patch { signature, patch } => {
                let Some(record) = self.records.get_mut(&signature) else {
                    warn!("Patch for unknown pool {}", signature);
                    return None;
                };
                record.updated_at = now;

                match patch {
                    RecordPatch::Pool(pool_id) => record.pool_id = Some(pool_id),
                    RecordPatch::StartTime(start) => record.start_time = Some(start),
                    RecordPatch::Safety(safety) => record.safety = safety,
                    RecordPatch::Trend(trend) => record.trend = Some(trend),
                    RecordPatch::Verdict(verdict, decision) => {
                        record.verdict = Some(verdict);
                        record.decision = Some(decision);
                    }
                    RecordPatch::Trade(outcome) => {
                        if let Some((bought, sold)) = outcome.settlement() {
                            self.wallet.apply(bought, sold);
                        }
                        record.trade = Some(outcome);
                    }
                }
                None
            }
            StateUpdate::Transition {
                signature,
                to,
                detail,
            } => {
                let Some(record) = self.records.get_mut(&signature) else {
                    warn!("Transition for unknown pool {}", signature);
                    return None;
                };

                let from = record.stage;
                if !from.can_transition_to(to) {
                    warn!("Illegal transition {} -> {} for {}", from, to, signature);
                    return None;
                }

                record.stage = to;
                record.updated_at = now;
                if to.is_terminal() {
                    record.finished_at = Some(now);
                }
                if matches!(to, Stage::Skipped | Stage::Failed) {
                    record.last_error = detail.clone();
                }

                Some(LifecycleEvent {
                    signature,
                    pool_id: record.pool_id,
                    from: Some(from),
                    to,
                    timestamp: Utc::now(),
                    detail,
                })
            }
        }
    }

    /// Drop terminal records older than `retention`. Returns how many went.
    pub fn evict(&mut self, now: Instant, retention: Duration) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| match record.finished_at {
            Some(finished) => now.saturating_duration_since(finished) < retention,
            None => true,
        });
        before - self.records.len()
    }

    pub fn record(&self, signature: &str) -> Option<&PoolRecord> {
        self.records.get(signature)
    }

    pub fn records(&self) -> impl Iterator<Item = &PoolRecord> {
        self.records.values()
    }

    pub fn wallet(&self) -> TradingWallet {
        self.wallet
    }

    pub fn counts(&self) -> HashMap<Stage, usize> {
        let mut counts = HashMap::new();
        for record in self.records.values() {
            *counts.entry(record.stage).or_insert(0) += 1;
        }
        counts
    }

    /// Records ordered by creation
    pub fn sorted_records(&self) -> Vec<PoolRecord> {
        let mut records: Vec<PoolRecord> = self.records.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}
