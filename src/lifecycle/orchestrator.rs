//! Pool lifecycle orchestrator
//!
//! One loop owns every [`PoolRecord`]. It reads the program log stream,
//! deduplicates candidates and spawns one task per pool. Tasks never touch
//! state directly: they send [`StateUpdate`]s back to the loop, which
//! validates each transition, emits the event and republishes the snapshot.

use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::EventSink;
use super::stage::Stage;
use super::state::{OrchestratorState, PoolRecord, RecordPatch, StateUpdate};
use crate::chain::{ChainGateway, LogEvent};
use crate::config::Config;
use crate::decision::{admit, evaluate, DecisionInput, TradeDecision};
use crate::error::{Error, Result};
use crate::pool::{
    fetch_creation, is_creation_log, open_time_from_logs, AmmState, ParsedCreationEvent,
    Postponement, RAYDIUM_AMM_V4,
};
use crate::safety::{SafetyAssessment, SafetyEvaluator, SafetyOutcome, WaitOutcome};
use crate::trading::{execute_trade, SwapExecutor, TradingWallet};
use crate::trend::{fetch_latest_trades, TrendAssessment};

/// Active counts and high-water marks
#[derive(Debug, Default)]
pub struct ConcurrencyStats {
    active_validations: AtomicUsize,
    peak_validations: AtomicUsize,
    active_trades: AtomicUsize,
    peak_trades: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub active_validations: usize,
    pub peak_validations: usize,
    pub active_trades: usize,
    pub peak_trades: usize,
}

impl ConcurrencyStats {
    fn validation(&self) -> ActiveGuard<'_> {
        ActiveGuard::enter(&self.active_validations, &self.peak_validations)
    }

    fn trade(&self) -> ActiveGuard<'_> {
        ActiveGuard::enter(&self.active_trades, &self.peak_trades)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            active_validations: self.active_validations.load(Ordering::Relaxed),
            peak_validations: self.peak_validations.load(Ordering::Relaxed),
            active_trades: self.active_trades.load(Ordering::Relaxed),
            peak_trades: self.peak_trades.load(Ordering::Relaxed),
        }
    }
}

struct ActiveGuard<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::Relaxed) + 1;
        peak.fetch_max(now, Ordering::Relaxed);
        Self { active }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Read-only view published after every change
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    /// Ordered by creation
    pub pools: Vec<PoolRecord>,
    pub wallet: TradingWallet,
    pub stats: StatsSnapshot,
}

impl PipelineSnapshot {
    pub fn in_stage(&self, stage: Stage) -> Vec<&PoolRecord> {
        self.pools.iter().filter(|p| p.stage == stage).collect()
    }
}

/// Cheap, cloneable reader of the orchestrator's state
#[derive(Clone)]
pub struct OrchestratorHandle {
    rx: watch::Receiver<PipelineSnapshot>,
}

impl OrchestratorHandle {
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.rx.borrow().clone()
    }

    pub fn wallet(&self) -> TradingWallet {
        self.rx.borrow().wallet
    }

    pub fn skipped(&self) -> Vec<PoolRecord> {
        self.records_in(Stage::Skipped)
    }

    pub fn failed(&self) -> Vec<PoolRecord> {
        self.records_in(Stage::Failed)
    }

    fn records_in(&self, stage: Stage) -> Vec<PoolRecord> {
        self.rx
            .borrow()
            .pools
            .iter()
            .filter(|p| p.stage == stage)
            .cloned()
            .collect()
    }

    /// Wait for the next published snapshot. Errors once the orchestrator is gone.
    pub async fn changed(&mut self) -> Result<()> {
        self.rx
            .changed()
            .await
            .map_err(|_| Error::Internal("orchestrator stopped".into()))
    }
}

pub struct Orchestrator {
    gateway: Arc<dyn ChainGateway>,
    executor: Arc<dyn SwapExecutor>,
    sink: Arc<dyn EventSink>,
    config: Arc<Config>,
    evaluator: Arc<SafetyEvaluator>,
    permits: Arc<Semaphore>,
    stats: Arc<ConcurrencyStats>,
    state: OrchestratorState,
    updates_tx: mpsc::Sender<StateUpdate>,
    updates_rx: mpsc::Receiver<StateUpdate>,
    snapshot_tx: watch::Sender<PipelineSnapshot>,
    /// Child of the caller's shutdown token; also cancelled by single-trade mode
    stop: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        gateway: Arc<dyn ChainGateway>,
        executor: Arc<dyn SwapExecutor>,
        sink: Arc<dyn EventSink>,
        wallet: TradingWallet,
        shutdown: &CancellationToken,
    ) -> Self {
        let evaluator = Arc::new(SafetyEvaluator::new(
            gateway.clone(),
            config.safety.clone(),
            config.rpc.retry_policy(),
        ));
        let permits = Arc::new(Semaphore::new(config.pipeline.max_concurrent_validations));
        let (updates_tx, updates_rx) = mpsc::channel(config.pipeline.event_channel_capacity.max(1));
        let state = OrchestratorState::new(config.pipeline.dedup_capacity, wallet);
        let (snapshot_tx, _) = watch::channel(PipelineSnapshot {
            pools: Vec::new(),
            wallet,
            stats: StatsSnapshot::default(),
        });

        Self {
            gateway,
            executor,
            sink,
            config: Arc::new(config),
            evaluator,
            permits,
            stats: Arc::new(ConcurrencyStats::default()),
            state,
            updates_tx,
            updates_rx,
            snapshot_tx,
            stop: shutdown.child_token(),
        }
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            rx: self.snapshot_tx.subscribe(),
        }
    }

    /// Run until shutdown (or the first trade in single-trade mode).
    /// A closed log stream is an error once in-flight pools have drained.
    pub async fn run(mut self) -> Result<()> {
        let mut logs = self.gateway.subscribe_logs(&RAYDIUM_AMM_V4).await?;
        info!("Listening for new pools of {}", *RAYDIUM_AMM_V4);

        let pipeline = &self.config.pipeline;
        let retention = Duration::from_secs(pipeline.retention_secs);
        let mut eviction = interval(Duration::from_secs(pipeline.eviction_interval_secs.max(1)));
        eviction.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats_tick = interval(Duration::from_secs(pipeline.stats_interval_secs.max(1)));
        stats_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tasks: JoinSet<()> = JoinSet::new();
        let stop = self.stop.clone();

        let result = loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    info!("Stopping pipeline");
                    break Ok(());
                }
                Some(update) = self.updates_rx.recv() => self.apply(update),
                event = logs.next() => match event {
                    Some(event) => self.on_log(event, &mut tasks),
                    None => {
                        error!("Program log subscription closed");
                        break Err(Error::SubscriptionClosed("program logs".into()));
                    }
                },
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = joined {
                        error!("Pool task panicked: {}", e);
                    }
                }
                _ = eviction.tick() => {
                    let evicted = self.state.evict(Instant::now(), retention);
                    if evicted > 0 {
                        debug!("Evicted {} finished pools", evicted);
                        self.publish();
                    }
                }
                _ = stats_tick.tick() => self.log_stats(),
            }
        };

        // No new admissions; waits and sleeps in flight see the stop
        stop.cancel();
        drop(logs);
        self.drain(&mut tasks).await;
        self.log_stats();
        result
    }

    fn on_log(&mut self, event: LogEvent, tasks: &mut JoinSet<()>) {
        if event.failed || !is_creation_log(&event.logs) {
            return;
        }

        let Some(created) = self.state.admit(&event.signature, Instant::now()) else {
            debug!("Duplicate pool signature {}", event.signature);
            return;
        };
        self.sink.emit(&created);
        info!("New pool candidate: {}", event.signature);

        let task = PoolTask {
            ctx: self.context(),
            logged_open_time: open_time_from_logs(&event.logs),
            signature: event.signature,
        };
        tasks.spawn(task.run());
        self.publish();
    }

    fn apply(&mut self, update: StateUpdate) {
        if let Some(event) = self.state.apply(update, Instant::now()) {
            self.sink.emit(&event);
        }
        self.publish();
    }

    async fn drain(&mut self, tasks: &mut JoinSet<()>) {
        if !tasks.is_empty() {
            info!("Waiting for {} pool tasks to finish", tasks.len());
        }

        loop {
            tokio::select! {
                biased;
                Some(update) = self.updates_rx.recv() => self.apply(update),
                joined = tasks.join_next() => match joined {
                    Some(Err(e)) => error!("Pool task panicked: {}", e),
                    Some(Ok(())) => {}
                    None => break,
                },
            }
        }

        while let Ok(update) = self.updates_rx.try_recv() {
            self.apply(update);
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(PipelineSnapshot {
            pools: self.state.sorted_records(),
            wallet: self.state.wallet(),
            stats: self.stats.snapshot(),
        });
    }

    fn log_stats(&self) {
        let counts = self.state.counts();
        let stats = self.stats.snapshot();
        let wallet = self.state.wallet();

        let stages: Vec<String> = Stage::ALL
            .iter()
            .filter_map(|s| counts.get(s).map(|n| format!("{}={}", s, n)))
            .collect();

        info!(
            validations = stats.active_validations,
            peak_validations = stats.peak_validations,
            trades = stats.active_trades,
            peak_trades = stats.peak_trades,
            "Pools: [{}] | Wallet: {:.4} SOL ({:+.2}%)",
            stages.join(", "),
            wallet.current,
            wallet.total_profit * 100.0
        );
    }

    fn context(&self) -> PoolContext {
        PoolContext {
            gateway: self.gateway.clone(),
            executor: self.executor.clone(),
            evaluator: self.evaluator.clone(),
            config: self.config.clone(),
            permits: self.permits.clone(),
            stats: self.stats.clone(),
            updates: self.updates_tx.clone(),
            stop: self.stop.clone(),
        }
    }
}

/// What a pool task needs from the orchestrator
#[derive(Clone)]
struct PoolContext {
    gateway: Arc<dyn ChainGateway>,
    executor: Arc<dyn SwapExecutor>,
    evaluator: Arc<SafetyEvaluator>,
    config: Arc<Config>,
    permits: Arc<Semaphore>,
    stats: Arc<ConcurrencyStats>,
    updates: mpsc::Sender<StateUpdate>,
    stop: CancellationToken,
}

/// Early exit of a pool task
enum Exit {
    Skip(String),
    Fail(String),
}

struct PoolTask {
    ctx: PoolContext,
    signature: String,
    /// `open_time` printed by initialize2, known before the transaction is fetched
    logged_open_time: Option<u64>,
}

impl PoolTask {
    async fn run(self) {
        match self.pipeline().await {
            Ok(()) => {}
            Err(Exit::Skip(reason)) => {
                info!("Skipping {}: {}", self.signature, reason);
                self.transition(Stage::Skipped, Some(reason)).await;
            }
            Err(Exit::Fail(reason)) => {
                warn!("Pool {} failed: {}", self.signature, reason);
                self.transition(Stage::Failed, Some(reason)).await;
            }
        }
    }

    async fn pipeline(&self) -> std::result::Result<(), Exit> {
        // Zero means "open at creation"; the pool state has the real time then
        if let Some(start) = self.logged_open_time.filter(|t| *t > 0) {
            self.patch(RecordPatch::StartTime(start)).await;
        }

        let event = self.parse().await?;
        let amm = self.await_start(&event).await?;

        if self.ctx.stop.is_cancelled() {
            return Err(Exit::Skip("shutdown before safety check".into()));
        }
        let permit = self
            .ctx
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| Exit::Skip("limit reached".into()))?;
        let validation = self.ctx.stats.validation();
        self.transition(Stage::AwaitingSafetyCheck, None).await;

        let safety = self.check_safety(&event).await?;
        self.patch(RecordPatch::Safety(safety.clone())).await;
        self.transition(Stage::SafetyComplete, None).await;

        self.transition(Stage::AwaitingTrend, None).await;
        let trend = self.check_trend(&event, &amm).await;
        self.patch(RecordPatch::Trend(trend.clone())).await;

        let input = DecisionInput {
            swap_enabled: amm.features(unix_now()).swap,
            safety: safety.as_ref(),
            trend: Some(&trend),
        };
        let verdict = evaluate(&input, &self.ctx.config.decision.thresholds());
        let decision = admit(&verdict, Some(&trend), &self.ctx.config.trading.gate());
        info!("Verdict for {}: {}", event.pool.pool_id, verdict);

        self.patch(RecordPatch::Verdict(verdict.clone(), decision.clone()))
            .await;
        self.transition(Stage::Decided, Some(verdict.to_string())).await;
        drop(validation);
        drop(permit);

        let size = match decision {
            TradeDecision::Trade(size) => size,
            TradeDecision::Skip(reason) => return Err(Exit::Skip(reason)),
        };

        if self.ctx.stop.is_cancelled() {
            return Err(Exit::Skip("shutdown before trading".into()));
        }
        self.transition(Stage::Trading, None).await;

        let outcome = {
            let _trade = self.ctx.stats.trade();
            execute_trade(
                self.ctx.executor.as_ref(),
                &event.pool,
                size,
                &self.ctx.config.trading,
            )
            .await
        };
        let success = outcome.is_success();
        let summary = outcome.to_string();
        self.patch(RecordPatch::Trade(outcome)).await;

        if self.ctx.config.trading.single_trade {
            info!("Single trade finished, stopping pipeline");
            self.ctx.stop.cancel();
        }

        if success {
            self.transition(Stage::Done, Some(summary)).await;
            Ok(())
        } else {
            Err(Exit::Fail(summary))
        }
    }

    async fn parse(&self) -> std::result::Result<ParsedCreationEvent, Exit> {
        let retry = self.ctx.config.rpc.retry_policy();
        match fetch_creation(self.ctx.gateway.as_ref(), &self.signature, retry).await {
            Ok(event) => {
                info!(
                    "Pool {} seeded with {} quote / {} base units, open_time {}",
                    event.pool.pool_id, event.init_pc_amount, event.init_coin_amount, event.open_time
                );
                if let Some(logged) = self.logged_open_time {
                    if logged != event.open_time {
                        warn!(
                            "Pool {} logged open_time {} but instruction carries {}",
                            event.pool.pool_id, logged, event.open_time
                        );
                    }
                }
                self.patch(RecordPatch::Pool(event.pool.pool_id)).await;
                Ok(event)
            }
            Err(e) if e.is_malformed_input() => Err(Exit::Skip(format!("not a pool creation: {}", e))),
            Err(e) => Err(Exit::Fail(format!("failed to fetch creation: {}", e))),
        }
    }

    async fn fetch_amm_state(&self, event: &ParsedCreationEvent) -> std::result::Result<AmmState, Exit> {
        let pool_id = event.pool.pool_id;
        let data = self
            .ctx
            .config
            .rpc
            .retry_policy()
            .run("get_pool_state", || self.ctx.gateway.get_account_data(&pool_id))
            .await
            .map_err(|e| Exit::Fail(format!("failed to fetch pool state: {}", e)))?;
        AmmState::decode(&data).map_err(|e| Exit::Fail(format!("bad pool state: {}", e)))
    }

    /// Delay until swapping opens, or skip the pool
    async fn await_start(&self, event: &ParsedCreationEvent) -> std::result::Result<AmmState, Exit> {
        let state = self.fetch_amm_state(event).await?;
        if event.open_time > 0 && state.pool_open_time != event.open_time {
            warn!(
                "Pool {} state opens at {}, creation asked for {}",
                event.pool.pool_id, state.pool_open_time, event.open_time
            );
        }
        let pipeline = &self.ctx.config.pipeline;
        let max_postpone = Duration::from_secs(pipeline.max_postpone_secs);
        let now = unix_now();

        match state.postponement(now, max_postpone) {
            Postponement::Ready => {
                self.patch(RecordPatch::StartTime(state.pool_open_time)).await;
                Ok(state)
            }
            Postponement::Disabled => Err(Exit::Skip("Swapping is disabled".into())),
            Postponement::TooFar { start_time } => Err(Exit::Skip(format!(
                "postponed too long (starts in {}s)",
                start_time.saturating_sub(now)
            ))),
            Postponement::Wait { start_time, delay } => {
                self.patch(RecordPatch::StartTime(start_time)).await;
                self.transition(
                    Stage::Postponed,
                    Some(format!("starts in {}s", delay.as_secs())),
                )
                .await;

                let wake = delay + Duration::from_millis(pipeline.postpone_buffer_ms);
                tokio::select! {
                    _ = self.ctx.stop.cancelled() => {
                        return Err(Exit::Skip("shutdown during postponement".into()));
                    }
                    _ = sleep(wake) => {}
                }

                let state = self.fetch_amm_state(event).await?;
                if state.features(unix_now()).swap {
                    Ok(state)
                } else {
                    Err(Exit::Skip("still disabled after postponement".into()))
                }
            }
        }
    }

    /// `Ok(None)` when safety could not be verified
    async fn check_safety(
        &self,
        event: &ParsedCreationEvent,
    ) -> std::result::Result<Option<SafetyAssessment>, Exit> {
        let evaluator = &self.ctx.evaluator;

        let inspection = match evaluator.inspect(event).await {
            SafetyOutcome::CreatorBlacklisted(creator) => {
                return Err(Exit::Skip(format!("creator {} is blacklisted", creator)));
            }
            SafetyOutcome::Unavailable(reason) => {
                warn!("Couldn't verify safety of {}: {}", event.pool.pool_id, reason);
                return Ok(None);
            }
            SafetyOutcome::Pending(inspection) => inspection,
        };

        let waited = if inspection.needs_lp_wait() {
            self.transition(Stage::AwaitingLPBurn, None).await;
            let outcome = evaluator.await_lp_burn(&inspection, &self.ctx.stop).await;
            match &outcome {
                WaitOutcome::Cancelled => {
                    return Err(Exit::Skip("shutdown during LP burn wait".into()));
                }
                WaitOutcome::Interrupted(reason) => {
                    warn!("LP watch for {} interrupted: {}", inspection.lp_mint, reason);
                }
                WaitOutcome::Locked | WaitOutcome::TimedOut => {}
            }
            Some(outcome)
        } else {
            None
        };

        match evaluator.finalize(&inspection, waited.as_ref()).await {
            Ok(assessment) => Ok(Some(assessment)),
            Err(e) => {
                warn!("Couldn't finish safety check of {}: {}", event.pool.pool_id, e);
                Ok(None)
            }
        }
    }

    async fn check_trend(&self, event: &ParsedCreationEvent, amm: &AmmState) -> TrendAssessment {
        let token_mint = event.pool.token_mint();
        let Some(decimals) = amm.decimals_of(&token_mint) else {
            warn!("Pool {} state does not list {}", event.pool.pool_id, token_mint);
            return TrendAssessment::unavailable();
        };

        let trend = &self.ctx.config.trend;
        match fetch_latest_trades(
            self.ctx.gateway.as_ref(),
            &event.pool.pool_id,
            &token_mint,
            decimals,
            trend.signature_limit,
            trend.fetch_parallelism,
            self.ctx.config.rpc.retry_policy(),
        )
        .await
        {
            Ok(trades) => {
                debug!("{} trades for pool {}", trades.len(), event.pool.pool_id);
                TrendAssessment::from_trades(&trades, &trend.params(), trend.dump_threshold_pct)
            }
            Err(e) => {
                warn!("Couldn't fetch trades of {}: {}", event.pool.pool_id, e);
                TrendAssessment::unavailable()
            }
        }
    }

    async fn transition(&self, to: Stage, detail: Option<String>) {
        self.send(StateUpdate::Transition {
            signature: self.signature.clone(),
            to,
            detail,
        })
        .await;
    }

    async fn patch(&self, patch: RecordPatch) {
        self.send(StateUpdate::Patch {
            signature: self.signature.clone(),
            patch,
        })
        .await;
    }

    async fn send(&self, update: StateUpdate) {
        if self.ctx.updates.send(update).await.is_err() {
            debug!("Orchestrator gone, dropping update for {}", self.signature);
        }
    }
}

fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
