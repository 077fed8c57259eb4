//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::decision::{AdmissionGate, DecisionThresholds, VerdictLevel};
use crate::trend::TrendParams;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ws_endpoint")]
    pub ws_endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// processed | confirmed | finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// 0 = reconnect forever
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl RpcConfig {
    pub fn retry_policy(&self) -> crate::chain::RetryPolicy {
        crate::chain::RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }
}

/// Lifecycle orchestrator settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Pools allowed inside safety evaluation at the same time.
    /// Pools arriving above the cap are skipped, not queued.
    #[serde(default = "default_max_concurrent_validations")]
    pub max_concurrent_validations: usize,
    /// Extra delay after a postponed pool's start time before re-checking it
    #[serde(default = "default_postpone_buffer_ms")]
    pub postpone_buffer_ms: u64,
    /// Pools starting further in the future than this are skipped
    #[serde(default = "default_max_postpone_secs")]
    pub max_postpone_secs: u64,
    /// How long finished pools stay visible in snapshots
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
    /// Remembered candidate signatures for redelivery dedup
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Seconds between pipeline statistics log lines (0 = off)
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    /// Buffer of the lifecycle event channel sink
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_validations: default_max_concurrent_validations(),
            postpone_buffer_ms: default_postpone_buffer_ms(),
            max_postpone_secs: default_max_postpone_secs(),
            retention_secs: default_retention_secs(),
            eviction_interval_secs: default_eviction_interval_secs(),
            dedup_capacity: default_dedup_capacity(),
            stats_interval_secs: default_stats_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    /// LP supply (raw units) at or below which liquidity counts as burned
    #[serde(default = "default_lp_burn_threshold")]
    pub lp_burn_threshold: u64,
    /// Ceiling on waiting for the LP burn
    #[serde(default = "default_lp_burn_wait_secs")]
    pub lp_burn_wait_secs: u64,
    /// Pool share of supply that justifies waiting for the burn
    #[serde(default = "default_lp_wait_min_pool_share")]
    pub lp_wait_min_pool_share: f64,
    #[serde(default = "default_lp_check_attempts")]
    pub lp_check_attempts: u32,
    #[serde(default = "default_lp_check_delay_ms")]
    pub lp_check_delay_ms: u64,
    /// USD per SOL used to price liquidity
    #[serde(default = "default_sol_usd_rate")]
    pub sol_usd_rate: f64,
    /// Creator addresses rejected on top of the built-in list
    #[serde(default)]
    pub extra_blacklist: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            lp_burn_threshold: default_lp_burn_threshold(),
            lp_burn_wait_secs: default_lp_burn_wait_secs(),
            lp_wait_min_pool_share: default_lp_wait_min_pool_share(),
            lp_check_attempts: default_lp_check_attempts(),
            lp_check_delay_ms: default_lp_check_delay_ms(),
            sol_usd_rate: default_sol_usd_rate(),
            extra_blacklist: vec![],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionConfig {
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    #[serde(default = "default_max_liquidity_usd")]
    pub max_liquidity_usd: f64,
    #[serde(default = "default_green_pool_share")]
    pub green_pool_share: f64,
    #[serde(default = "default_min_pool_share")]
    pub min_pool_share: f64,
    #[serde(default = "default_mintable_yellow_pool_share")]
    pub mintable_yellow_pool_share: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_liquidity_usd: default_min_liquidity_usd(),
            max_liquidity_usd: default_max_liquidity_usd(),
            green_pool_share: default_green_pool_share(),
            min_pool_share: default_min_pool_share(),
            mintable_yellow_pool_share: default_mintable_yellow_pool_share(),
        }
    }
}

impl DecisionConfig {
    pub fn thresholds(&self) -> DecisionThresholds {
        DecisionThresholds {
            min_liquidity_usd: self.min_liquidity_usd,
            max_liquidity_usd: self.max_liquidity_usd,
            green_pool_share: self.green_pool_share,
            min_pool_share: self.min_pool_share,
            mintable_yellow_pool_share: self.mintable_yellow_pool_share,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_trend_window_secs")]
    pub window_secs: i64,
    #[serde(default = "default_growth_threshold")]
    pub growth_threshold: f64,
    /// Percent drop between a buy and the following sell that counts as a dump
    #[serde(default = "default_dump_threshold_pct")]
    pub dump_threshold_pct: f64,
    /// Buys priced at or above this (SOL per token) are ignored as outliers
    #[serde(default = "default_price_ceiling")]
    pub price_ceiling: f64,
    #[serde(default = "default_signature_limit")]
    pub signature_limit: usize,
    #[serde(default = "default_fetch_parallelism")]
    pub fetch_parallelism: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_secs: default_trend_window_secs(),
            growth_threshold: default_growth_threshold(),
            dump_threshold_pct: default_dump_threshold_pct(),
            price_ceiling: default_price_ceiling(),
            signature_limit: default_signature_limit(),
            fetch_parallelism: default_fetch_parallelism(),
        }
    }
}

impl TrendConfig {
    pub fn params(&self) -> TrendParams {
        TrendParams {
            window_secs: self.window_secs,
            growth_threshold: self.growth_threshold,
            price_ceiling: self.price_ceiling,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Paper-trade against live pool balances instead of sending swaps
    #[serde(default = "default_true")]
    pub simulate_only: bool,
    #[serde(default = "default_allowed_verdicts")]
    pub allowed_verdicts: Vec<VerdictLevel>,
    /// Admission gate for YELLOW pools
    #[serde(default = "default_max_volatility")]
    pub max_volatility: f64,
    #[serde(default = "default_min_buys")]
    pub min_buys: usize,
    #[serde(default = "default_small_buy_sol")]
    pub small_buy_sol: f64,
    #[serde(default = "default_large_buy_sol")]
    pub large_buy_sol: f64,
    /// Stop the pipeline after the first finished trade
    #[serde(default)]
    pub single_trade: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            simulate_only: true,
            allowed_verdicts: default_allowed_verdicts(),
            max_volatility: default_max_volatility(),
            min_buys: default_min_buys(),
            small_buy_sol: default_small_buy_sol(),
            large_buy_sol: default_large_buy_sol(),
            single_trade: false,
        }
    }
}

impl TradingConfig {
    pub fn gate(&self) -> AdmissionGate {
        AdmissionGate {
            allowed: self.allowed_verdicts.clone(),
            max_volatility: self.max_volatility,
            min_buys: self.min_buys,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// WSOL token account whose balance seeds the trading wallet
    #[serde(default)]
    pub wsol_account: Option<String>,
    /// Starting value when no account is configured
    #[serde(default = "default_simulated_start_value")]
    pub simulated_start_value: f64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            wsol_account: None,
            simulated_start_value: default_simulated_start_value(),
        }
    }
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("RPC_URL").unwrap_or_default()
}

fn default_ws_endpoint() -> String {
    std::env::var("WS_URL").unwrap_or_default()
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_commitment() -> String {
    "confirmed".into()
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_max_concurrent_validations() -> usize {
    15
}

fn default_postpone_buffer_ms() -> u64 {
    300
}

fn default_max_postpone_secs() -> u64 {
    24 * 60 * 60
}

fn default_retention_secs() -> u64 {
    600
}

fn default_eviction_interval_secs() -> u64 {
    30
}

fn default_dedup_capacity() -> usize {
    10_000
}

fn default_stats_interval_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_lp_burn_threshold() -> u64 {
    100
}

fn default_lp_burn_wait_secs() -> u64 {
    2 * 60 * 60
}

fn default_lp_wait_min_pool_share() -> f64 {
    0.5
}

fn default_lp_check_attempts() -> u32 {
    3
}

fn default_lp_check_delay_ms() -> u64 {
    700
}

fn default_sol_usd_rate() -> f64 {
    110.0
}

fn default_min_liquidity_usd() -> f64 {
    500.0
}

fn default_max_liquidity_usd() -> f64 {
    100_000_000.0
}

fn default_green_pool_share() -> f64 {
    0.99
}

fn default_min_pool_share() -> f64 {
    0.10
}

fn default_mintable_yellow_pool_share() -> f64 {
    0.95
}

fn default_trend_window_secs() -> i64 {
    60
}

fn default_growth_threshold() -> f64 {
    0.001
}

fn default_dump_threshold_pct() -> f64 {
    50.0
}

fn default_price_ceiling() -> f64 {
    2.0
}

fn default_signature_limit() -> usize {
    1000
}

fn default_fetch_parallelism() -> usize {
    8
}

fn default_allowed_verdicts() -> Vec<VerdictLevel> {
    vec![VerdictLevel::Green, VerdictLevel::Yellow]
}

fn default_max_volatility() -> f64 {
    0.5
}

fn default_min_buys() -> usize {
    3
}

fn default_small_buy_sol() -> f64 {
    0.1
}

fn default_large_buy_sol() -> f64 {
    0.3
}

fn default_simulated_start_value() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.ws_endpoint", default_ws_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            .set_default("rpc.retry_attempts", default_retry_attempts() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SNIPER_)
            .add_source(
                config::Environment::with_prefix("SNIPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.rpc.endpoint.trim().is_empty() {
            anyhow::bail!("rpc.endpoint is required (set RPC_URL or SNIPER__RPC__ENDPOINT)");
        }

        if self.rpc.ws_endpoint.trim().is_empty() {
            anyhow::bail!("rpc.ws_endpoint is required (set WS_URL or SNIPER__RPC__WS_ENDPOINT)");
        }

        if self.rpc.retry_attempts == 0 {
            anyhow::bail!("rpc.retry_attempts must be at least 1");
        }

        if !matches!(
            self.rpc.commitment.as_str(),
            "processed" | "confirmed" | "finalized"
        ) {
            anyhow::bail!("rpc.commitment must be processed, confirmed or finalized");
        }

        if self.pipeline.max_concurrent_validations == 0 {
            anyhow::bail!("pipeline.max_concurrent_validations must be positive");
        }

        if self.pipeline.dedup_capacity == 0 {
            anyhow::bail!("pipeline.dedup_capacity must be positive");
        }

        let share = self.safety.lp_wait_min_pool_share;
        if !(0.0..=1.0).contains(&share) {
            anyhow::bail!("safety.lp_wait_min_pool_share must be between 0 and 1");
        }

        if self.safety.sol_usd_rate <= 0.0 {
            anyhow::bail!("safety.sol_usd_rate must be positive");
        }

        let d = &self.decision;
        if d.min_liquidity_usd >= d.max_liquidity_usd {
            anyhow::bail!("decision.min_liquidity_usd must be below max_liquidity_usd");
        }
        if !(0.0 < d.min_pool_share && d.min_pool_share <= d.green_pool_share && d.green_pool_share <= 1.0)
        {
            anyhow::bail!("decision pool share thresholds must satisfy 0 < min <= green <= 1");
        }

        if self.trend.window_secs <= 0 {
            anyhow::bail!("trend.window_secs must be positive");
        }

        if self.trend.fetch_parallelism == 0 {
            anyhow::bail!("trend.fetch_parallelism must be positive");
        }

        if self.trading.small_buy_sol <= 0.0 || self.trading.large_buy_sol <= 0.0 {
            anyhow::bail!("trading buy amounts must be positive");
        }

        if !self.trading.simulate_only {
            anyhow::bail!(
                "trading.simulate_only = false requires a live swap executor, which this build does not include"
            );
        }

        for address in &self.safety.extra_blacklist {
            if address.len() < 32 || address.len() > 44 {
                anyhow::bail!("Invalid blacklist address: {}", address);
            }
        }

        if self.pipeline.max_postpone_secs > default_max_postpone_secs() {
            tracing::warn!(
                "pipeline.max_postpone_secs is above 24h - postponed pools will hold a task for a long time"
            );
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    ws_endpoint: {}
    commitment: {}
    retries: {} x {}ms
  Pipeline:
    max_concurrent_validations: {}
    max_postpone: {}s
    retention: {}s
  Safety:
    lp_burn_threshold: {} (raw)
    lp_burn_wait: {}s
    sol_usd_rate: {}
    extra_blacklist: {} address(es)
  Decision:
    liquidity_usd: [{}, {}]
    pool_share: green >= {}, min >= {}
  Trading:
    simulate_only: {}
    allowed: {:?}
    yellow gate: volatility <= {}, buys >= {}
    buy sizes: small {} SOL, large {} SOL
"#,
            mask_url(&self.rpc.endpoint),
            mask_url(&self.rpc.ws_endpoint),
            self.rpc.commitment,
            self.rpc.retry_attempts,
            self.rpc.retry_delay_ms,
            self.pipeline.max_concurrent_validations,
            self.pipeline.max_postpone_secs,
            self.pipeline.retention_secs,
            self.safety.lp_burn_threshold,
            self.safety.lp_burn_wait_secs,
            self.safety.sol_usd_rate,
            self.safety.extra_blacklist.len(),
            self.decision.min_liquidity_usd,
            self.decision.max_liquidity_usd,
            self.decision.green_pool_share,
            self.decision.min_pool_share,
            self.trading.simulate_only,
            self.trading.allowed_verdicts,
            self.trading.max_volatility,
            self.trading.min_buys,
            self.trading.small_buy_sol,
            self.trading.large_buy_sol,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoint: default_rpc_endpoint(),
                ws_endpoint: default_ws_endpoint(),
                timeout_ms: default_timeout_ms(),
                commitment: default_commitment(),
                retry_attempts: default_retry_attempts(),
                retry_delay_ms: default_retry_delay_ms(),
                reconnect_delay_ms: default_reconnect_delay_ms(),
                max_reconnect_attempts: default_max_reconnect_attempts(),
            },
            pipeline: PipelineConfig::default(),
            safety: SafetyConfig::default(),
            decision: DecisionConfig::default(),
            trend: TrendConfig::default(),
            trading: TradingConfig::default(),
            wallet: WalletConfig::default(),
        }
    }
}
