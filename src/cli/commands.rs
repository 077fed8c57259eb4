//! CLI command implementations

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chain::{ChainGateway, RpcGateway};
use crate::config::Config;
use crate::decision::{admit, evaluate, DecisionInput};
use crate::lifecycle::{Orchestrator, Stage, TracingSink};
use crate::pool::{fetch_creation, AmmState};
use crate::safety::{SafetyEvaluator, SafetyOutcome};
use crate::trading::{wallet, PaperExecutor};
use crate::trend::{fetch_latest_trades, TrendAssessment};

/// Start the sniper
pub async fn start(config: &Config, single_trade: bool) -> Result<()> {
    let mut config = config.clone();
    if single_trade {
        config.trading.single_trade = true;
    }

    info!("Starting Raydium pool sniper...");
    info!(
        "Buy sizes: {} SOL (yellow) / {} SOL (green), allowed verdicts: {:?}",
        config.trading.small_buy_sol, config.trading.large_buy_sol, config.trading.allowed_verdicts
    );
    warn!("Running in SIMULATION mode - no transactions are sent");

    info!("Connecting to {}...", config.rpc.endpoint);
    let gateway: Arc<dyn ChainGateway> = Arc::new(RpcGateway::new(&config.rpc)?);

    let wallet = wallet::initialize(gateway.as_ref(), &config.wallet).await?;
    info!("Wallet start value: {} SOL", wallet.start_value);

    let shutdown = CancellationToken::new();
    let executor = Arc::new(PaperExecutor::new(
        gateway.clone(),
        config.rpc.retry_policy(),
        shutdown.clone(),
    ));

    let orchestrator = Orchestrator::new(
        config,
        gateway,
        executor,
        Arc::new(TracingSink),
        wallet,
        &shutdown,
    );
    let handle = orchestrator.handle();

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down...");
            ctrl_c.cancel();
        }
    });

    let result = orchestrator.run().await;

    let snapshot = handle.snapshot();
    let wallet = snapshot.wallet;
    println!("\n=== SESSION SUMMARY ===\n");
    println!("Pools seen: {}", snapshot.pools.len());
    for stage in [Stage::Done, Stage::Skipped, Stage::Failed] {
        println!("  {}: {}", stage, snapshot.in_stage(stage).len());
    }
    println!("Peak validations: {}", snapshot.stats.peak_validations);
    println!(
        "Wallet: {:.4} SOL (start {:.4}, profit {:+.2}%)",
        wallet.current,
        wallet.start_value,
        wallet.total_profit * 100.0
    );

    if let Err(e) = &result {
        error!("Pipeline stopped with error: {}", e);
    }
    Ok(result?)
}

/// Run one pool creation through parsing, safety, trend and decision.
/// Never trades and never waits for an LP burn.
pub async fn check(config: &Config, signature: &str) -> Result<()> {
    let gateway: Arc<dyn ChainGateway> = Arc::new(RpcGateway::new(&config.rpc)?);
    let retry = config.rpc.retry_policy();

    let event = fetch_creation(gateway.as_ref(), signature, retry).await?;
    let pool = &event.pool;

    println!("\n=== POOL {} ===\n", pool.pool_id);
    println!("Token:    {}", pool.token_mint());
    println!("LP mint:  {}", pool.lp_mint);
    println!("Creator:  {}", event.creator);

    let data = retry
        .run("get_pool_state", || gateway.get_account_data(&pool.pool_id))
        .await?;
    let amm = AmmState::decode(&data)?;
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let features = amm.features(now);
    println!(
        "Status:   {:?} (swap {}, opens at {})",
        amm.status,
        if features.swap { "enabled" } else { "disabled" },
        amm.pool_open_time
    );

    let evaluator = SafetyEvaluator::new(gateway.clone(), config.safety.clone(), retry);
    let safety = match evaluator.inspect(&event).await {
        SafetyOutcome::CreatorBlacklisted(creator) => {
            println!("\nCreator {} is blacklisted", creator);
            return Ok(());
        }
        SafetyOutcome::Unavailable(reason) => {
            println!("Safety:   unavailable ({})", reason);
            None
        }
        SafetyOutcome::Pending(inspection) => {
            if inspection.needs_lp_wait() {
                println!("LP:       not burned yet, a burn may follow");
            }
            match evaluator.finalize(&inspection, None).await {
                Ok(assessment) => Some(assessment),
                Err(e) => {
                    println!("Safety:   unavailable ({})", e);
                    None
                }
            }
        }
    };

    if let Some(s) = &safety {
        println!("Pool share:  {:.2}%", s.new_token_pool_balance_percent * 100.0);
        println!("Creator:     {:.2}%", s.creator_balance_percent * 100.0);
        println!("Authority:   {:.2}%", s.authority_balance_percent * 100.0);
        println!("LP locked:   {}", s.is_liquidity_locked);
        println!("Mintable:    {}", s.is_mintable);
        println!(
            "Liquidity:   {} {} (${:.0})",
            s.total_liquidity.amount, s.total_liquidity.symbol, s.total_liquidity.amount_usd
        );
    }

    let token_mint = pool.token_mint();
    let trend = match amm.decimals_of(&token_mint) {
        Some(decimals) => match fetch_latest_trades(
            gateway.as_ref(),
            &pool.pool_id,
            &token_mint,
            decimals,
            config.trend.signature_limit,
            config.trend.fetch_parallelism,
            retry,
        )
        .await
        {
            Ok(trades) => {
                println!("Trades:      {}", trades.len());
                TrendAssessment::from_trades(&trades, &config.trend.params(), config.trend.dump_threshold_pct)
            }
            Err(e) => {
                println!("Trades:      unavailable ({})", e);
                TrendAssessment::unavailable()
            }
        },
        None => TrendAssessment::unavailable(),
    };

    if let Some(stats) = &trend.stats {
        println!(
            "Trend:       {} (growth {:.4}, volatility {:.4}, {} buys)",
            stats.kind, stats.average_growth_rate, stats.volatility, stats.buys_in_first_minute
        );
    }

    let verdict = evaluate(
        &DecisionInput {
            swap_enabled: features.swap,
            safety: safety.as_ref(),
            trend: Some(&trend),
        },
        &config.decision.thresholds(),
    );
    let decision = admit(&verdict, Some(&trend), &config.trading.gate());

    println!("\nVerdict:  {}", verdict);
    println!("Decision: {:?}", decision);
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    print!("RPC Endpoint... ");
    let gateway = RpcGateway::new(&config.rpc)?;
    let start = Instant::now();
    match gateway.health_check().await {
        Ok(slot) => println!("OK (slot {}, {}ms)", slot, start.elapsed().as_millis()),
        Err(e) => {
            println!("FAILED: {}", e);
            anyhow::bail!("RPC endpoint is unhealthy");
        }
    }

    print!("Wallet... ");
    match wallet::initialize(&gateway, &config.wallet).await {
        Ok(w) => println!("OK ({} SOL)", w.start_value),
        Err(e) => println!("FAILED: {}", e),
    }

    println!("\nAll systems healthy!");
    Ok(())
}
