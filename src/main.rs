//! Raydium pool sniper - watches for new AMM v4 pools and paper-trades the safe ones
//!
//! # WARNING
//! - Most freshly created pools are rug pulls.
//! - Only simulated trading is supported; no transaction is ever sent.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use pool_sniper::cli::commands;
use pool_sniper::config::Config;

/// Raydium new-pool sniper
#[derive(Parser)]
#[command(name = "snipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "SNIPER_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start watching for new pools
    Start {
        /// Stop after the first trade
        #[arg(long)]
        single_trade: bool,
    },

    /// Validate one pool creation transaction without trading
    Check {
        /// Signature of the pool creation transaction
        signature: String,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check RPC connectivity and the wallet
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Start { single_trade } => commands::start(&config, single_trade).await,
        Commands::Check { signature } => commands::check(&config, &signature).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("pool_sniper=info".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
