//! Vireo validator CLI
//!
//! Runs a local committee from a TOML config, or prints a starter config
//! with funded test accounts.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vireo_types::AccountKeyPair;
use vireo_validator::{GenesisCoin, GenesisCounter, ValidatorConfig, ValidatorRuntime};

#[derive(Parser)]
#[command(name = "vireo-validator")]
#[command(about = "Vireo validator node")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the validator committee until Ctrl-C
    Run {
        /// Path to the TOML config file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override node.validators
        #[arg(long)]
        validators: Option<u64>,

        /// Override node.seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override node.commit_interval_ms
        #[arg(long)]
        commit_interval_ms: Option<u64>,

        /// Log filter used when RUST_LOG is unset
        #[arg(long, default_value = "info")]
        log: String,
    },

    /// Print a config with funded accounts and shared counters
    Genesis {
        /// Number of accounts, derived from seeds 1..=N
        #[arg(long, default_value = "4")]
        accounts: u8,

        /// Coin value per account
        #[arg(long, default_value = "1000000")]
        balance: u64,

        /// Number of shared counters
        #[arg(long, default_value = "1")]
        counters: usize,

        /// Seed of the account allowed to send governance transactions;
        /// 0 disables governance
        #[arg(long, default_value = "1")]
        governance: u8,
    },
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Genesis {
            accounts,
            balance,
            counters,
            governance,
        } => {
            // No tracing here; the config goes to stdout.
            let mut config = ValidatorConfig::default();
            config.genesis.coins = (1..=accounts)
                .map(|seed| GenesisCoin {
                    owner: AccountKeyPair::from_seed(&[seed; 32]).address().to_string(),
                    value: balance,
                })
                .collect();
            config.genesis.counters = vec![GenesisCounter { value: 0 }; counters];
            if governance > 0 {
                config.protocol = config
                    .protocol
                    .with_governance_sender(AccountKeyPair::from_seed(&[governance; 32]).address());
            }
            print!("{}", config.to_toml()?);
        }

        Commands::Run {
            config,
            validators,
            seed,
            commit_interval_ms,
            log,
        } => {
            init_tracing(&log);

            let mut validator_config = match &config {
                Some(path) => ValidatorConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => ValidatorConfig::default(),
            };
            if let Some(validators) = validators {
                validator_config.node.validators = validators;
            }
            if let Some(seed) = seed {
                validator_config.node.seed = seed;
            }
            if let Some(interval) = commit_interval_ms {
                validator_config.node.commit_interval_ms = interval;
            }
            validator_config.validate()?;

            let runtime = ValidatorRuntime::new(&validator_config)?;
            info!("Press Ctrl-C to stop");
            let stats = runtime
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    }
                })
                .await?;
            println!(
                "Stopped after {} commits ({} certificates)",
                stats.commits, stats.certificates
            );
        }
    }

    Ok(())
}
