//! delegation-chronicle command line.
//!
//! Usage:
//!   delegation-chronicle run
//!   delegation-chronicle fetch
//!   delegation-chronicle seed --since 2024-01-01
//!   delegation-chronicle gainer
//!
//! Environment variables:
//!   CHRONICLE_CONFIG     - Path to the TOML config (default: chronicle.toml)
//!   CHRONICLE_ACCOUNT    - Tracked account, overrides the config
//!   CHRONICLE_DATA_DIR   - Artifact directory, overrides the config
//!   RUST_LOG             - Full tracing filter, overrides --log-level

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use delegation_chronicle::rpc::DelegationFeed;
use delegation_chronicle::{Pipeline, TrackerConfig, TrackerError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "delegation-chronicle")]
#[command(about = "Track an account's delegators and curation activity over time")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "CHRONICLE_CONFIG", default_value = "chronicle.toml")]
    config: PathBuf,

    /// Tracked account
    #[arg(short, long, env = "CHRONICLE_ACCOUNT")]
    account: Option<String>,

    /// Directory holding the JSON artifacts
    #[arg(long, env = "CHRONICLE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level for this crate when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan, classify and merge once (the default)
    Run,
    /// Refresh the current-state artifact from the delegation feed
    Fetch,
    /// Backfill monthly vote and delegation counts
    Seed {
        /// First day to scan back to (YYYY-MM-DD)
        #[arg(long)]
        since: NaiveDate,

        /// Record budget for the backfill scan
        #[arg(long)]
        max_records: Option<u64>,
    },
    /// Report the largest gain since the end of last month
    Gainer,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("delegation_chronicle={}", args.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match execute(args).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{:#}", err);
            let code = err
                .downcast_ref::<TrackerError>()
                .map(TrackerError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn execute(args: Args) -> anyhow::Result<u8> {
    let mut config = TrackerConfig::load_or_default(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    if let Some(account) = args.account {
        config.account = account;
    }
    if let Some(dir) = args.data_dir {
        config.data.dir = dir;
    }

    info!(account = %config.account, data_dir = %config.data.dir.display(), "delegation-chronicle starting");

    let pipeline = Pipeline::from_config(config)?;
    let now = Utc::now();

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let report = pipeline.run(now).await?;
            info!(
                today = %report.today,
                written = report.written,
                entered = report.entered.len(),
                exited = report.exited.len(),
                records = report.scan.emitted,
                rollup = ?report.rollup,
                "run complete"
            );
            if !report.ledger_reachable() {
                error!("ledger unreachable; monthly rollup not updated");
            }
            Ok(report.exit_code())
        }
        Command::Fetch => {
            let config = pipeline.config();
            let feed = DelegationFeed::new(&config.feed.base_url, config.feed.limit, config.rpc_timeout())?;
            let state = feed.fetch(&config.account, now).await?;
            pipeline.store_current(&state)?;
            Ok(0)
        }
        Command::Seed { since, max_records } => {
            let budget = max_records.unwrap_or(pipeline.config().scan.max_records);
            let report = pipeline.seed(since, budget, now).await?;
            info!(
                inserted = report.inserted.len(),
                updated = report.updated.len(),
                skipped = report.skipped.len(),
                stop = ?report.scan.stop,
                "seed complete"
            );
            Ok(0)
        }
        Command::Gainer => {
            let report = pipeline.gainer(now.date_naive())?;
            match report.leader {
                Some(leader) => println!(
                    "{}: {:.3} -> {:.3} (+{:.3}) since {}",
                    leader.id, leader.previous, leader.current, leader.increase, report.reference_date
                ),
                None => println!("no delegators"),
            }
            if report.with_reference == 0 {
                info!(reference = %report.reference_date, "no values recorded on the reference date");
            }
            Ok(0)
        }
    }
}
