use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fbstats::harness::{HarnessOptions, run_harness};
use fbstats::pipeline::{
    MatchLogOptions, ReconcileOptions, SyncOptions, ValidateOptions, cleanup_cache,
    reconcile_players, sync_match_logs, sync_players, usage_summaries, validate_configs,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fbstats", about = "Config-driven football statistics tracker")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "configs/players")]
    players_dir: PathBuf,

    #[arg(long, default_value = "data/state/stats.json")]
    state_path: PathBuf,

    #[arg(long, default_value = "data/state/cache.json")]
    cache_path: PathBuf,

    #[arg(long, default_value = "data/state/usage.json")]
    usage_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape and merge every player's aggregate statistics tables.
    Sync {
        #[arg(long)]
        player: Option<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Scrape per-season match logs and append new match events.
    Matchlogs {
        #[arg(long)]
        player: Option<String>,
        #[arg(long, required = true)]
        season: Vec<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Rebuild canonical rows from the stored match-event log.
    Reconcile {
        #[arg(long)]
        player: Option<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Report request usage against the daily and monthly quotas.
    Usage {
        #[arg(long)]
        day: Option<NaiveDate>,
        #[arg(long)]
        month: Option<String>,
    },
    /// Sweep expired cache rows from disk.
    CacheCleanup,
    Validate {
        #[arg(long)]
        player_file: Option<PathBuf>,
    },
    Harness,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { player, dry_run } => {
            let reports = sync_players(&SyncOptions {
                config_path: cli.config,
                players_dir: cli.players_dir,
                state_path: cli.state_path,
                cache_path: cli.cache_path,
                usage_path: cli.usage_path,
                player,
                dry_run,
            })?;

            for report in reports {
                info!(
                    player = %report.player_key,
                    tables = report.tables_located,
                    parsed = report.rows_parsed,
                    dropped = report.rows_dropped,
                    written = report.stats_written,
                    seasons = report.seasons_replaced,
                    skipped = report.skipped,
                    "player sync summary"
                );
            }
        }
        Commands::Matchlogs {
            player,
            season,
            dry_run,
        } => {
            let reports = sync_match_logs(&MatchLogOptions {
                config_path: cli.config,
                players_dir: cli.players_dir,
                state_path: cli.state_path,
                cache_path: cli.cache_path,
                usage_path: cli.usage_path,
                player,
                seasons: season,
                dry_run,
            })?;

            for report in reports {
                info!(
                    player = %report.player_key,
                    seasons = report.seasons_fetched,
                    parsed = report.events_parsed,
                    inserted = report.events_inserted,
                    skipped = report.skipped,
                    "match log sync summary"
                );
            }
        }
        Commands::Reconcile { player, dry_run } => {
            let reports = reconcile_players(&ReconcileOptions {
                players_dir: cli.players_dir,
                state_path: cli.state_path,
                player,
                dry_run,
            })?;

            for report in reports {
                info!(
                    player = %report.player_key,
                    considered = report.events_considered,
                    used = report.events_used,
                    duplicates = report.duplicates_dropped,
                    written = report.rows_written,
                    stale_deleted = report.stale_national_rows_deleted,
                    "reconcile summary"
                );
            }
        }
        Commands::Usage { day, month } => {
            let (daily, monthly) =
                usage_summaries(cli.config.as_deref(), &cli.usage_path, day, month.as_deref())?;
            println!(
                "daily: {}/{} ({} remaining)",
                daily.count, daily.quota, daily.remaining
            );
            println!(
                "monthly: {}/{} ({} remaining)",
                monthly.count, monthly.quota, monthly.remaining
            );
        }
        Commands::CacheCleanup => {
            let removed = cleanup_cache(&cli.cache_path)?;
            info!(removed, "cache cleanup complete");
        }
        Commands::Validate { player_file } => {
            let messages = validate_configs(&ValidateOptions {
                players_dir: Some(cli.players_dir),
                player_file,
            })?;
            for line in messages {
                println!("{line}");
            }
        }
        Commands::Harness => {
            let report = run_harness(&HarnessOptions {
                config_path: cli.config,
                players_dir: cli.players_dir,
                state_path: cli.state_path,
                cache_path: cli.cache_path,
                usage_path: cli.usage_path,
            })?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
