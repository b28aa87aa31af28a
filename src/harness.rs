use crate::config::load_players_from_dir;
use crate::pipeline::{
    MatchLogOptions, ReconcileOptions, SyncOptions, load_state_for_read, reconcile_players,
    sync_match_logs, sync_players,
};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub config_path: Option<PathBuf>,
    pub players_dir: PathBuf,
    pub state_path: PathBuf,
    pub cache_path: PathBuf,
    pub usage_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub first_run_players: usize,
    pub first_run_stats_written: usize,
    pub second_run_stats_written: usize,
    pub match_events_inserted: usize,
    pub reconciled_rows: usize,
    pub competition_rows: usize,
    pub goalkeeper_rows: usize,
    pub match_events: usize,
}

/// End-to-end smoke run over the checked-in player configs: two sync passes
/// (the second must be stable), then match logs and reconciliation when any
/// player carries match log fixtures.
pub fn run_harness(options: &HarnessOptions) -> Result<HarnessReport> {
    for path in [&options.state_path, &options.cache_path, &options.usage_path] {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
    }

    let sync_options = SyncOptions {
        config_path: options.config_path.clone(),
        players_dir: options.players_dir.clone(),
        state_path: options.state_path.clone(),
        cache_path: options.cache_path.clone(),
        usage_path: options.usage_path.clone(),
        player: None,
        dry_run: false,
    };

    let first = sync_players(&sync_options)?;
    let second = sync_players(&sync_options)?;

    let mut seasons: BTreeSet<String> = BTreeSet::new();
    for player in load_players_from_dir(&options.players_dir)? {
        seasons.extend(player.config.source.match_log_files.keys().cloned());
    }

    let mut match_events_inserted = 0usize;
    let mut reconciled_rows = 0usize;
    if !seasons.is_empty() {
        let logs = sync_match_logs(&MatchLogOptions {
            config_path: options.config_path.clone(),
            players_dir: options.players_dir.clone(),
            state_path: options.state_path.clone(),
            cache_path: options.cache_path.clone(),
            usage_path: options.usage_path.clone(),
            player: None,
            seasons: seasons.into_iter().collect(),
            dry_run: false,
        })?;
        match_events_inserted = logs.iter().map(|r| r.events_inserted).sum();

        let reconciled = reconcile_players(&ReconcileOptions {
            players_dir: options.players_dir.clone(),
            state_path: options.state_path.clone(),
            player: None,
            dry_run: false,
        })?;
        reconciled_rows = reconciled.iter().map(|r| r.rows_written).sum();
    }

    let state = load_state_for_read(&options.state_path)?;

    Ok(HarnessReport {
        first_run_players: first.len(),
        first_run_stats_written: first.iter().map(|r| r.stats_written).sum(),
        second_run_stats_written: second.iter().map(|r| r.stats_written).sum(),
        match_events_inserted,
        reconciled_rows,
        competition_rows: state.competition_stats.len(),
        goalkeeper_rows: state.goalkeeper_stats.len(),
        match_events: state.match_events.len(),
    })
}
