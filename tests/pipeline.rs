use anyhow::Result;
use fbstats::harness::{HarnessOptions, run_harness};
use fbstats::model::CompetitionType;
use fbstats::pipeline::{
    MatchLogOptions, ReconcileOptions, SyncOptions, load_state_for_read, reconcile_players,
    sync_match_logs, sync_players,
};
use fbstats::quota::QuotaMonitor;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn sync_merges_all_tables_into_canonical_rows() -> Result<()> {
    let env = setup_fixture_env()?;

    let reports = sync_players(&env.sync_options())?;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert!(!report.skipped);
    assert_eq!(report.tables_located, 4);
    assert_eq!(report.stats_written, 2);

    let state = load_state_for_read(&env.state_path)?;
    assert_eq!(state.competition_stats.len(), 2);

    let league = state
        .competition_stats
        .values()
        .find(|s| s.competition_name == "Premier League")
        .expect("league row must exist");
    assert_eq!(league.season, "2024-2025");
    assert_eq!(league.games, 30);
    assert_eq!(league.minutes, 2520);
    assert_eq!(league.goals, 17);
    // Expected-table xG wins over the Shooting table's value.
    assert!((league.xg - 15.3).abs() < f64::EPSILON);
    assert!((league.npxg - 13.1).abs() < f64::EPSILON);
    assert!((league.xa - 6.2).abs() < f64::EPSILON);
    assert_eq!(league.shots, 88);
    assert_eq!(league.shots_on_target, 41);

    let cup = state
        .competition_stats
        .values()
        .find(|s| s.competition_name == "Emirates FA Cup")
        .expect("cup row must exist");
    assert_eq!(cup.competition_type, CompetitionType::DomesticCup);
    assert_eq!(cup.games, 4);

    Ok(())
}

#[test]
fn second_sync_is_stable_and_served_from_cache() -> Result<()> {
    let env = setup_fixture_env()?;

    sync_players(&env.sync_options())?;
    let first_usage = QuotaMonitor::load(&env.usage_path, 100, 3_000)?
        .daily_usage(None)
        .count;

    let reports = sync_players(&env.sync_options())?;
    assert_eq!(reports[0].stats_written, 2);

    let second_usage = QuotaMonitor::load(&env.usage_path, 100, 3_000)?
        .daily_usage(None)
        .count;
    assert_eq!(first_usage, 1);
    assert_eq!(second_usage, first_usage);

    let state = load_state_for_read(&env.state_path)?;
    assert_eq!(state.competition_stats.len(), 2);

    Ok(())
}

#[test]
fn dry_run_persists_nothing() -> Result<()> {
    let env = setup_fixture_env()?;

    let mut options = env.sync_options();
    options.dry_run = true;
    let reports = sync_players(&options)?;
    assert_eq!(reports[0].stats_written, 2);

    assert!(!env.state_path.exists());
    assert!(!env.cache_path.exists());
    assert!(!env.usage_path.exists());

    Ok(())
}

#[test]
fn match_logs_then_reconcile_rebuild_the_touched_seasons() -> Result<()> {
    let env = setup_fixture_env()?;

    sync_players(&env.sync_options())?;

    let log_reports = sync_match_logs(&MatchLogOptions {
        config_path: None,
        players_dir: env.players_dir.clone(),
        state_path: env.state_path.clone(),
        cache_path: env.cache_path.clone(),
        usage_path: env.usage_path.clone(),
        player: None,
        seasons: vec!["2024-2025".to_string()],
        dry_run: false,
    })?;
    assert_eq!(log_reports.len(), 1);
    assert_eq!(log_reports[0].seasons_fetched, 1);
    assert_eq!(log_reports[0].events_parsed, 3);
    assert_eq!(log_reports[0].events_inserted, 3);

    let reconcile_reports = reconcile_players(&ReconcileOptions {
        players_dir: env.players_dir.clone(),
        state_path: env.state_path.clone(),
        player: None,
        dry_run: false,
    })?;
    assert_eq!(reconcile_reports.len(), 1);
    let report = &reconcile_reports[0];
    assert_eq!(report.events_considered, 3);
    // The unused substitute appearance never counts.
    assert_eq!(report.events_used, 2);
    assert_eq!(report.rows_written, 2);

    let state = load_state_for_read(&env.state_path)?;
    assert_eq!(state.match_events.len(), 3);

    let rows: Vec<_> = state.competition_stats.values().collect();
    assert_eq!(rows.len(), 2);

    let league = rows
        .iter()
        .find(|s| s.competition_name == "Premier League")
        .expect("league row must exist");
    assert_eq!(league.season, "2024-2025");
    assert_eq!(league.games, 1);
    assert_eq!(league.goals, 1);

    let national = rows
        .iter()
        .find(|s| s.competition_type == CompetitionType::NationalTeam)
        .expect("national-team row must exist");
    assert_eq!(national.season, "2025");
    assert_eq!(national.competition_name, "National Team 2025");
    assert_eq!(national.games, 1);

    // The scraped cup row shared the rebuilt season and is gone.
    assert!(!rows.iter().any(|s| s.competition_name == "Emirates FA Cup"));

    Ok(())
}

#[test]
fn harness_reports_stability_metrics() -> Result<()> {
    let env = setup_fixture_env()?;

    let report = run_harness(&HarnessOptions {
        config_path: None,
        players_dir: env.players_dir,
        state_path: env.state_path,
        cache_path: env.cache_path,
        usage_path: env.usage_path,
    })?;

    assert_eq!(report.first_run_players, 1);
    assert_eq!(report.first_run_stats_written, 2);
    assert_eq!(report.second_run_stats_written, 2);
    assert_eq!(report.match_events_inserted, 3);
    assert_eq!(report.reconciled_rows, 2);
    assert_eq!(report.match_events, 3);
    assert_eq!(report.competition_rows, 2);
    assert_eq!(report.goalkeeper_rows, 0);

    Ok(())
}

#[test]
fn unknown_player_filter_is_an_error() -> Result<()> {
    let env = setup_fixture_env()?;

    let mut options = env.sync_options();
    options.player = Some("nobody".to_string());
    assert!(sync_players(&options).is_err());

    Ok(())
}

struct FixtureEnv {
    players_dir: std::path::PathBuf,
    state_path: std::path::PathBuf,
    cache_path: std::path::PathBuf,
    usage_path: std::path::PathBuf,
}

impl FixtureEnv {
    fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            config_path: None,
            players_dir: self.players_dir.clone(),
            state_path: self.state_path.clone(),
            cache_path: self.cache_path.clone(),
            usage_path: self.usage_path.clone(),
            player: None,
            dry_run: false,
        }
    }
}

fn setup_fixture_env() -> Result<FixtureEnv> {
    let temp = tempdir()?;
    let root = temp.keep();

    let fixture_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let players_dir = root.join("players");
    copy_dir(&fixture_root.join("players"), &players_dir)?;
    copy_dir(&fixture_root.join("data"), &root.join("data"))?;

    Ok(FixtureEnv {
        players_dir,
        state_path: root.join("state/stats.json"),
        cache_path: root.join("state/cache.json"),
        usage_path: root.join("state/usage.json"),
    })
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else {
            if let Some(parent) = dst_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(src_path, dst_path)?;
        }
    }

    Ok(())
}
