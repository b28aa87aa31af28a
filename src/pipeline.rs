use crate::cache::{CacheStore, CacheType};
use crate::config::{
    LoadedPlayer, load_app_config, load_player_file, load_players_from_dir,
};
use crate::fetch::{HtmlSource, QuotaExceeded, RetryPolicy};
use crate::locate::locate_table;
use crate::merge::{PlayerTables, merge_player_tables};
use crate::model::{
    CompetitionType, MatchLogSyncReport, PlayerSyncReport, RawStatRow, State,
};
use crate::parse::{parse_match_log_table, parse_stat_table};
use crate::quota::{QuotaMonitor, UsageSummary};
use crate::reconcile::{ReconcileReport, reconcile_player};
use crate::store::{StatRepository, load_state, save_state};
use anyhow::{Result, bail};
use chrono::NaiveDate;
use scraper::Html;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// Table id suffixes per competition section of the stats site, with the
// competition type each section declares.
const TABLE_SECTIONS: &[(&str, Option<CompetitionType>)] = &[
    ("dom_lg", Some(CompetitionType::League)),
    ("dom_cup", Some(CompetitionType::DomesticCup)),
    ("intl_cup", Some(CompetitionType::EuropeanCup)),
    ("nat_tm", Some(CompetitionType::NationalTeam)),
];

const MATCH_LOG_TABLE_ID: &str = "matchlogs_all";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub config_path: Option<PathBuf>,
    pub players_dir: PathBuf,
    pub state_path: PathBuf,
    pub cache_path: PathBuf,
    pub usage_path: PathBuf,
    pub player: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct MatchLogOptions {
    pub config_path: Option<PathBuf>,
    pub players_dir: PathBuf,
    pub state_path: PathBuf,
    pub cache_path: PathBuf,
    pub usage_path: PathBuf,
    pub player: Option<String>,
    pub seasons: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub players_dir: PathBuf,
    pub state_path: PathBuf,
    pub player: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub players_dir: Option<PathBuf>,
    pub player_file: Option<PathBuf>,
}

/// Scrapes every enabled player's aggregate tables, merges them into
/// canonical rows and replaces the touched seasons. One player's failure
/// never aborts the run, and a player's rows are either fully replaced or
/// left unchanged.
pub fn sync_players(options: &SyncOptions) -> Result<Vec<PlayerSyncReport>> {
    let config = load_app_config(options.config_path.as_deref())?;
    let players = select_players(&options.players_dir, options.player.as_deref())?;

    let source = HtmlSource::from_settings(&config.html)?;
    let cache = CacheStore::load(&options.cache_path)?;
    let quota = QuotaMonitor::load(
        &options.usage_path,
        config.quota.daily_quota,
        config.quota.monthly_quota,
    )?;
    let retry = RetryPolicy {
        max_attempts: config.html.retry_attempts,
        backoff_ms: config.html.retry_backoff_ms,
    };

    let mut state = load_state(&options.state_path)?;
    let mut reports = Vec::new();

    for player in players {
        let key = player.config.player.key.clone();
        if !player.config.player.enabled {
            info!(player = %key, "player disabled; skipping");
            continue;
        }

        info!(player = %key, "sync start");
        let ttl = Some(config.cache.ttl_for(CacheType::PlayerDetail));
        let fetched = retry.run("player page fetch", || {
            source.fetch_player_page(&player, &cache, &quota, ttl)
        });

        let body = match fetched {
            Ok(Some(body)) => body,
            Ok(None) => {
                warn!(player = %key, "no player page data; skipping");
                reports.push(skipped_sync_report(&key));
                continue;
            }
            Err(err) => {
                if err.downcast_ref::<QuotaExceeded>().is_some() {
                    warn!(player = %key, error = %err, "quota denied; try again later");
                } else {
                    warn!(player = %key, error = %err, "player page fetch failed; skipping");
                }
                reports.push(skipped_sync_report(&key));
                continue;
            }
        };

        let doc = Html::parse_document(&body);
        let mut tables_located = 0usize;
        let tables = PlayerTables {
            standard: collect_category_rows(&doc, "standard", &mut tables_located),
            expected: collect_category_rows(&doc, "expected", &mut tables_located),
            shooting: collect_category_rows(&doc, "shooting", &mut tables_located),
            keeper: collect_category_rows(&doc, "keeper", &mut tables_located),
        };
        let rows_parsed = tables.standard.len()
            + tables.expected.len()
            + tables.shooting.len()
            + tables.keeper.len();

        let outcome = merge_player_tables(&key, player.config.player.role, &tables);

        let mut seasons: BTreeSet<String> = BTreeSet::new();
        for stat in &outcome.competition {
            seasons.insert(stat.season.clone());
        }
        for stat in &outcome.goalkeeper {
            seasons.insert(stat.season.clone());
        }
        for season in &seasons {
            state.delete_player_season(&key, season);
        }

        let mut stats_written = 0usize;
        for stat in outcome.competition {
            state.upsert_competition_stat(stat);
            stats_written += 1;
        }
        for stat in outcome.goalkeeper {
            state.upsert_goalkeeper_stat(stat);
            stats_written += 1;
        }

        info!(
            player = %key,
            tables = tables_located,
            rows = rows_parsed,
            written = stats_written,
            seasons = seasons.len(),
            "sync merge complete"
        );

        reports.push(PlayerSyncReport {
            player_key: key,
            tables_located,
            rows_parsed,
            rows_dropped: outcome.rows_dropped,
            stats_written,
            seasons_replaced: seasons.len(),
            skipped: false,
        });
    }

    quota.prune_older_than(config.quota.retention_days);

    if !options.dry_run {
        save_state(&options.state_path, &state)?;
        cache.save(&options.cache_path)?;
        quota.save(&options.usage_path)?;
        info!(state = %options.state_path.display(), "state written");
    } else {
        info!("dry run enabled; state, cache and usage not persisted");
    }

    Ok(reports)
}

/// Scrapes per-season match log pages and appends new events. Existing
/// (player, date) keys are left untouched: events are immutable facts.
pub fn sync_match_logs(options: &MatchLogOptions) -> Result<Vec<MatchLogSyncReport>> {
    if options.seasons.is_empty() {
        bail!("at least one season is required");
    }

    let config = load_app_config(options.config_path.as_deref())?;
    let players = select_players(&options.players_dir, options.player.as_deref())?;

    let source = HtmlSource::from_settings(&config.html)?;
    let cache = CacheStore::load(&options.cache_path)?;
    let quota = QuotaMonitor::load(
        &options.usage_path,
        config.quota.daily_quota,
        config.quota.monthly_quota,
    )?;
    let retry = RetryPolicy {
        max_attempts: config.html.retry_attempts,
        backoff_ms: config.html.retry_backoff_ms,
    };

    let mut state = load_state(&options.state_path)?;
    let mut reports = Vec::new();

    for player in players {
        let key = player.config.player.key.clone();
        if !player.config.player.enabled {
            info!(player = %key, "player disabled; skipping");
            continue;
        }

        let mut report = MatchLogSyncReport {
            player_key: key.clone(),
            ..MatchLogSyncReport::default()
        };

        for season in &options.seasons {
            let ttl = Some(config.cache.ttl_for(CacheType::MatchDetail));
            let fetched = retry.run("match log fetch", || {
                source.fetch_match_log(&player, season, &cache, &quota, ttl)
            });

            let body = match fetched {
                Ok(Some(body)) => body,
                Ok(None) => {
                    info!(player = %key, season, "no match log data");
                    continue;
                }
                Err(err) => {
                    warn!(player = %key, season, error = %err, "match log fetch failed; skipping season");
                    report.skipped = true;
                    continue;
                }
            };

            report.seasons_fetched += 1;
            let doc = Html::parse_document(&body);
            let Some(table) = locate_table(&doc, MATCH_LOG_TABLE_ID) else {
                info!(player = %key, season, "no match log table in page");
                continue;
            };

            let events = parse_match_log_table(&table, &key);
            report.events_parsed += events.len();
            for event in events {
                if state.insert_match_event(event) {
                    report.events_inserted += 1;
                }
            }
        }

        info!(
            player = %key,
            seasons = report.seasons_fetched,
            parsed = report.events_parsed,
            inserted = report.events_inserted,
            "match log sync complete"
        );
        reports.push(report);
    }

    if !options.dry_run {
        save_state(&options.state_path, &state)?;
        cache.save(&options.cache_path)?;
        quota.save(&options.usage_path)?;
    } else {
        info!("dry run enabled; state, cache and usage not persisted");
    }

    Ok(reports)
}

/// Rebuilds canonical rows from stored match events, superseding
/// scrape-derived rows for every season present in the log.
pub fn reconcile_players(options: &ReconcileOptions) -> Result<Vec<ReconcileReport>> {
    let players = select_players(&options.players_dir, options.player.as_deref())?;
    let mut state = load_state(&options.state_path)?;

    let mut reports = Vec::new();
    for player in players {
        if !player.config.player.enabled {
            continue;
        }
        reports.push(reconcile_player(
            &mut state,
            &player.config.player.key,
            player.config.player.role,
        ));
    }

    if !options.dry_run {
        save_state(&options.state_path, &state)?;
    } else {
        info!("dry run enabled; state not persisted");
    }

    Ok(reports)
}

pub fn validate_configs(options: &ValidateOptions) -> Result<Vec<String>> {
    let mut messages = Vec::new();

    if let Some(file) = &options.player_file {
        let player = load_player_file(file)?;
        messages.push(format!(
            "OK: {} ({})",
            player.config.player.key,
            file.display()
        ));
        return Ok(messages);
    }

    if let Some(dir) = &options.players_dir {
        let players = load_players_from_dir(dir)?;
        for player in players {
            messages.push(format!(
                "OK: {} ({})",
                player.config.player.key,
                player.path.display()
            ));
        }
        return Ok(messages);
    }

    bail!("either --players-dir or --player-file must be provided");
}

/// Daily and monthly usage as of `day`/`month`, for the usage command.
pub fn usage_summaries(
    config_path: Option<&Path>,
    usage_path: &Path,
    day: Option<NaiveDate>,
    month: Option<&str>,
) -> Result<(UsageSummary, UsageSummary)> {
    let config = load_app_config(config_path)?;
    let quota = QuotaMonitor::load(
        usage_path,
        config.quota.daily_quota,
        config.quota.monthly_quota,
    )?;
    Ok((quota.daily_usage(day), quota.monthly_usage(month)))
}

/// Eager sweep of expired cache rows, persisted back to disk.
pub fn cleanup_cache(cache_path: &Path) -> Result<usize> {
    let cache = CacheStore::load(cache_path)?;
    let removed = cache.cleanup_expired();
    cache.save(cache_path)?;
    Ok(removed)
}

pub fn load_state_for_read(path: &Path) -> Result<State> {
    load_state(path)
}

fn select_players(players_dir: &Path, filter: Option<&str>) -> Result<Vec<LoadedPlayer>> {
    let mut players = load_players_from_dir(players_dir)?;
    if let Some(filter) = filter {
        players.retain(|p| p.config.player.key == filter);
    }
    if players.is_empty() {
        bail!("no matching player configurations found");
    }
    Ok(players)
}

fn collect_category_rows(
    doc: &Html,
    category: &str,
    tables_located: &mut usize,
) -> Vec<RawStatRow> {
    let mut rows = Vec::new();
    for (suffix, hint) in TABLE_SECTIONS {
        let table_id = format!("stats_{category}_{suffix}");
        if let Some(table) = locate_table(doc, &table_id) {
            *tables_located += 1;
            rows.extend(parse_stat_table(&table, *hint));
        }
    }
    rows
}

fn skipped_sync_report(player_key: &str) -> PlayerSyncReport {
    PlayerSyncReport {
        player_key: player_key.to_string(),
        skipped: true,
        ..PlayerSyncReport::default()
    }
}
