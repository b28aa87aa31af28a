use crate::classify::classify_competition;
use crate::merge::normalize_competition_name;
use crate::model::{CompetitionStat, CompetitionType, GoalkeeperStat, MatchEvent, PlayerRole};
use crate::store::StatRepository;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Club matches belong to the season that starts in July: July-December to
/// the season starting that year, January-June to the one starting the year
/// before.
pub fn season_for_club_match(date: NaiveDate) -> String {
    let year = date.year();
    if date.month() >= 7 {
        format!("{year}-{}", year + 1)
    } else {
        format!("{}-{year}", year - 1)
    }
}

/// International matches group by calendar year into one synthetic record,
/// whatever competition each fixture nominally belonged to.
pub fn national_team_label(year: i32) -> String {
    format!("National Team {year}")
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub competition: Vec<CompetitionStat>,
    pub goalkeeper: Vec<GoalkeeperStat>,
    pub events_used: usize,
    pub duplicates_dropped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub player_key: String,
    pub events_considered: usize,
    pub events_used: usize,
    pub duplicates_dropped: usize,
    pub seasons_replaced: Vec<String>,
    pub rows_written: usize,
    pub stale_national_rows_deleted: usize,
}

#[derive(Debug, Clone, Default)]
struct Aggregate {
    season: String,
    competition_type: Option<CompetitionType>,
    competition_name: String,
    games: u32,
    games_starts: u32,
    minutes: u32,
    goals: u32,
    assists: u32,
    xg: f64,
    xa: f64,
    yellow_cards: u32,
    red_cards: u32,
    goals_against: u32,
    saves: u32,
    clean_sheets: u32,
}

/// Rebuilds aggregated competition statistics from individual match events.
/// Participation means minutes played: unused substitute appearances never
/// count. Events are deduplicated by calendar day; a second counted match on
/// the same day is dropped with a warning (known upstream limitation).
pub fn reconcile_events(
    player_key: &str,
    role: PlayerRole,
    events: &[MatchEvent],
) -> ReconcileOutcome {
    let mut by_date: BTreeMap<NaiveDate, &MatchEvent> = BTreeMap::new();
    let mut duplicates_dropped = 0usize;

    for event in events.iter().filter(|e| e.minutes > 0) {
        if let Some(kept) = by_date.get(&event.date) {
            warn!(
                player = %player_key,
                date = %event.date,
                kept = %kept.competition,
                dropped = %event.competition,
                "second counted match on one day; dropping"
            );
            duplicates_dropped += 1;
            continue;
        }
        by_date.insert(event.date, event);
    }

    let mut aggregates: BTreeMap<String, Aggregate> = BTreeMap::new();

    for event in by_date.values() {
        let competition_type = classify_competition(&event.competition, None);
        let (season, name) = if competition_type == CompetitionType::NationalTeam {
            let year = event.date.year();
            (year.to_string(), national_team_label(year))
        } else {
            (
                season_for_club_match(event.date),
                event.competition.trim().to_string(),
            )
        };

        let key = format!("{season}|{name}");
        let agg = aggregates.entry(key).or_default();
        if agg.season.is_empty() {
            agg.season = season;
            agg.competition_name = name;
            agg.competition_type = Some(competition_type);
        }

        agg.games += 1;
        if event.started {
            agg.games_starts += 1;
        }
        agg.minutes += event.minutes;
        agg.goals += event.goals;
        agg.assists += event.assists;
        agg.xg += event.xg.unwrap_or(0.0);
        agg.xa += event.xa.unwrap_or(0.0);
        agg.yellow_cards += event.yellow_cards;
        agg.red_cards += event.red_cards;
        if let Some(goals_against) = event.goals_against {
            agg.goals_against += goals_against;
            if goals_against == 0 {
                agg.clean_sheets += 1;
            }
        }
        agg.saves += event.saves.unwrap_or(0);
    }

    let mut outcome = ReconcileOutcome {
        events_used: by_date.len(),
        duplicates_dropped,
        ..ReconcileOutcome::default()
    };

    for agg in aggregates.into_values() {
        let competition_type = agg
            .competition_type
            .unwrap_or(CompetitionType::League);
        match role {
            PlayerRole::Outfield => outcome.competition.push(CompetitionStat {
                player_key: player_key.to_string(),
                season: agg.season,
                competition_type,
                competition_name: agg.competition_name,
                games: agg.games,
                games_starts: agg.games_starts,
                minutes: agg.minutes,
                goals: agg.goals,
                assists: agg.assists,
                xg: agg.xg,
                npxg: 0.0,
                xa: agg.xa,
                shots: 0,
                shots_on_target: 0,
                yellow_cards: agg.yellow_cards,
                red_cards: agg.red_cards,
            }),
            PlayerRole::Goalkeeper => outcome.goalkeeper.push(GoalkeeperStat {
                player_key: player_key.to_string(),
                season: agg.season,
                competition_type,
                competition_name: agg.competition_name,
                games: agg.games,
                games_starts: agg.games_starts,
                minutes: agg.minutes,
                goals_against: agg.goals_against,
                saves: agg.saves,
                clean_sheets: agg.clean_sheets,
                save_percentage: None,
                penalties_faced: 0,
                penalties_saved: 0,
            }),
        }
    }

    outcome
}

/// Recomputes a player's canonical rows from the stored match log and makes
/// them the source of truth: every season present in the event set is
/// deleted and rewritten, and national-team rows with no backing events are
/// removed. Mutates the repository only through whole-season replacement, so
/// the player's stat set either fully commits or stays unchanged.
pub fn reconcile_player(
    repo: &mut dyn StatRepository,
    player_key: &str,
    role: PlayerRole,
) -> ReconcileReport {
    let events = repo.match_events_for(player_key);
    let outcome = reconcile_events(player_key, role, &events);

    let mut seasons: BTreeSet<String> = BTreeSet::new();
    for stat in &outcome.competition {
        seasons.insert(stat.season.clone());
    }
    for stat in &outcome.goalkeeper {
        seasons.insert(stat.season.clone());
    }

    for season in &seasons {
        repo.delete_player_season(player_key, season);
    }

    let mut expected_national: BTreeSet<String> = BTreeSet::new();
    let mut rows_written = 0usize;

    for stat in &outcome.competition {
        if stat.competition_type == CompetitionType::NationalTeam {
            expected_national.insert(stat.storage_key());
        }
        repo.upsert_competition_stat(stat.clone());
        rows_written += 1;
    }
    for stat in &outcome.goalkeeper {
        if stat.competition_type == CompetitionType::NationalTeam {
            expected_national.insert(stat.storage_key());
        }
        repo.upsert_goalkeeper_stat(stat.clone());
        rows_written += 1;
    }

    // Scrape-only national-team rows go stale once the match log is the
    // source of truth; sweep any without backing events.
    let mut stale_keys: Vec<String> = Vec::new();
    for stat in repo.competition_stats_for(player_key) {
        if stat.competition_type == CompetitionType::NationalTeam
            && !expected_national.contains(&stat.storage_key())
        {
            stale_keys.push(stat.storage_key());
        }
    }
    for stat in repo.goalkeeper_stats_for(player_key) {
        if stat.competition_type == CompetitionType::NationalTeam
            && !expected_national.contains(&stat.storage_key())
        {
            stale_keys.push(stat.storage_key());
        }
    }

    let mut stale_national_rows_deleted = 0usize;
    for key in stale_keys {
        if repo.delete_competition_stat(&key) {
            stale_national_rows_deleted += 1;
        }
    }

    let report = ReconcileReport {
        player_key: player_key.to_string(),
        events_considered: events.len(),
        events_used: outcome.events_used,
        duplicates_dropped: outcome.duplicates_dropped,
        seasons_replaced: seasons.into_iter().collect(),
        rows_written,
        stale_national_rows_deleted,
    };

    info!(
        player = %player_key,
        events = report.events_considered,
        used = report.events_used,
        rows = report.rows_written,
        seasons = ?report.seasons_replaced,
        stale_national = report.stale_national_rows_deleted,
        "reconciled player from match log"
    );

    report
}

/// Rollup of one club season across league, domestic cup and European cup
/// rows. National-team rows and super-cup fixtures are excluded. Derived on
/// demand, never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonTotal {
    pub season: String,
    pub games: u32,
    pub games_starts: u32,
    pub minutes: u32,
    pub goals: u32,
    pub assists: u32,
    pub xg: f64,
    pub xa: f64,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

pub fn club_season_total(rows: &[CompetitionStat], season: &str) -> SeasonTotal {
    let mut total = SeasonTotal {
        season: season.to_string(),
        ..SeasonTotal::default()
    };

    for stat in rows {
        if stat.season != season {
            continue;
        }
        if stat.competition_type == CompetitionType::NationalTeam {
            continue;
        }
        if normalize_competition_name(&stat.competition_name).contains("super cup") {
            continue;
        }

        total.games += stat.games;
        total.games_starts += stat.games_starts;
        total.minutes += stat.minutes;
        total.goals += stat.goals;
        total.assists += stat.assists;
        total.xg += stat.xg;
        total.xa += stat.xa;
        total.yellow_cards += stat.yellow_cards;
        total.red_cards += stat.red_cards;
    }

    total
}
