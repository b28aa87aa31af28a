use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed taxonomy of competition kinds a stat row can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionType {
    League,
    DomesticCup,
    EuropeanCup,
    NationalTeam,
}

impl CompetitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionType::League => "league",
            CompetitionType::DomesticCup => "domestic_cup",
            CompetitionType::EuropeanCup => "european_cup",
            CompetitionType::NationalTeam => "national_team",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRole {
    #[default]
    Outfield,
    Goalkeeper,
}

/// One raw row as read from a single statistics table. Every numeric field is
/// optional so a blank cell stays distinguishable from a genuine zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatRow {
    pub season: String,
    pub competition: String,
    pub competition_type: Option<CompetitionType>,
    pub games: Option<u32>,
    pub games_starts: Option<u32>,
    pub minutes: Option<u32>,
    pub goals: Option<u32>,
    pub assists: Option<u32>,
    pub xg: Option<f64>,
    pub npxg: Option<f64>,
    pub xa: Option<f64>,
    pub shots: Option<u32>,
    pub shots_on_target: Option<u32>,
    pub yellow_cards: Option<u32>,
    pub red_cards: Option<u32>,
    pub goals_against: Option<u32>,
    pub saves: Option<u32>,
    pub clean_sheets: Option<u32>,
    pub save_percentage: Option<f64>,
    pub penalties_faced: Option<u32>,
    pub penalties_saved: Option<u32>,
}

impl RawStatRow {
    pub fn has_identity(&self) -> bool {
        !self.season.trim().is_empty() && !self.competition.trim().is_empty()
    }
}

/// Canonical merged statistics for one player / season / competition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitionStat {
    pub player_key: String,
    pub season: String,
    pub competition_type: CompetitionType,
    pub competition_name: String,
    pub games: u32,
    pub games_starts: u32,
    pub minutes: u32,
    pub goals: u32,
    pub assists: u32,
    pub xg: f64,
    pub npxg: f64,
    pub xa: f64,
    pub shots: u32,
    pub shots_on_target: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

impl CompetitionStat {
    pub fn storage_key(&self) -> String {
        stat_storage_key(
            &self.player_key,
            &self.season,
            self.competition_type,
            &self.competition_name,
        )
    }
}

/// Goalkeeper counterpart of [`CompetitionStat`]; same uniqueness key,
/// disjoint from it by player role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalkeeperStat {
    pub player_key: String,
    pub season: String,
    pub competition_type: CompetitionType,
    pub competition_name: String,
    pub games: u32,
    pub games_starts: u32,
    pub minutes: u32,
    pub goals_against: u32,
    pub saves: u32,
    pub clean_sheets: u32,
    pub save_percentage: Option<f64>,
    pub penalties_faced: u32,
    pub penalties_saved: u32,
}

impl GoalkeeperStat {
    pub fn storage_key(&self) -> String {
        stat_storage_key(
            &self.player_key,
            &self.season,
            self.competition_type,
            &self.competition_name,
        )
    }
}

pub fn stat_storage_key(
    player_key: &str,
    season: &str,
    competition_type: CompetitionType,
    competition_name: &str,
) -> String {
    format!(
        "{player_key}|{season}|{}|{competition_name}",
        competition_type.as_str()
    )
}

/// One match appearance, immutable once scraped. Identity is
/// (player_key, date): at most one counted match per player per calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchEvent {
    pub player_key: String,
    pub date: NaiveDate,
    pub competition: String,
    pub opponent: String,
    pub started: bool,
    pub minutes: u32,
    pub goals: u32,
    pub assists: u32,
    pub xg: Option<f64>,
    pub xa: Option<f64>,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub goals_against: Option<u32>,
    pub saves: Option<u32>,
}

impl MatchEvent {
    pub fn storage_key(&self) -> String {
        event_storage_key(&self.player_key, self.date)
    }
}

pub fn event_storage_key(player_key: &str, date: NaiveDate) -> String {
    format!("{player_key}|{}", date.format("%Y-%m-%d"))
}

/// Persisted canonical state: merged stats plus the raw match-event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub schema_version: u32,
    pub competition_stats: BTreeMap<String, CompetitionStat>,
    pub goalkeeper_stats: BTreeMap<String, GoalkeeperStat>,
    pub match_events: BTreeMap<String, MatchEvent>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            schema_version: 1,
            competition_stats: BTreeMap::new(),
            goalkeeper_stats: BTreeMap::new(),
            match_events: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerSyncReport {
    pub player_key: String,
    pub tables_located: usize,
    pub rows_parsed: usize,
    pub rows_dropped: usize,
    pub stats_written: usize,
    pub seasons_replaced: usize,
    pub skipped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MatchLogSyncReport {
    pub player_key: String,
    pub seasons_fetched: usize,
    pub events_parsed: usize,
    pub events_inserted: usize,
    pub skipped: bool,
}
