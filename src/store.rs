use crate::model::{CompetitionStat, GoalkeeperStat, MatchEvent, State};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;

/// Narrow persistence interface the merge and reconciliation logic depend
/// on. Implemented by [`State`]; tests may substitute their own store.
pub trait StatRepository {
    fn upsert_competition_stat(&mut self, stat: CompetitionStat);
    fn upsert_goalkeeper_stat(&mut self, stat: GoalkeeperStat);
    /// Deletes every canonical row (both shapes) for one player season.
    fn delete_player_season(&mut self, player_key: &str, season: &str) -> usize;
    fn delete_competition_stat(&mut self, storage_key: &str) -> bool;
    fn competition_stats_for(&self, player_key: &str) -> Vec<CompetitionStat>;
    fn goalkeeper_stats_for(&self, player_key: &str) -> Vec<GoalkeeperStat>;
    /// Inserts one event; returns false when the (player, date) key already
    /// exists and the event was left untouched.
    fn insert_match_event(&mut self, event: MatchEvent) -> bool;
    fn match_events_for(&self, player_key: &str) -> Vec<MatchEvent>;
    fn delete_match_events(&mut self, player_key: &str, from: NaiveDate, to: NaiveDate) -> usize;
}

impl StatRepository for State {
    fn upsert_competition_stat(&mut self, stat: CompetitionStat) {
        self.competition_stats.insert(stat.storage_key(), stat);
    }

    fn upsert_goalkeeper_stat(&mut self, stat: GoalkeeperStat) {
        self.goalkeeper_stats.insert(stat.storage_key(), stat);
    }

    fn delete_player_season(&mut self, player_key: &str, season: &str) -> usize {
        let before = self.competition_stats.len() + self.goalkeeper_stats.len();
        self.competition_stats
            .retain(|_, s| !(s.player_key == player_key && s.season == season));
        self.goalkeeper_stats
            .retain(|_, s| !(s.player_key == player_key && s.season == season));
        before - self.competition_stats.len() - self.goalkeeper_stats.len()
    }

    fn delete_competition_stat(&mut self, storage_key: &str) -> bool {
        self.competition_stats.remove(storage_key).is_some()
            | self.goalkeeper_stats.remove(storage_key).is_some()
    }

    fn competition_stats_for(&self, player_key: &str) -> Vec<CompetitionStat> {
        self.competition_stats
            .values()
            .filter(|s| s.player_key == player_key)
            .cloned()
            .collect()
    }

    fn goalkeeper_stats_for(&self, player_key: &str) -> Vec<GoalkeeperStat> {
        self.goalkeeper_stats
            .values()
            .filter(|s| s.player_key == player_key)
            .cloned()
            .collect()
    }

    fn insert_match_event(&mut self, event: MatchEvent) -> bool {
        let key = event.storage_key();
        if self.match_events.contains_key(&key) {
            return false;
        }
        self.match_events.insert(key, event);
        true
    }

    fn match_events_for(&self, player_key: &str) -> Vec<MatchEvent> {
        self.match_events
            .values()
            .filter(|e| e.player_key == player_key)
            .cloned()
            .collect()
    }

    fn delete_match_events(&mut self, player_key: &str, from: NaiveDate, to: NaiveDate) -> usize {
        let before = self.match_events.len();
        self.match_events
            .retain(|_, e| !(e.player_key == player_key && e.date >= from && e.date <= to));
        before - self.match_events.len()
    }
}

pub fn load_state(path: &Path) -> Result<State> {
    if !path.exists() {
        return Ok(State::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    let state = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse state file {}", path.display()))?;
    Ok(state)
}

pub fn save_state(path: &Path, state: &State) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create state directory {}", parent.display()))?;
    }

    let serialized = serde_json::to_string_pretty(state)?;
    std::fs::write(path, serialized)
        .with_context(|| format!("failed to write state file {}", path.display()))?;
    Ok(())
}
