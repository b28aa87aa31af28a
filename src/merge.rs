use crate::classify::classify_competition;
use crate::model::{CompetitionStat, GoalkeeperStat, PlayerRole, RawStatRow};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

// Sponsor prefixes the source site prepends to competition names. Stripped
// before keying so differently sponsored spellings of the same competition
// land on one record. Sponsors that replace the whole name ("Carabao Cup")
// are not listed here; those go through COMPETITION_ALIASES instead, since
// deleting the sponsor word would leave a bare "cup" that collides across
// competitions.
const SPONSOR_TOKENS: &[&str] = &[
    "emirates",
    "barclays",
    "heineken",
    "sky bet",
    "ea sports",
    "vitality",
];

// Sponsored titles that fully rename a competition, mapped to the canonical
// name. Matched exactly against the normalized form.
const COMPETITION_ALIASES: &[(&str, &str)] = &[
    ("carabao cup", "league cup"),
    ("efl cup", "league cup"),
    ("betfred cup", "scottish league cup"),
];

static NAME_CLEANUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("normalize regex must be valid"));

/// Raw rows from the four per-player tables of one scrape.
#[derive(Debug, Clone, Default)]
pub struct PlayerTables {
    pub standard: Vec<RawStatRow>,
    pub expected: Vec<RawStatRow>,
    pub shooting: Vec<RawStatRow>,
    pub keeper: Vec<RawStatRow>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub competition: Vec<CompetitionStat>,
    pub goalkeeper: Vec<GoalkeeperStat>,
    pub rows_dropped: usize,
}

/// Lower-cases, strips sponsor prefixes, collapses punctuation and
/// whitespace, then resolves whole-name sponsored titles through the alias
/// table. Two names refer to the same competition iff they normalize to the
/// same string.
pub fn normalize_competition_name(name: &str) -> String {
    let mut lowered = name.to_lowercase();
    for token in SPONSOR_TOKENS {
        lowered = lowered.replace(token, " ");
    }

    let collapsed = NAME_CLEANUP.replace_all(&lowered, " ").trim().to_string();
    for (alias, canonical) in COMPETITION_ALIASES {
        if collapsed == *alias {
            return (*canonical).to_string();
        }
    }
    collapsed
}

pub fn normalize_key(season: &str, competition: &str) -> String {
    format!("{}::{}", season.trim(), normalize_competition_name(competition))
}

/// Combines the Standard / Expected / Shooting / Goalkeeper tables into one
/// canonical record per normalized (season, competition) key.
///
/// Precedence: base fields come from the Standard table; xG/npxG/xA from the
/// Expected table when present, with the Shooting table as fallback for
/// xG/npxG only; goalkeeper rows contribute goalkeeper fields and never
/// replace a minutes value already present from the Standard table. A key
/// seen only in the partial tables still produces a record.
pub fn merge_player_tables(
    player_key: &str,
    role: PlayerRole,
    tables: &PlayerTables,
) -> MergeOutcome {
    let mut slots: BTreeMap<String, RawStatRow> = BTreeMap::new();
    let mut rows_dropped = 0usize;

    for row in &tables.standard {
        let Some(slot) = slot_for(&mut slots, row, &mut rows_dropped) else {
            continue;
        };
        overwrite(&mut slot.games, row.games);
        overwrite(&mut slot.games_starts, row.games_starts);
        overwrite(&mut slot.minutes, row.minutes);
        overwrite(&mut slot.goals, row.goals);
        overwrite(&mut slot.assists, row.assists);
        overwrite(&mut slot.yellow_cards, row.yellow_cards);
        overwrite(&mut slot.red_cards, row.red_cards);
    }

    for row in &tables.expected {
        let Some(slot) = slot_for(&mut slots, row, &mut rows_dropped) else {
            continue;
        };
        overwrite(&mut slot.xg, row.xg);
        overwrite(&mut slot.npxg, row.npxg);
        overwrite(&mut slot.xa, row.xa);
        fill(&mut slot.games, row.games);
        fill(&mut slot.minutes, row.minutes);
    }

    for row in &tables.shooting {
        let Some(slot) = slot_for(&mut slots, row, &mut rows_dropped) else {
            continue;
        };
        overwrite(&mut slot.shots, row.shots);
        overwrite(&mut slot.shots_on_target, row.shots_on_target);
        // Shooting xG only counts when Expected supplied nothing.
        fill(&mut slot.xg, row.xg);
        fill(&mut slot.npxg, row.npxg);
        fill(&mut slot.games, row.games);
        fill(&mut slot.minutes, row.minutes);
    }

    for row in &tables.keeper {
        let Some(slot) = slot_for(&mut slots, row, &mut rows_dropped) else {
            continue;
        };
        overwrite(&mut slot.goals_against, row.goals_against);
        overwrite(&mut slot.saves, row.saves);
        overwrite(&mut slot.clean_sheets, row.clean_sheets);
        overwrite(&mut slot.save_percentage, row.save_percentage);
        overwrite(&mut slot.penalties_faced, row.penalties_faced);
        overwrite(&mut slot.penalties_saved, row.penalties_saved);
        // The keeper table under-reports minutes for short appearances;
        // base fields only fill gaps here.
        fill(&mut slot.games, row.games);
        fill(&mut slot.games_starts, row.games_starts);
        fill(&mut slot.minutes, row.minutes);
    }

    let mut outcome = MergeOutcome {
        rows_dropped,
        ..MergeOutcome::default()
    };

    for row in slots.into_values() {
        if !row.has_identity() && row.games.is_none() {
            warn!(player = %player_key, "discarding merged row with no identity and no games count");
            outcome.rows_dropped += 1;
            continue;
        }

        let competition_type = classify_competition(&row.competition, row.competition_type);
        match role {
            PlayerRole::Outfield => outcome.competition.push(CompetitionStat {
                player_key: player_key.to_string(),
                season: row.season.trim().to_string(),
                competition_type,
                competition_name: row.competition.trim().to_string(),
                games: row.games.unwrap_or(0),
                games_starts: row.games_starts.unwrap_or(0),
                minutes: row.minutes.unwrap_or(0),
                goals: row.goals.unwrap_or(0),
                assists: row.assists.unwrap_or(0),
                xg: row.xg.unwrap_or(0.0),
                npxg: row.npxg.unwrap_or(0.0),
                xa: row.xa.unwrap_or(0.0),
                shots: row.shots.unwrap_or(0),
                shots_on_target: row.shots_on_target.unwrap_or(0),
                yellow_cards: row.yellow_cards.unwrap_or(0),
                red_cards: row.red_cards.unwrap_or(0),
            }),
            PlayerRole::Goalkeeper => outcome.goalkeeper.push(GoalkeeperStat {
                player_key: player_key.to_string(),
                season: row.season.trim().to_string(),
                competition_type,
                competition_name: row.competition.trim().to_string(),
                games: row.games.unwrap_or(0),
                games_starts: row.games_starts.unwrap_or(0),
                minutes: row.minutes.unwrap_or(0),
                goals_against: row.goals_against.unwrap_or(0),
                saves: row.saves.unwrap_or(0),
                clean_sheets: row.clean_sheets.unwrap_or(0),
                save_percentage: row.save_percentage,
                penalties_faced: row.penalties_faced.unwrap_or(0),
                penalties_saved: row.penalties_saved.unwrap_or(0),
            }),
        }
    }

    debug!(
        player = %player_key,
        competition = outcome.competition.len(),
        goalkeeper = outcome.goalkeeper.len(),
        dropped = outcome.rows_dropped,
        "merged player tables"
    );

    outcome
}

fn slot_for<'a>(
    slots: &'a mut BTreeMap<String, RawStatRow>,
    row: &RawStatRow,
    rows_dropped: &mut usize,
) -> Option<&'a mut RawStatRow> {
    if !row.has_identity() {
        warn!(season = %row.season, competition = %row.competition, "discarding row without season/competition identity");
        *rows_dropped += 1;
        return None;
    }

    let key = normalize_key(&row.season, &row.competition);
    let slot = slots.entry(key).or_default();

    if slot.season.is_empty() {
        slot.season = row.season.clone();
    }
    if slot.competition.is_empty() {
        slot.competition = row.competition.clone();
    }
    if slot.competition_type.is_none() {
        slot.competition_type = row.competition_type;
    }

    Some(slot)
}

fn overwrite<T: Copy>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn fill<T: Copy>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}
