use crate::model::{CompetitionType, MatchEvent, RawStatRow};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

// Column position of the competition cell in the legacy table layout, used
// when the named column is absent.
const COMP_COLUMN_FALLBACK: usize = 4;

/// Converts one season-aggregate table into raw rows. Header rows (the site
/// repeats them inside tbody) are skipped; blank or unparseable numeric
/// cells become absent, not zero, so the merger can tell "no data" from a
/// real zero. `hint` is the competition type declared by the table section,
/// if any.
pub fn parse_stat_table(table: &Html, hint: Option<CompetitionType>) -> Vec<RawStatRow> {
    let mut rows = Vec::new();

    for row in body_rows(table) {
        let season = cell_text(row, "season").unwrap_or_default();
        let competition = cell_text(row, "comp")
            .or_else(|| positional_cell_text(row, COMP_COLUMN_FALLBACK))
            .unwrap_or_default();

        let raw = RawStatRow {
            season,
            competition,
            competition_type: hint,
            games: cell_u32(row, "games"),
            games_starts: cell_u32(row, "games_starts"),
            minutes: cell_u32(row, "minutes"),
            goals: cell_u32(row, "goals"),
            assists: cell_u32(row, "assists"),
            xg: cell_f64(row, "xg"),
            npxg: cell_f64(row, "npxg"),
            xa: cell_f64(row, "xg_assist"),
            shots: cell_u32(row, "shots"),
            shots_on_target: cell_u32(row, "shots_on_target"),
            yellow_cards: cell_u32(row, "cards_yellow"),
            red_cards: cell_u32(row, "cards_red"),
            goals_against: cell_u32(row, "gk_goals_against"),
            saves: cell_u32(row, "gk_saves"),
            clean_sheets: cell_u32(row, "gk_clean_sheets"),
            save_percentage: cell_f64(row, "gk_save_pct"),
            penalties_faced: cell_u32(row, "gk_pens_att"),
            penalties_saved: cell_u32(row, "gk_pens_saved"),
        };

        if !raw.has_identity() && raw.games.is_none() {
            debug!("skipping table row with no identity and no games count");
            continue;
        }

        rows.push(raw);
    }

    rows
}

/// Converts one match-log table into events for `player_key`. Rows without
/// a parseable date are dropped with a warning; everything else degrades to
/// defaults rather than aborting the table.
pub fn parse_match_log_table(table: &Html, player_key: &str) -> Vec<MatchEvent> {
    let mut events = Vec::new();

    for row in body_rows(table) {
        let date_text = cell_text(row, "date").unwrap_or_default();
        let Ok(date) = NaiveDate::parse_from_str(date_text.trim(), "%Y-%m-%d") else {
            if !date_text.trim().is_empty() {
                warn!(player = %player_key, date = %date_text, "dropping match row with unparseable date");
            }
            continue;
        };

        let started = cell_text(row, "game_started")
            .map(|v| v.trim().starts_with('Y'))
            .unwrap_or(false);

        events.push(MatchEvent {
            player_key: player_key.to_string(),
            date,
            competition: cell_text(row, "comp").unwrap_or_default(),
            opponent: cell_text(row, "opponent").unwrap_or_default(),
            started,
            minutes: cell_u32(row, "minutes").unwrap_or(0),
            goals: cell_u32(row, "goals").unwrap_or(0),
            assists: cell_u32(row, "assists").unwrap_or(0),
            xg: cell_f64(row, "xg"),
            xa: cell_f64(row, "xg_assist"),
            yellow_cards: cell_u32(row, "cards_yellow").unwrap_or(0),
            red_cards: cell_u32(row, "cards_red").unwrap_or(0),
            goals_against: cell_u32(row, "gk_goals_against"),
            saves: cell_u32(row, "gk_saves"),
        });
    }

    events
}

fn body_rows(table: &Html) -> Vec<ElementRef<'_>> {
    let Ok(selector) = Selector::parse("tbody tr") else {
        return Vec::new();
    };
    table
        .select(&selector)
        .filter(|row| {
            // Repeated header rows inside tbody carry a "thead" class.
            !row.value()
                .attr("class")
                .is_some_and(|c| c.contains("thead"))
        })
        .collect()
}

/// Reads the cell with the given `data-stat` id, preferring the text of an
/// inner link over the cell's raw text (the site duplicates season and
/// competition text with extra annotations outside the link).
fn cell_text(row: ElementRef<'_>, stat: &str) -> Option<String> {
    let selector =
        Selector::parse(&format!(r#"th[data-stat="{stat}"], td[data-stat="{stat}"]"#)).ok()?;
    let cell = row.select(&selector).next()?;

    let link = Selector::parse("a").ok()?;
    let text = if let Some(anchor) = cell.select(&link).next() {
        joined_text(anchor)
    } else {
        joined_text(cell)
    };

    if text.is_empty() { None } else { Some(text) }
}

fn positional_cell_text(row: ElementRef<'_>, index: usize) -> Option<String> {
    let selector = Selector::parse("th, td").ok()?;
    let cell = row.select(&selector).nth(index)?;
    let text = joined_text(cell);
    if text.is_empty() { None } else { Some(text) }
}

fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell_u32(row: ElementRef<'_>, stat: &str) -> Option<u32> {
    let text = cell_text(row, stat)?;
    text.replace(',', "").trim().parse::<u32>().ok()
}

fn cell_f64(row: ElementRef<'_>, stat: &str) -> Option<f64> {
    let text = cell_text(row, stat)?;
    text.trim().parse::<f64>().ok()
}
