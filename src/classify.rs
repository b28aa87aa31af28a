use crate::model::CompetitionType;

// Checked before anything else: international fixtures frequently carry
// "cup" or "UEFA" in their names and must not fall through to the club
// checks below.
const NATIONAL_TEAM_KEYWORDS: &[&str] = &[
    "national team",
    "friendl",
    "nations league",
    "wcq",
    "world cup qualif",
    "euro qualif",
    "uefa euro",
    "copa america",
    "copa américa",
    "gold cup",
    "asian cup",
    "africa cup",
    "afcon",
    "olympic",
];

// Checked before the European list so e.g. a domestic super cup is not
// swallowed by the broader continental match.
// "coupe" and "coppa" are generic: the national-team check above has
// already claimed the international names, so whatever remains is a
// domestic trophy. "copa" stays specific (Copa Libertadores is European).
const DOMESTIC_CUP_KEYWORDS: &[&str] = &[
    "fa cup",
    "league cup",
    "efl cup",
    "carabao",
    "copa del rey",
    "coppa",
    "coupe",
    "pokal",
    "knvb",
    "taça",
    "taca",
    "cup",
];

const EUROPEAN_CUP_KEYWORDS: &[&str] = &[
    "champions league",
    "champions lg",
    "europa league",
    "europa lg",
    "conference league",
    "conference lg",
    "uefa",
    "libertadores",
    "sudamericana",
];

/// Maps a competition name to its kind. A declared type (from a table
/// section hint) always wins; otherwise keyword lists are evaluated in the
/// order national-team, domestic-cup, European, defaulting to league. The
/// order is an invariant: ambiguous names such as qualifiers or super cups
/// classify differently under any other order.
pub fn classify_competition(
    name: &str,
    declared: Option<CompetitionType>,
) -> CompetitionType {
    if let Some(declared) = declared {
        return declared;
    }

    let lowered = name.to_lowercase();

    if is_national_team(&lowered) {
        return CompetitionType::NationalTeam;
    }
    if DOMESTIC_CUP_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return CompetitionType::DomesticCup;
    }
    if EUROPEAN_CUP_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return CompetitionType::EuropeanCup;
    }

    CompetitionType::League
}

fn is_national_team(lowered: &str) -> bool {
    // "World Cup" is international; the club tournament of the same name
    // is not.
    if lowered.contains("world cup") && !lowered.contains("club world cup") {
        return true;
    }
    NATIONAL_TEAM_KEYWORDS.iter().any(|k| lowered.contains(k))
}
