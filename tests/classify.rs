use fbstats::classify::classify_competition;
use fbstats::model::CompetitionType;

#[test]
fn declared_type_always_wins() {
    assert_eq!(
        classify_competition("Premier League", Some(CompetitionType::NationalTeam)),
        CompetitionType::NationalTeam
    );
    assert_eq!(
        classify_competition("Friendlies (M)", Some(CompetitionType::League)),
        CompetitionType::League
    );
}

#[test]
fn international_keywords_beat_cup_keywords() {
    // Qualifier names carry "cup" and "UEFA" but are international.
    assert_eq!(
        classify_competition("World Cup qualification", None),
        CompetitionType::NationalTeam
    );
    assert_eq!(
        classify_competition("UEFA Euro Qualifying", None),
        CompetitionType::NationalTeam
    );
    assert_eq!(
        classify_competition("UEFA Nations League", None),
        CompetitionType::NationalTeam
    );
    assert_eq!(
        classify_competition("Friendlies (M)", None),
        CompetitionType::NationalTeam
    );
}

#[test]
fn world_cup_is_international_but_club_world_cup_is_not() {
    assert_eq!(
        classify_competition("FIFA World Cup", None),
        CompetitionType::NationalTeam
    );
    assert_ne!(
        classify_competition("FIFA Club World Cup", None),
        CompetitionType::NationalTeam
    );
}

#[test]
fn domestic_cups_beat_the_european_list() {
    assert_eq!(
        classify_competition("FA Cup", None),
        CompetitionType::DomesticCup
    );
    assert_eq!(
        classify_competition("Copa del Rey", None),
        CompetitionType::DomesticCup
    );
    // Generic "cup" names classify domestic even when a continental body
    // appears in the name; the keyword order pins this down.
    assert_eq!(
        classify_competition("UEFA Super Cup", None),
        CompetitionType::DomesticCup
    );
}

#[test]
fn continental_language_cup_names_classify_domestic() {
    // Not every domestic trophy says "cup"; the local words carry the
    // same meaning and the names need not match a specific tournament.
    assert_eq!(
        classify_competition("Coupe de la Ligue", None),
        CompetitionType::DomesticCup
    );
    assert_eq!(
        classify_competition("Coppa Italia Frecciarossa", None),
        CompetitionType::DomesticCup
    );
    assert_eq!(
        classify_competition("Coupe de France", None),
        CompetitionType::DomesticCup
    );
}

#[test]
fn european_competitions_classify_european() {
    assert_eq!(
        classify_competition("Champions League", None),
        CompetitionType::EuropeanCup
    );
    assert_eq!(
        classify_competition("Europa Lg", None),
        CompetitionType::EuropeanCup
    );
    assert_eq!(
        classify_competition("Copa Libertadores", None),
        CompetitionType::EuropeanCup
    );
}

#[test]
fn everything_else_defaults_to_league() {
    assert_eq!(
        classify_competition("Premier League", None),
        CompetitionType::League
    );
    assert_eq!(classify_competition("La Liga", None), CompetitionType::League);
    assert_eq!(
        classify_competition("Bundesliga", None),
        CompetitionType::League
    );
}
