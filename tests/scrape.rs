use fbstats::locate::locate_table;
use fbstats::model::CompetitionType;
use fbstats::parse::{parse_match_log_table, parse_stat_table};
use scraper::Html;

#[test]
fn locates_table_in_live_dom() {
    let doc = Html::parse_document(
        r#"<html><body>
        <table id="stats_standard_dom_lg"><tbody>
        <tr><th data-stat="season">2024-2025</th><td data-stat="comp">Premier League</td><td data-stat="games">30</td></tr>
        </tbody></table>
        </body></html>"#,
    );

    let table = locate_table(&doc, "stats_standard_dom_lg").expect("table must be found");
    let rows = parse_stat_table(&table, Some(CompetitionType::League));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].season, "2024-2025");
    assert_eq!(rows[0].games, Some(30));
}

#[test]
fn locates_table_embedded_in_comment() {
    let doc = Html::parse_document(
        r#"<html><body>
        <div id="all_stats_keeper">
        <!--
        <table id="stats_keeper_dom_lg"><tbody>
        <tr><th data-stat="season">2024-2025</th><td data-stat="comp">Premier League</td><td data-stat="games">38</td><td data-stat="gk_saves">101</td></tr>
        </tbody></table>
        -->
        </div>
        </body></html>"#,
    );

    let table = locate_table(&doc, "stats_keeper_dom_lg").expect("commented table must be found");
    let rows = parse_stat_table(&table, Some(CompetitionType::League));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].saves, Some(101));
}

#[test]
fn missing_table_is_none() {
    let doc = Html::parse_document("<html><body><p>no tables here</p></body></html>");
    assert!(locate_table(&doc, "stats_standard_dom_lg").is_none());
}

#[test]
fn prefers_link_text_over_cell_annotations() {
    let doc = Html::parse_document(
        r##"<table id="t"><tbody>
        <tr><th data-stat="season"><a href="#">2024-2025</a> ✦</th>
        <td data-stat="comp"><a href="#">Premier League</a> (1st)</td>
        <td data-stat="games">30</td></tr>
        </tbody></table>"##,
    );

    let table = locate_table(&doc, "t").expect("table must be found");
    let rows = parse_stat_table(&table, None);
    assert_eq!(rows[0].season, "2024-2025");
    assert_eq!(rows[0].competition, "Premier League");
}

#[test]
fn blank_numeric_cells_stay_absent() {
    let doc = Html::parse_document(
        r#"<table id="t"><tbody>
        <tr><th data-stat="season">2024-2025</th><td data-stat="comp">La Liga</td>
        <td data-stat="games">12</td><td data-stat="goals">0</td><td data-stat="xg"></td></tr>
        </tbody></table>"#,
    );

    let table = locate_table(&doc, "t").expect("table must be found");
    let rows = parse_stat_table(&table, None);
    assert_eq!(rows[0].goals, Some(0));
    assert_eq!(rows[0].xg, None);
}

#[test]
fn skips_repeated_header_rows_in_body() {
    let doc = Html::parse_document(
        r#"<table id="t"><tbody>
        <tr class="thead"><th data-stat="season">Season</th><td data-stat="comp">Comp</td></tr>
        <tr><th data-stat="season">2023-2024</th><td data-stat="comp">Serie A</td><td data-stat="games">20</td></tr>
        </tbody></table>"#,
    );

    let table = locate_table(&doc, "t").expect("table must be found");
    let rows = parse_stat_table(&table, None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].competition, "Serie A");
}

#[test]
fn thousands_separators_are_stripped() {
    let doc = Html::parse_document(
        r#"<table id="t"><tbody>
        <tr><th data-stat="season">2024-2025</th><td data-stat="comp">Bundesliga</td>
        <td data-stat="games">34</td><td data-stat="minutes">3,060</td></tr>
        </tbody></table>"#,
    );

    let table = locate_table(&doc, "t").expect("table must be found");
    let rows = parse_stat_table(&table, None);
    assert_eq!(rows[0].minutes, Some(3060));
}

#[test]
fn match_log_rows_without_dates_are_dropped() {
    let doc = Html::parse_document(
        r#"<table id="matchlogs_all"><tbody>
        <tr><th data-stat="date">2025-01-15</th><td data-stat="comp">Premier League</td>
        <td data-stat="opponent">Arsenal</td><td data-stat="game_started">Y</td>
        <td data-stat="minutes">90</td><td data-stat="goals">1</td></tr>
        <tr><th data-stat="date">Jan 20</th><td data-stat="comp">Premier League</td>
        <td data-stat="opponent">Chelsea</td><td data-stat="minutes">45</td></tr>
        </tbody></table>"#,
    );

    let table = locate_table(&doc, "matchlogs_all").expect("table must be found");
    let events = parse_match_log_table(&table, "p1");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].opponent, "Arsenal");
    assert!(events[0].started);
    assert_eq!(events[0].minutes, 90);
}

#[test]
fn match_log_defaults_missing_counts_to_zero() {
    let doc = Html::parse_document(
        r#"<table id="matchlogs_all"><tbody>
        <tr><th data-stat="date">2025-02-02</th><td data-stat="comp">FA Cup</td>
        <td data-stat="opponent">Fulham</td><td data-stat="game_started">N</td>
        <td data-stat="minutes">13</td></tr>
        </tbody></table>"#,
    );

    let table = locate_table(&doc, "matchlogs_all").expect("table must be found");
    let events = parse_match_log_table(&table, "p1");
    assert_eq!(events[0].goals, 0);
    assert_eq!(events[0].assists, 0);
    assert!(!events[0].started);
    assert_eq!(events[0].xg, None);
    assert_eq!(events[0].goals_against, None);
}
