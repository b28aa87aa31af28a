use scraper::{Html, Node, Selector};
use tracing::debug;

/// Finds a statistics table by id. The live DOM is searched first; when the
/// table is absent there, comment nodes are scanned for one whose body
/// mentions the id and that body is re-parsed as HTML. The source site
/// renders many tables only inside comments, so every caller goes through
/// this two-phase search.
///
/// Returns an owned fragment holding just the table, or `None` when no
/// table with that id exists anywhere in the document. A missing table is
/// "no data for this category", never an error.
pub fn locate_table(doc: &Html, table_id: &str) -> Option<Html> {
    let selector = table_selector(table_id)?;

    if let Some(table) = doc.select(&selector).next() {
        return Some(Html::parse_fragment(&table.html()));
    }

    for node in doc.tree.nodes() {
        let Node::Comment(comment) = node.value() else {
            continue;
        };
        let text: &str = comment;
        if !text.contains(table_id) {
            continue;
        }

        let fragment = Html::parse_fragment(text);
        if let Some(table) = fragment.select(&selector).next() {
            debug!(table_id, "table found inside html comment");
            return Some(Html::parse_fragment(&table.html()));
        }
    }

    None
}

fn table_selector(table_id: &str) -> Option<Selector> {
    Selector::parse(&format!(r#"table[id="{table_id}"]"#)).ok()
}
