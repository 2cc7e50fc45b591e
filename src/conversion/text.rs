use scraper::Html;

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce an HTML fragment to its text content. Entities are decoded by the parser.
pub fn strip_html(fragment: &str) -> String {
    let document = Html::parse_fragment(fragment);
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Normalize extracted free text: markup removed, whitespace collapsed
pub fn clean_text(text: &str) -> String {
    if looks_like_html(text) {
        collapse_whitespace(&strip_html(text))
    } else {
        collapse_whitespace(text)
    }
}

fn looks_like_html(text: &str) -> bool {
    (text.contains('<') && text.contains('>')) || text.contains("&amp;") || text.contains("&nbsp;")
}
