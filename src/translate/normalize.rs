//! Input normalization applied before comparing, caching or sending text.

use std::sync::OnceLock;

use regex::Regex;

fn whitespace_runs() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern compiles"))
}

/// Trim and collapse every internal whitespace run (spaces, tabs, newlines) to a
/// single space.
pub fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    whitespace_runs().replace_all(trimmed, " ").into_owned()
}
