//! Markup stripping and text normalization.
//!
//! The knowledge document is Markdown that may carry inline HTML. Retrieval
//! works on plain text, so structure is removed before chunking.

use regex::Regex;
use std::sync::OnceLock;

fn list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[-*+]|\d+[.)])\s+").expect("list marker pattern"))
}

fn image_or_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("link pattern"))
}

fn emphasis() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\*{1,3}([^*\n]+?)\*{1,3}|\b_{1,2}([^_\n]+?)_{1,2}\b").expect("emphasis pattern")
    })
}

fn inline_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]*)`").expect("inline code pattern"))
}

fn html_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("html tag pattern"))
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s.,!?:\-]").expect("character class pattern"))
}

/// Strip Markdown syntax and HTML tags, leaving one line per text line.
pub fn strip_markup(document: &str) -> String {
    let mut lines = Vec::new();

    for line in document.lines() {
        let trimmed = line.trim();

        // Skip horizontal rules and code fences
        if is_rule(trimmed) || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        let trimmed = trimmed.trim_start_matches('#').trim_start();
        let trimmed = trimmed.trim_start_matches('>').trim_start();
        let trimmed = list_marker().replace(trimmed, "");

        let text = image_or_link().replace_all(&trimmed, "$1");
        let text = emphasis().replace_all(&text, "$1$2");
        let text = inline_code().replace_all(&text, "$1");
        let text = html_tag().replace_all(&text, "");
        let text = decode_entities(&text);

        let text = text.trim();
        if !text.is_empty() {
            lines.push(text.to_string());
        }
    }

    lines.join("\n")
}

/// Normalize text before it is embedded.
///
/// Collapses whitespace and drops everything except word characters,
/// whitespace and basic punctuation.
pub fn clean_text(text: &str) -> String {
    let collapsed = whitespace_run().replace_all(text, " ");
    disallowed_chars()
        .replace_all(&collapsed, "")
        .trim()
        .to_string()
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|marker| compact.chars().all(|c| c == *marker))
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
