//! Plain-text cleanup for assistant answers.

use std::sync::LazyLock;

use regex::Regex;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#+\s*").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]\((.*?)\)").unwrap());
static CITATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"【.*?†.*?】").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Removes heading markers, unwraps bold text and replaces links with their target.
pub fn strip_markdown(text: &str) -> String {
    let text = HEADING.replace_all(text, "");
    let text = BOLD.replace_all(&text, "$1");
    LINK.replace_all(&text, "$1").into_owned()
}

/// Drops `【4:0†source】` style reference markers.
pub fn strip_citations(text: &str) -> String {
    CITATION.replace_all(text, "").into_owned()
}

/// Full cleanup applied to a completed run's answer: markdown, citations,
/// then whitespace collapsed to single spaces and trimmed.
pub fn normalize_answer(raw: &str) -> String {
    let text = strip_markdown(raw);
    let text = strip_citations(&text);
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
