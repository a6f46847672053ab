//! Text cleanup before synthesis.

use regex::Regex;
use std::sync::OnceLock;

// Compiled once; a pattern that fails to compile disables its step.
fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn replace_all(text: String, cell: &'static OnceLock<Option<Regex>>, pattern: &str, rep: &str) -> String {
    match cached(cell, pattern) {
        Some(re) => re.replace_all(&text, rep).into_owned(),
        None => text,
    }
}

/// Collapse whitespace and repeated sentence punctuation.
pub fn normalize_text(text: &str) -> String {
    static WHITESPACE: OnceLock<Option<Regex>> = OnceLock::new();
    static REPEATS: [OnceLock<Option<Regex>>; 6] = [
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
    ];
    const PUNCT: [(&str, &str); 6] = [
        ("。{2,}", "。"),
        ("！{2,}", "！"),
        ("？{2,}", "？"),
        (r"\.{2,}", "."),
        ("!{2,}", "!"),
        (r"\?{2,}", "?"),
    ];

    if text.trim().is_empty() {
        return String::new();
    }

    let mut out = replace_all(text.trim().to_string(), &WHITESPACE, r"\s+", " ");
    for (cell, (pattern, rep)) in REPEATS.iter().zip(PUNCT) {
        out = replace_all(out, cell, pattern, rep);
    }
    out
}

/// Strip content that reads badly aloud: URLs, e-mail addresses, HTML tags and
/// markdown markup. The result is normalized.
pub fn extract_speech_text(text: &str) -> String {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    static HTML: OnceLock<Option<Regex>> = OnceLock::new();
    static BOLD: OnceLock<Option<Regex>> = OnceLock::new();
    static ITALIC: OnceLock<Option<Regex>> = OnceLock::new();
    static CODE: OnceLock<Option<Regex>> = OnceLock::new();
    static SYMBOLS: OnceLock<Option<Regex>> = OnceLock::new();

    let mut out = text.to_string();
    out = replace_all(out, &URL, r"https?://\S+", "");
    out = replace_all(out, &EMAIL, r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}", "");
    out = replace_all(out, &HTML, r"<[^>]+>", "");
    out = replace_all(out, &BOLD, r"\*\*(.*?)\*\*", "$1");
    out = replace_all(out, &ITALIC, r"\*(.*?)\*", "$1");
    out = replace_all(out, &CODE, r"`(.*?)`", "$1");
    out = replace_all(out, &SYMBOLS, r"[#*_`~\[\]{}]", "");
    normalize_text(&out)
}

/// Rough spoken duration in seconds: CJK-style characters at 400 per minute
/// plus English words at 150 per minute, scaled by speed. Never below one
/// second.
pub fn estimate_speech_duration(text: &str, speed: f64) -> f64 {
    let cjk_chars = text
        .chars()
        .filter(|c| !c.is_ascii_alphabetic() && !c.is_whitespace())
        .count();
    let english_words = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .count();

    let minutes = cjk_chars as f64 / 400.0 + english_words as f64 / 150.0;
    let speed = if speed > 0.0 { speed } else { 1.0 };
    (minutes * 60.0 / speed).max(1.0)
}
