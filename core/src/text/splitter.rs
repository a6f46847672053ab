//! Long-text splitting at natural boundaries.
//!
//! The speech provider rejects inputs above a fixed size, so oversized text is
//! cut into ordered chunks. Each cut is searched for inside the first
//! `max_length` characters of the remaining text, preferring (in order)
//! paragraph breaks, sentence endings, line breaks, then commas and spaces.
//! When no boundary qualifies the text is force-cut at `max_length`.
//!
//! Lengths are counted in `char`s, not bytes, so CJK text gets the same limit
//! as ASCII.

use tracing::{info, warn};

/// Sentence terminators, full-width and ASCII, plus colon/semicolon variants.
pub const SENTENCE_ENDINGS: &[&str] = &["。", "！", "？", ".", "!", "?", "：", ":", "；", ";"];

pub const PARAGRAPH_SEPARATORS: &[&str] = &["\n\n", "\r\n\r\n"];

/// Checked in this order; the first delimiter that qualifies wins.
pub const WORD_DELIMITERS: &[&str] = &[", ", "、", " "];

const PARAGRAPH_MIN_RATIO: f64 = 0.5;
const SENTENCE_MIN_RATIO: f64 = 0.3;
const NEWLINE_MIN_RATIO: f64 = 0.3;
const WORD_MIN_RATIO: f64 = 0.5;

/// Provider default: 4096 hard limit with headroom.
pub const DEFAULT_MAX_LENGTH: usize = 4000;

#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    max_length: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl TextSplitter {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Split `text` into trimmed chunks of at most `max_length` chars.
    ///
    /// Text already within the limit comes back as a single trimmed chunk.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        let total = text.chars().count();
        if total <= self.max_length {
            return vec![text.to_string()];
        }

        info!(target: "text_splitter", chars = total, max_length = self.max_length, "Splitting long text");

        let mut chunks = Vec::new();
        let mut remaining = text;

        while !remaining.is_empty() {
            if remaining.chars().count() <= self.max_length {
                chunks.push(remaining.to_string());
                break;
            }

            let split_at = match self.find_split_point(remaining) {
                Some(pos) => pos,
                None => {
                    warn!(target: "text_splitter", at = self.max_length, "Forced text split; no natural boundary found");
                    byte_offset(remaining, self.max_length)
                }
            };

            let chunk = remaining[..split_at].trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }
            remaining = remaining[split_at..].trim();
        }

        info!(target: "text_splitter", chunks = chunks.len(), "Text split complete");
        chunks
    }

    /// Byte offset just past the best boundary, or `None` when the window has
    /// no qualifying boundary.
    fn find_split_point(&self, text: &str) -> Option<usize> {
        let window = &text[..byte_offset(text, self.max_length)];
        let max = self.max_length as f64;
        let qualifies = |byte_pos: usize, ratio: f64| {
            window[..byte_pos].chars().count() as f64 >= max * ratio
        };
        // Latest qualifying occurrence among several separators, cut after it.
        let latest = |separators: &[&str], ratio: f64| {
            separators
                .iter()
                .filter_map(|sep| {
                    window
                        .rfind(sep)
                        .filter(|&pos| qualifies(pos, ratio))
                        .map(|pos| pos + sep.len())
                })
                .max()
        };

        if let Some(pos) = latest(PARAGRAPH_SEPARATORS, PARAGRAPH_MIN_RATIO) {
            return Some(pos);
        }

        if let Some(pos) = latest(SENTENCE_ENDINGS, SENTENCE_MIN_RATIO) {
            return Some(pos);
        }

        if let Some(pos) = window.rfind('\n').filter(|&p| qualifies(p, NEWLINE_MIN_RATIO)) {
            return Some(pos + 1);
        }

        WORD_DELIMITERS.iter().find_map(|delim| {
            window
                .rfind(delim)
                .filter(|&pos| qualifies(pos, WORD_MIN_RATIO))
                .map(|pos| pos + delim.len())
        })
    }
}

/// Byte index of the `chars`-th character, or the string length.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Split long text with a one-off splitter.
pub fn split_long_text(text: &str, max_length: usize) -> Vec<String> {
    TextSplitter::new(max_length).split_text(text)
}
