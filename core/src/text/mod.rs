// Text handling ahead of synthesis: long-text splitting and cleanup

pub mod processor;
pub mod splitter;

pub use processor::{estimate_speech_duration, extract_speech_text, normalize_text};
pub use splitter::{split_long_text, TextSplitter, DEFAULT_MAX_LENGTH};
