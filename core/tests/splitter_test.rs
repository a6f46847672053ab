use tts_mcp_core::text::{extract_speech_text, split_long_text, TextSplitter};

fn assert_bounded(chunks: &[String], max: usize) {
    for chunk in chunks {
        assert!(!chunk.is_empty());
        assert!(
            chunk.chars().count() <= max,
            "chunk of {} chars exceeds {max}: {chunk:?}",
            chunk.chars().count()
        );
        assert_eq!(chunk.trim(), chunk);
    }
}

fn strip_ws(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[test]
fn test_mixed_cjk_and_english_keeps_all_content() {
    let text = "今天天气很好。我们去公园散步吧！The weather is lovely today. \
                Shall we walk in the park? 好的，我马上准备。Great, see you soon."
        .repeat(4);
    let chunks = split_long_text(&text, 60);
    assert!(chunks.len() > 1);
    assert_bounded(&chunks, 60);
    assert_eq!(strip_ws(&chunks.concat()), strip_ws(&text));
}

#[test]
fn test_cjk_limit_counts_characters() {
    let text = "一二三四五六七八九十".repeat(10);
    let chunks = TextSplitter::new(30).split_text(&text);
    assert_bounded(&chunks, 30);
    assert_eq!(chunks.concat(), text);
    assert_eq!(chunks.len(), 4);
}

#[test]
fn test_paragraph_break_preferred_over_sentence() {
    let first = "First paragraph has two sentences. It ends here.";
    let second = "Second paragraph. Also short.";
    let text = format!("{first}\n\n{second}");
    let chunks = split_long_text(&text, 60);
    assert_eq!(chunks, vec![first.to_string(), second.to_string()]);
}

#[test]
fn test_short_text_is_single_trimmed_chunk() {
    assert_eq!(split_long_text("  hello there  ", 100), vec!["hello there"]);
}

#[test]
fn test_markdown_is_reduced_before_speaking() {
    let spoken = extract_speech_text("## Title\n\nSome **bold** text with a [link](https://x.y).");
    assert!(!spoken.contains("##"));
    assert!(!spoken.contains("**"));
    assert!(!spoken.contains("https://"));
    assert!(spoken.contains("bold"));
    assert!(spoken.contains("link"));
}
