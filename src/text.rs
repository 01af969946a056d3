//! Subtitle cleanup and byte budgeting for extracted text.

use regex::Regex;
use std::sync::LazyLock;

/// Byte ceiling applied to every piece of extracted content.
pub const MAX_CONTENT_BYTES: usize = 500_000;

static CUE_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,4}$").expect("Invalid regex"));
static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid regex"));

/// Remove VTT/SRT headers, cue numbers, cue timings and markup tags.
///
/// Blank lines are dropped and every remaining line is trimmed.
pub fn clean_subtitle_text(text: &str) -> String {
    let mut cleaned = Vec::new();

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if stripped.starts_with("WEBVTT") || stripped.starts_with("NOTE") {
            continue;
        }
        if stripped.contains("-->") {
            continue;
        }
        if CUE_INDEX.is_match(stripped) {
            continue;
        }

        let without_tags = MARKUP_TAG.replace_all(stripped, "");
        let without_tags = without_tags.trim();
        if !without_tags.is_empty() {
            cleaned.push(without_tags.to_string());
        }
    }

    cleaned.join("\n")
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a character.
pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Clean `text` and cap it at `max_bytes`.
pub fn sanitize_for_storage(text: &str, max_bytes: usize) -> String {
    let cleaned = clean_subtitle_text(text);
    truncate_utf8(&cleaned, max_bytes).to_string()
}

/// Clean `text` and cap it at [`MAX_CONTENT_BYTES`].
pub fn sanitize(text: &str) -> String {
    sanitize_for_storage(text, MAX_CONTENT_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VTT: &str = "WEBVTT\nKind: captions\nLanguage: en\n\nNOTE generated\n\n1\n00:00:00.000 --> 00:00:02.000\n<c>Hello</c> <00:00:01.000>world\n\n2\n00:00:02.000 --> 00:00:04.000\nSecond   line  \n\n";

    #[test]
    fn test_clean_vtt() {
        let cleaned = clean_subtitle_text(VTT);
        assert_eq!(cleaned, "Kind: captions\nLanguage: en\nHello world\nSecond   line");
    }

    #[test]
    fn test_clean_srt() {
        let srt = "1\r\n00:00:01,000 --> 00:00:02,000\r\nFirst <i>cue</i>\r\n\r\n2\r\n00:00:02,500 --> 00:00:03,000\r\nSecond cue\r\n";
        assert_eq!(clean_subtitle_text(srt), "First cue\nSecond cue");
    }

    #[test]
    fn test_long_numbers_are_kept() {
        // Only 1-4 digit lines are cue indices.
        assert_eq!(clean_subtitle_text("12345\n2024"), "12345");
    }

    #[test]
    fn test_tag_only_line_dropped() {
        assert_eq!(clean_subtitle_text("<b></b>\ntext"), "text");
    }

    #[test]
    fn test_truncate_never_splits_characters() {
        let text = "ab中文";
        // "中" occupies bytes 2..5
        assert_eq!(truncate_utf8(text, 3), "ab");
        assert_eq!(truncate_utf8(text, 5), "ab中");
        assert_eq!(truncate_utf8(text, 100), text);
    }

    #[test]
    fn test_sanitize_caps_bytes() {
        let long = "字".repeat(10);
        let out = sanitize_for_storage(&long, 7);
        assert_eq!(out, "字字");
        assert!(out.len() <= 7);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("\n\n  \n"), "");
    }
}
