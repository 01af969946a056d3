//! Greedy line-accumulation splitter for hierarchical summarization.

/// Floor for the per-chunk character budget.
const MIN_CHUNK_CHARS: usize = 1000;

/// Character budget for one summary chunk given a model's token ceiling.
///
/// Keeps a 25% safety margin below the ceiling, never less than 1000.
pub fn summary_chunk_budget(token_ceiling: usize) -> usize {
    MIN_CHUNK_CHARS.max(token_ceiling * 3 / 4)
}

/// Group whole lines into chunks of at most `max_chars` characters.
///
/// Lines are accumulated (each counted with its newline) until the next one
/// would overflow the budget; then the chunk is flushed. A line that alone
/// reaches the budget is hard-split into `max_chars`-sized pieces.
pub fn split_lines(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for line in text.lines() {
        let line_len = line.chars().count() + 1;

        if current_len + line_len > max_chars {
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current.clear();
                current_len = 0;
            }

            if line_len >= max_chars {
                chunks.extend(hard_split(line, max_chars));
                continue;
            }
        }

        current.push(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
}

fn hard_split(line: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_newlines(s: &str) -> String {
        s.chars().filter(|c| *c != '\n').collect()
    }

    #[test]
    fn test_budget_has_floor_and_margin() {
        assert_eq!(summary_chunk_budget(100), 1000);
        assert_eq!(summary_chunk_budget(100_000), 75_000);
        assert_eq!(summary_chunk_budget(12_000), 9_000);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_lines("one\ntwo\nthree", 100);
        assert_eq!(chunks, vec!["one\ntwo\nthree".to_string()]);
    }

    #[test]
    fn test_flushes_before_overflow() {
        // Each line costs 5 chars with its newline.
        let chunks = split_lines("aaaa\nbbbb\ncccc\ndddd", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc\ndddd"]);
    }

    #[test]
    fn test_long_line_is_hard_split() {
        let long = "x".repeat(25);
        let text = format!("ab\n{}\ncd", long);
        let chunks = split_lines(&text, 10);

        assert_eq!(chunks[0], "ab");
        assert_eq!(chunks[1], "x".repeat(10));
        assert_eq!(chunks[2], "x".repeat(10));
        assert_eq!(chunks[3], "x".repeat(5));
        assert_eq!(chunks[4], "cd");
    }

    #[test]
    fn test_never_drops_characters() {
        let mut text = String::new();
        for i in 0..400 {
            text.push_str(&format!("line {} {}\n", i, "内容".repeat(i % 37)));
        }
        text.push_str(&"z".repeat(3000));

        let chunks = split_lines(&text, 1000);
        let rebuilt: String = chunks.iter().map(|c| without_newlines(c)).collect();

        assert_eq!(rebuilt, without_newlines(&text));
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(split_lines("", 1000).is_empty());
    }
}
