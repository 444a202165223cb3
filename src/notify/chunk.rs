// src/notify/chunk.rs

/// Split `text` into chunks of at most `limit` characters, on line boundaries.
///
/// - Text within the limit is returned as-is (`""` → `[""]`).
/// - Lines are packed greedily; a line is never split, so a single line
///   longer than `limit` becomes its own oversized chunk.
/// - `chunks.join("\n") == text` always holds.
///
/// Lengths are counted in Unicode scalar values.
pub fn chunk(text: &str, limit: usize) -> Vec<String> {
    if char_len(text) <= limit {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    // Sum of (line length + 1) over `current`.
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let add_len = char_len(line) + 1;
        if !current.is_empty() && current_len + add_len > limit {
            chunks.push(current.join("\n"));
            current.clear();
            current_len = 0;
        }
        current.push(line);
        current_len += add_len;
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(chunk("", 10), vec![""]);
        assert_eq!(chunk("abc\ndef", 7), vec!["abc\ndef"]);
    }

    #[test]
    fn packs_lines_greedily() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(chunk(text, 10), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(chunk(text, 9), vec!["aaaa", "bbbb", "cccc"]);
    }

    #[test]
    fn oversized_line_is_its_own_chunk() {
        let text = "ab\nxxxxxxxxxx\ncd";
        let out = chunk(text, 5);
        assert_eq!(out, vec!["ab", "xxxxxxxxxx", "cd"]);
        assert_eq!(out.join("\n"), text);
    }

    #[test]
    fn leading_long_line_does_not_emit_empty_chunk() {
        let text = "xxxxxxxxxx\nab";
        assert_eq!(chunk(text, 4), vec!["xxxxxxxxxx", "ab"]);
    }

    #[test]
    fn empty_lines_survive() {
        let text = "aaaa\n\n\nbbbb\n";
        let out = chunk(text, 6);
        assert_eq!(out.join("\n"), text);
        assert!(out.iter().all(|c| c.chars().count() <= 6));
    }

    #[test]
    fn counts_chars_not_bytes() {
        let text = "ёёёё\nжжжж";
        assert_eq!(chunk(text, 9), vec![text]);
        assert_eq!(chunk(text, 8), vec!["ёёёё", "жжжж"]);
    }
}
