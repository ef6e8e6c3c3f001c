//! Text helpers shared by the pipeline and trackers.

/// Truncates a string to the given maximum byte length at a char boundary.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        s.get(..end).unwrap_or("")
    }
}

/// Returns the last `max_len` bytes of `s`, moved forward to a char boundary.
#[must_use]
pub fn tail(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut start = s.len() - max_len;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    s.get(start..).unwrap_or("")
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32, 0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF)
}

/// Counts words by whitespace; CJK ideographs count one word each.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .map(|token| {
            let cjk = token.chars().filter(|c| is_cjk(*c)).count();
            if cjk == 0 {
                1
            } else {
                let rest = token.chars().any(|c| !is_cjk(c) && c.is_alphanumeric());
                cjk + usize::from(rest)
            }
        })
        .sum()
}

/// Splits prose into sentences on terminal punctuation.
#[must_use]
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?' | '。' | '！' | '？' | '\n') {
            let end = idx + ch.len_utf8();
            if let Some(sentence) = text.get(start..end) {
                let trimmed = sentence.trim();
                if trimmed.chars().any(char::is_alphanumeric) {
                    out.push(trimmed);
                }
            }
            start = end;
        }
    }
    if let Some(rest) = text.get(start..) {
        let trimmed = rest.trim();
        if trimmed.chars().any(char::is_alphanumeric) {
            out.push(trimmed);
        }
    }
    out
}

/// First sentence of the first non-empty paragraph.
#[must_use]
pub fn opening_sentence(text: &str) -> Option<&str> {
    sentences(text).into_iter().next()
}

/// Splits prose into non-empty paragraphs.
#[must_use]
pub fn paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Case-insensitive whole-phrase containment.
#[must_use]
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Case-insensitive whole-word (or whole-phrase) containment.
///
/// A match must not be flanked by alphanumeric characters, so "war" does not
/// match "toward".
#[must_use]
pub fn contains_word(haystack: &str, word: &str) -> bool {
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        return false;
    }
    let hay = haystack.to_lowercase();
    let mut from = 0;
    while let Some(pos) = hay.get(from..).and_then(|rest| rest.find(&word)) {
        let start = from + pos;
        let end = start + word.len();
        let before = hay.get(..start).and_then(|s| s.chars().next_back());
        let after = hay.get(end..).and_then(|s| s.chars().next());
        if !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric) {
            return true;
        }
        from = end;
    }
    false
}
