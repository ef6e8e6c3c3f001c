//! Closing-hook heuristics shared by the blacklist builder and the critic.

use novelmill_core::text::{contains_word, paragraphs, tail};

const SIGNAL_WORDS: &[&str] = &[
    "suddenly",
    "but then",
    "footsteps",
    "impossible",
    "cannot be",
    "can't be",
    "who",
    "shadow",
    "blood",
    "scream",
    "message",
    "realized",
    "truth",
    "behind him",
    "behind her",
    "trap",
    "tomorrow",
    "not alone",
    "door",
];

const TECHNIQUES: &[(&str, &[&str])] = &[
    ("threat", &["kill", "die", "death", "blood", "danger", "trap", "hunt", "blade"]),
    ("reveal", &["truth", "realized", "secret", "identity", "was actually", "all along"]),
    ("arrival", &["footsteps", "appeared", "arrived", "stepped in", "door opened", "knock"]),
    ("deadline", &["tomorrow", "dawn", "days left", "until the", "before the"]),
];

/// Whether the closing `scan_chars` of `prose` carry any open-tension signal.
#[must_use]
pub fn has_hook_signal(prose: &str, scan_chars: usize) -> bool {
    let ending = tail(prose.trim_end(), scan_chars);
    if ending.contains('?') || ending.contains('…') || ending.contains("...") || ending.ends_with('—') {
        return true;
    }
    SIGNAL_WORDS.iter().any(|w| contains_word(ending, w))
}

/// Label for the technique the chapter's final paragraph ends on.
#[must_use]
pub fn infer_hook_technique(prose: &str) -> &'static str {
    let Some(last) = paragraphs(prose).last().copied() else {
        return "none";
    };
    if last.trim_end().ends_with('?') {
        return "question";
    }
    for (label, words) in TECHNIQUES {
        if words.iter().any(|w| contains_word(last, w)) {
            return label;
        }
    }
    if last.trim_end().ends_with('—') || last.trim_end().ends_with("...") {
        return "cut-off";
    }
    "quiet"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_signal_only_looks_at_the_tail() {
        let opening = "Who knocked? ".repeat(5);
        let calm = "They ate rice and went to sleep. ".repeat(30);
        let prose = format!("{opening}{calm}");
        assert!(!has_hook_signal(&prose, 500));
        assert!(has_hook_signal(&format!("{prose} Then the door burst open."), 500));
        assert!(has_hook_signal("Was it over?", 500));
    }

    #[test]
    fn test_infer_hook_technique() {
        assert_eq!(infer_hook_technique("Calm.\n\nWho sent the letter?"), "question");
        assert_eq!(infer_hook_technique("Calm.\n\nThe elder realized the truth."), "reveal");
        assert_eq!(infer_hook_technique("Calm.\n\nFootsteps stopped outside."), "arrival");
        assert_eq!(infer_hook_technique("Calm.\n\nThey would kill him at noon."), "threat");
        assert_eq!(infer_hook_technique("He slept well."), "quiet");
        assert_eq!(infer_hook_technique(""), "none");
    }
}
