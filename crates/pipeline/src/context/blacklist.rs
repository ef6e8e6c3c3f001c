//! Anti-repetition lists built from recent chapters.

use std::fmt::Write as _;

use novelmill_core::Chapter;
use novelmill_core::text::{opening_sentence, truncate};

use crate::hooks::infer_hook_technique;

/// Titles, openings and hook techniques the next chapter must not reuse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    pub titles: Vec<String>,
    pub openings: Vec<String>,
    pub hook_techniques: Vec<String>,
}

impl Blacklist {
    /// Build from chapters in ascending order.
    #[must_use]
    pub fn from_chapters(chapters: &[Chapter]) -> Self {
        let mut list = Self::default();
        for chapter in chapters {
            if !chapter.title.trim().is_empty() {
                list.titles.push(chapter.title.trim().to_owned());
            }
            if let Some(opening) = opening_sentence(&chapter.body) {
                list.openings.push(truncate(opening, 200).to_owned());
            }
            let technique = chapter
                .outline
                .as_ref()
                .map(|o| o.hook_technique.trim())
                .filter(|t| !t.is_empty())
                .map_or_else(|| infer_hook_technique(&chapter.body).to_owned(), str::to_lowercase);
            if technique != "none" && !list.hook_techniques.contains(&technique) {
                list.hook_techniques.push(technique);
            }
        }
        list
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty() && self.openings.is_empty() && self.hook_techniques.is_empty()
    }

    /// Whether `title` repeats a recent one, ignoring case.
    #[must_use]
    pub fn repeats_title(&self, title: &str) -> bool {
        let title = title.trim();
        !title.is_empty() && self.titles.iter().any(|t| t.eq_ignore_ascii_case(title))
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.titles.is_empty() {
            let _ = writeln!(out, "Recent titles (choose a different one): {}", self.titles.join(" | "));
        }
        if !self.openings.is_empty() {
            out.push_str("Recent opening sentences (do not open the same way):\n");
            for opening in &self.openings {
                let _ = writeln!(out, "- {opening}");
            }
        }
        if !self.hook_techniques.is_empty() {
            let _ = writeln!(
                out,
                "Recent hook techniques (end on a different one): {}",
                self.hook_techniques.join(", ")
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use novelmill_core::Outline;

    use super::*;

    #[test]
    fn test_from_chapters_collects_all_three_lists() {
        let mut first = Chapter::new("p", 1, "The Gate", "Rain fell on the gate. Lin waited.\n\nWho was coming?");
        first.outline = None;
        let mut second = Chapter::new("p", 2, "Ashes", "Morning came. The sect woke.\n\nHe slept.");
        second.outline =
            Some(Outline { hook_technique: "Reveal".to_owned(), ..Outline::default() });

        let list = Blacklist::from_chapters(&[first, second]);
        assert_eq!(list.titles, vec!["The Gate", "Ashes"]);
        assert_eq!(list.openings, vec!["Rain fell on the gate.", "Morning came."]);
        assert_eq!(list.hook_techniques, vec!["question", "reveal"]);
        assert!(list.repeats_title("the gate"));
        assert!(list.render().contains("question, reveal"));
    }
}
