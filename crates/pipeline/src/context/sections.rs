//! Prompt sections and priority-ordered trimming.

use std::fmt::Write as _;

use novelmill_core::text::{tail, truncate};

const TRIM_MARKER: &str = "\n[...]";

/// The ten context sections, in prompt (and priority) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Vision,
    Bridge,
    Roster,
    Memory,
    LongRange,
    StoryBible,
    Synopsis,
    RecentChapters,
    ArcPlan,
    Blacklist,
}

impl SectionKind {
    #[must_use]
    pub const fn heading(&self) -> &'static str {
        match *self {
            Self::Vision => "STORY VISION",
            Self::Bridge => "BRIDGE FROM THE PREVIOUS CHAPTER (MANDATORY)",
            Self::Roster => "LIVE CHARACTER STATE",
            Self::Memory => "NARRATIVE MEMORY",
            Self::LongRange => "RELEVANT EARLIER PASSAGES",
            Self::StoryBible => "STORY BIBLE",
            Self::Synopsis => "STORY SO FAR",
            Self::RecentChapters => "RECENT CHAPTERS",
            Self::ArcPlan => "CURRENT ARC",
            Self::Blacklist => "DO NOT REPEAT",
        }
    }

    /// Position in the trim order; `None` for sections that are never trimmed.
    #[must_use]
    pub const fn trim_rank(&self) -> Option<u8> {
        match *self {
            Self::Blacklist => Some(0),
            Self::ArcPlan => Some(1),
            Self::RecentChapters => Some(2),
            Self::Synopsis => Some(3),
            Self::StoryBible => Some(4),
            Self::LongRange => Some(5),
            Self::Memory => Some(6),
            Self::Vision => Some(7),
            Self::Bridge | Self::Roster => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub body: String,
}

impl Section {
    #[must_use]
    pub fn new(kind: SectionKind, body: impl Into<String>) -> Self {
        Self { kind, body: body.into() }
    }

    fn rendered_len(&self) -> usize {
        // "## " + heading + "\n" + body + "\n\n"
        3 + self.kind.heading().len() + 1 + self.body.len() + 2
    }
}

fn render(sections: &[Section]) -> String {
    let mut out = String::with_capacity(sections.iter().map(Section::rendered_len).sum());
    for section in sections {
        let _ = write!(out, "## {}\n{}\n\n", section.kind.heading(), section.body);
    }
    out
}

/// Render `sections` within `budget` bytes, trimming the lowest-priority sections first.
///
/// A section is shortened when that alone recovers the overflow, otherwise it is
/// dropped and the next one is considered. The bridge and roster are never
/// touched, so the result can still exceed `budget` when those two alone do.
/// Returns the rendered text and the kinds that were shortened or dropped.
#[must_use]
pub fn fit_to_budget(mut sections: Vec<Section>, budget: usize) -> (String, Vec<SectionKind>) {
    let mut total: usize = sections.iter().map(Section::rendered_len).sum();
    let mut trimmed = Vec::new();

    let mut order: Vec<SectionKind> =
        sections.iter().map(|s| s.kind).filter(|k| k.trim_rank().is_some()).collect();
    order.sort_by_key(|k| k.trim_rank());

    for kind in order {
        if total <= budget {
            break;
        }
        let overflow = total - budget;
        let Some(pos) = sections.iter().position(|s| s.kind == kind) else {
            continue;
        };
        let Some(section) = sections.get_mut(pos) else {
            continue;
        };
        let before = section.rendered_len();
        let keep = section.body.len().saturating_sub(overflow + TRIM_MARKER.len());
        if keep == 0 {
            sections.remove(pos);
            total -= before;
        } else {
            // Recent prose keeps its newest end; everything else keeps its head.
            let shortened = if kind == SectionKind::RecentChapters {
                format!("{}{}", TRIM_MARKER.trim_start(), tail(&section.body, keep))
            } else {
                format!("{}{TRIM_MARKER}", truncate(&section.body, keep))
            };
            section.body = shortened;
            total = total - before + section.rendered_len();
        }
        trimmed.push(kind);
    }

    if total > budget {
        tracing::debug!(total, budget, "context still over budget after trimming");
    }
    (render(&sections), trimmed)
}
