use serde::{Deserialize, Serialize};

use crate::project::arc_bounds;

/// Brief for a single chapter inside an arc plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChapterBrief {
    pub chapter: u32,
    pub brief: String,
}

/// Thematic plan for a fixed-size block of chapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArcPlan {
    pub project_id: String,
    pub arc_index: u32,
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub theme: String,
    pub goal: String,
    pub briefs: Vec<ChapterBrief>,
    /// Threads that must be advanced or paid off within this arc.
    pub thread_obligations: Vec<String>,
}

impl ArcPlan {
    #[must_use]
    pub fn new(project_id: impl Into<String>, arc_index: u32) -> Self {
        let (start_chapter, end_chapter) = arc_bounds(arc_index);
        Self {
            project_id: project_id.into(),
            arc_index,
            start_chapter,
            end_chapter,
            theme: String::new(),
            goal: String::new(),
            briefs: Vec::new(),
            thread_obligations: Vec::new(),
        }
    }

    #[must_use]
    pub fn brief_for(&self, chapter: u32) -> Option<&str> {
        self.briefs.iter().find(|b| b.chapter == chapter).map(|b| b.brief.as_str())
    }

    #[must_use]
    pub const fn contains(&self, chapter: u32) -> bool {
        chapter >= self.start_chapter && chapter <= self.end_chapter
    }
}
