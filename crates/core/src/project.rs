use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ARC_SIZE;

/// One serialized narrative and its persisted chapter cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub genre: String,
    /// Global story outline / authorial vision.
    pub vision: String,
    /// Fixed world rules, power system and cast notes.
    pub story_bible: String,
    pub protagonist: String,
    /// Planned final chapter; the arc containing it is the terminal arc.
    pub planned_chapters: u32,
    pub target_words: u32,
    /// Highest chapter number the orchestrator considers committed in sequence.
    pub cursor: u32,
    pub created_at: DateTime<Utc>,
}

impl Project {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, protagonist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            genre: String::new(),
            vision: String::new(),
            story_bible: String::new(),
            protagonist: protagonist.into(),
            planned_chapters: 400,
            target_words: 2800,
            cursor: 0,
            created_at: Utc::now(),
        }
    }

    /// Whether `chapter` falls in the arc that contains the planned last chapter.
    #[must_use]
    pub fn is_terminal_arc(&self, chapter: u32) -> bool {
        self.planned_chapters > 0 && arc_index(chapter) >= arc_index(self.planned_chapters)
    }
}

/// Zero-based arc index for a one-based chapter number.
#[must_use]
pub const fn arc_index(chapter: u32) -> u32 {
    chapter.saturating_sub(1) / ARC_SIZE
}

/// Inclusive chapter bounds of an arc.
#[must_use]
pub const fn arc_bounds(arc: u32) -> (u32, u32) {
    let start = arc * ARC_SIZE + 1;
    (start, start + ARC_SIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_index_and_bounds() {
        assert_eq!(arc_index(1), 0);
        assert_eq!(arc_index(20), 0);
        assert_eq!(arc_index(21), 1);
        assert_eq!(arc_bounds(1), (21, 40));
    }

    #[test]
    fn test_terminal_arc() {
        let mut project = Project::new("p", "Title", "Lin");
        project.planned_chapters = 100;
        assert!(!project.is_terminal_arc(80));
        assert!(project.is_terminal_arc(81));
        assert!(project.is_terminal_arc(100));
    }
}
