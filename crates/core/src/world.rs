use serde::{Deserialize, Serialize};

/// A location in the story bible.
///
/// Unexplored locations must not be referenced in generated prose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationBible {
    pub project_id: String,
    pub name: String,
    pub description: String,
    /// Inclusive arc range in which the location is relevant.
    pub arc_start: u32,
    pub arc_end: u32,
    pub explored: bool,
    pub explored_chapter: Option<u32>,
    pub mysteries: Vec<String>,
}

impl LocationBible {
    #[must_use]
    pub const fn relevant_to_arc(&self, arc: u32) -> bool {
        arc >= self.arc_start && arc <= self.arc_end
    }
}
