//! Shared write/read contract of the memory trackers.

use async_trait::async_trait;
use novelmill_core::{Chapter, Outline, Project};

use crate::error::TrackerError;

/// A chapter that has just been committed, as seen by the trackers.
#[derive(Debug, Clone)]
pub struct CommittedChapter {
    pub project_id: String,
    pub protagonist: String,
    pub number: u32,
    pub title: String,
    pub body: String,
    pub outline: Option<Outline>,
    /// Distinct scene participants, protagonist first.
    pub cast: Vec<String>,
    pub terminal_arc: bool,
}

impl CommittedChapter {
    #[must_use]
    pub fn new(project: &Project, chapter: &Chapter) -> Self {
        let mut cast = vec![project.protagonist.clone()];
        if let Some(outline) = &chapter.outline {
            for name in outline.cast() {
                if !cast.iter().any(|c| c.eq_ignore_ascii_case(&name)) {
                    cast.push(name);
                }
            }
        }
        Self {
            project_id: project.id.clone(),
            protagonist: project.protagonist.clone(),
            number: chapter.number,
            title: chapter.title.clone(),
            body: chapter.body.clone(),
            outline: chapter.outline.clone(),
            cast,
            terminal_arc: project.is_terminal_arc(chapter.number),
        }
    }
}

/// What the next chapter is about, for read paths that rank by relevance.
#[derive(Debug, Clone, Copy)]
pub struct FragmentQuery<'a> {
    pub project: &'a Project,
    /// Chapter about to be generated.
    pub chapter: u32,
    /// Characters expected on stage.
    pub cast: &'a [String],
}

/// One slice of story state with a post-commit write path and a prompt read path.
#[async_trait]
pub trait MemoryTracker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Update state from a committed chapter. Failures never block the commit.
    async fn on_chapter_committed(&self, chapter: &CommittedChapter) -> Result<(), TrackerError>;

    /// Formatted fragment for the next prompt, or `None` when nothing is relevant.
    async fn context_fragment(
        &self,
        query: &FragmentQuery<'_>,
    ) -> Result<Option<String>, TrackerError>;
}
