use async_trait::async_trait;
use novelmill_core::{Chapter, ChapterSummary, Synopsis};

use crate::error::StorageError;

/// Committed chapter operations.
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Insert or replace the chapter keyed by (project, number).
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError>;

    /// Get a chapter by number.
    async fn get_chapter(
        &self,
        project_id: &str,
        number: u32,
    ) -> Result<Option<Chapter>, StorageError>;

    /// Up to `limit` chapters numbered below `before`, in ascending order.
    async fn recent_chapters(
        &self,
        project_id: &str,
        before: u32,
        limit: usize,
    ) -> Result<Vec<Chapter>, StorageError>;

    /// All committed chapter numbers, ascending.
    async fn chapter_numbers(&self, project_id: &str) -> Result<Vec<u32>, StorageError>;

    /// Number of committed chapters.
    async fn count_chapters(&self, project_id: &str) -> Result<usize, StorageError>;
}

/// Chapter summary and rolling synopsis operations.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Insert or replace the summary keyed by (project, number).
    async fn upsert_chapter_summary(&self, summary: &ChapterSummary) -> Result<(), StorageError>;

    /// Get the summary of one chapter.
    async fn get_chapter_summary(
        &self,
        project_id: &str,
        number: u32,
    ) -> Result<Option<ChapterSummary>, StorageError>;

    /// Up to `limit` summaries numbered below `before`, in ascending order.
    async fn recent_summaries(
        &self,
        project_id: &str,
        before: u32,
        limit: usize,
    ) -> Result<Vec<ChapterSummary>, StorageError>;

    /// The live synopsis, if any.
    async fn get_synopsis(&self, project_id: &str) -> Result<Option<Synopsis>, StorageError>;

    /// Supersede the live synopsis.
    async fn save_synopsis(&self, synopsis: &Synopsis) -> Result<(), StorageError>;
}
