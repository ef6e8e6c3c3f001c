//! ChapterStore and SummaryStore implementations for PgStorage.

use super::*;

use crate::traits::{ChapterStore, SummaryStore};
use async_trait::async_trait;
use novelmill_core::{Chapter, ChapterSummary, Synopsis};

const CHAPTER_COLUMNS: &str =
    "project_id, number, title, body, word_count, outline, critique, created_at";
const SUMMARY_COLUMNS: &str =
    "project_id, number, summary, protagonist_state, unresolved_hook, created_at";

fn row_to_chapter(row: &PgRow) -> Result<Chapter, StorageError> {
    Ok(Chapter {
        project_id: row.try_get("project_id")?,
        number: get_u32(row, "number")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        word_count: get_u32(row, "word_count")?,
        outline: from_optional_doc(row, "outline", "chapter outline")?,
        critique: from_optional_doc(row, "critique", "chapter critique")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_summary(row: &PgRow) -> Result<ChapterSummary, StorageError> {
    Ok(ChapterSummary {
        project_id: row.try_get("project_id")?,
        number: get_u32(row, "number")?,
        summary: row.try_get("summary")?,
        protagonist_state: row.try_get("protagonist_state")?,
        unresolved_hook: row.try_get("unresolved_hook")?,
        created_at: row.try_get("created_at")?,
    })
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl ChapterStore for PgStorage {
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        let outline = chapter.outline.as_ref().map(to_doc).transpose()?;
        let critique = chapter.critique.as_ref().map(to_doc).transpose()?;
        sqlx::query(&format!(
            "INSERT INTO chapters ({CHAPTER_COLUMNS})
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
             ON CONFLICT (project_id, number) DO UPDATE SET
               title = EXCLUDED.title, body = EXCLUDED.body,
               word_count = EXCLUDED.word_count, outline = EXCLUDED.outline,
               critique = EXCLUDED.critique, created_at = EXCLUDED.created_at"
        ))
        .bind(&chapter.project_id)
        .bind(to_db_int(chapter.number))
        .bind(&chapter.title)
        .bind(&chapter.body)
        .bind(to_db_int(chapter.word_count))
        .bind(outline)
        .bind(critique)
        .bind(chapter.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_chapter(
        &self,
        project_id: &str,
        number: u32,
    ) -> Result<Option<Chapter>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE project_id = $1 AND number = $2"
        ))
        .bind(project_id)
        .bind(to_db_int(number))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_chapter(&r)).transpose()
    }

    async fn recent_chapters(
        &self,
        project_id: &str,
        before: u32,
        limit: usize,
    ) -> Result<Vec<Chapter>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM (
                SELECT {CHAPTER_COLUMNS} FROM chapters
                 WHERE project_id = $1 AND number < $2
                 ORDER BY number DESC LIMIT $3
             ) recent ORDER BY number ASC"
        ))
        .bind(project_id)
        .bind(to_db_int(before))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_chapter).collect()
    }

    async fn chapter_numbers(&self, project_id: &str) -> Result<Vec<u32>, StorageError> {
        let numbers: Vec<i32> = sqlx::query_scalar(
            "SELECT number FROM chapters WHERE project_id = $1 ORDER BY number",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(numbers.into_iter().filter_map(|n| u32::try_from(n).ok()).collect())
    }

    async fn count_chapters(&self, project_id: &str) -> Result<usize, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl SummaryStore for PgStorage {
    async fn upsert_chapter_summary(&self, summary: &ChapterSummary) -> Result<(), StorageError> {
        sqlx::query(&format!(
            "INSERT INTO chapter_summaries ({SUMMARY_COLUMNS})
             VALUES ($1,$2,$3,$4,$5,$6)
             ON CONFLICT (project_id, number) DO UPDATE SET
               summary = EXCLUDED.summary, protagonist_state = EXCLUDED.protagonist_state,
               unresolved_hook = EXCLUDED.unresolved_hook, created_at = EXCLUDED.created_at"
        ))
        .bind(&summary.project_id)
        .bind(to_db_int(summary.number))
        .bind(&summary.summary)
        .bind(&summary.protagonist_state)
        .bind(&summary.unresolved_hook)
        .bind(summary.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_chapter_summary(
        &self,
        project_id: &str,
        number: u32,
    ) -> Result<Option<ChapterSummary>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM chapter_summaries WHERE project_id = $1 AND number = $2"
        ))
        .bind(project_id)
        .bind(to_db_int(number))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_summary(&r)).transpose()
    }

    async fn recent_summaries(
        &self,
        project_id: &str,
        before: u32,
        limit: usize,
    ) -> Result<Vec<ChapterSummary>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM (
                SELECT {SUMMARY_COLUMNS} FROM chapter_summaries
                 WHERE project_id = $1 AND number < $2
                 ORDER BY number DESC LIMIT $3
             ) recent ORDER BY number ASC"
        ))
        .bind(project_id)
        .bind(to_db_int(before))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_summary).collect()
    }

    async fn get_synopsis(&self, project_id: &str) -> Result<Option<Synopsis>, StorageError> {
        let row = sqlx::query(
            "SELECT project_id, summary, protagonist_state, allies, enemies, open_threads,
                    as_of_chapter
               FROM synopses WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Synopsis {
            project_id: row.try_get("project_id")?,
            summary: row.try_get("summary")?,
            protagonist_state: row.try_get("protagonist_state")?,
            allies: from_doc(&row, "allies", "synopsis allies")?,
            enemies: from_doc(&row, "enemies", "synopsis enemies")?,
            open_threads: from_doc(&row, "open_threads", "synopsis threads")?,
            as_of_chapter: get_u32(&row, "as_of_chapter")?,
        }))
    }

    async fn save_synopsis(&self, synopsis: &Synopsis) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO synopses
                (project_id, summary, protagonist_state, allies, enemies, open_threads, as_of_chapter)
             VALUES ($1,$2,$3,$4,$5,$6,$7)
             ON CONFLICT (project_id) DO UPDATE SET
               summary = EXCLUDED.summary, protagonist_state = EXCLUDED.protagonist_state,
               allies = EXCLUDED.allies, enemies = EXCLUDED.enemies,
               open_threads = EXCLUDED.open_threads, as_of_chapter = EXCLUDED.as_of_chapter",
        )
        .bind(&synopsis.project_id)
        .bind(&synopsis.summary)
        .bind(&synopsis.protagonist_state)
        .bind(to_doc(&synopsis.allies)?)
        .bind(to_doc(&synopsis.enemies)?)
        .bind(to_doc(&synopsis.open_threads)?)
        .bind(to_db_int(synopsis.as_of_chapter))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
