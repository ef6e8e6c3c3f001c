//! ProjectStore implementation for PgStorage.

use super::*;

use crate::traits::ProjectStore;
use async_trait::async_trait;
use novelmill_core::Project;

const PROJECT_COLUMNS: &str = "id, title, genre, vision, story_bible, protagonist, \
                               planned_chapters, target_words, cursor, created_at";

fn row_to_project(row: &PgRow) -> Result<Project, StorageError> {
    Ok(Project {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        genre: row.try_get("genre")?,
        vision: row.try_get("vision")?,
        story_bible: row.try_get("story_bible")?,
        protagonist: row.try_get("protagonist")?,
        planned_chapters: get_u32(row, "planned_chapters")?,
        target_words: get_u32(row, "target_words")?,
        cursor: get_u32(row, "cursor")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ProjectStore for PgStorage {
    async fn save_project(&self, project: &Project) -> Result<(), StorageError> {
        sqlx::query(&format!(
            "INSERT INTO projects ({PROJECT_COLUMNS})
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
             ON CONFLICT (id) DO UPDATE SET
               title = EXCLUDED.title, genre = EXCLUDED.genre, vision = EXCLUDED.vision,
               story_bible = EXCLUDED.story_bible, protagonist = EXCLUDED.protagonist,
               planned_chapters = EXCLUDED.planned_chapters,
               target_words = EXCLUDED.target_words, cursor = EXCLUDED.cursor"
        ))
        .bind(&project.id)
        .bind(&project.title)
        .bind(&project.genre)
        .bind(&project.vision)
        .bind(&project.story_bible)
        .bind(&project.protagonist)
        .bind(to_db_int(project.planned_chapters))
        .bind(to_db_int(project.target_words))
        .bind(to_db_int(project.cursor))
        .bind(project.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, StorageError> {
        let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_project(&r)).transpose()
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        let rows =
            sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at"))
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_project).collect()
    }

    async fn set_cursor(&self, project_id: &str, cursor: u32) -> Result<(), StorageError> {
        let affected = sqlx::query("UPDATE projects SET cursor = $1 WHERE id = $2")
            .bind(to_db_int(cursor))
            .bind(project_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(StorageError::NotFound { entity: "project", id: project_id.to_owned() });
        }
        Ok(())
    }
}
