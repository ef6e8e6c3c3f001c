//! Arc, thread, beat and foreshadowing stores for PgStorage.

use super::*;

use crate::traits::{ArcStore, BeatStore, ForeshadowStore, ThreadStore};
use async_trait::async_trait;
use novelmill_core::{ArcPlan, BeatType, BeatUsage, ForeshadowingHint, PlotThread};

impl PgStorage {
    /// Upsert a JSONB document keyed by (project, text key).
    pub(crate) async fn upsert_text_doc(
        &self,
        table: &str,
        key_column: &str,
        project_id: &str,
        key: &str,
        doc: serde_json::Value,
    ) -> Result<(), StorageError> {
        sqlx::query(&format!(
            "INSERT INTO {table} (project_id, {key_column}, doc, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (project_id, {key_column}) DO UPDATE SET
               doc = EXCLUDED.doc, updated_at = NOW()"
        ))
        .bind(project_id)
        .bind(key)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All documents of a project in a keyed table, ordered by key.
    pub(crate) async fn list_docs<T: DeserializeOwned>(
        &self,
        table: &str,
        key_column: &str,
        project_id: &str,
    ) -> Result<Vec<T>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT doc FROM {table} WHERE project_id = $1 ORDER BY {key_column}"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| from_doc(r, "doc", table)).collect()
    }
}

#[async_trait]
impl ArcStore for PgStorage {
    async fn get_arc_plan(
        &self,
        project_id: &str,
        arc_index: u32,
    ) -> Result<Option<ArcPlan>, StorageError> {
        let row =
            sqlx::query("SELECT doc FROM arc_plans WHERE project_id = $1 AND arc_index = $2")
                .bind(project_id)
                .bind(to_db_int(arc_index))
                .fetch_optional(&self.pool)
                .await?;
        row.map(|r| from_doc(&r, "doc", "arc plan")).transpose()
    }

    async fn save_arc_plan(&self, plan: &ArcPlan) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO arc_plans (project_id, arc_index, doc, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (project_id, arc_index) DO UPDATE SET
               doc = EXCLUDED.doc, updated_at = NOW()",
        )
        .bind(&plan.project_id)
        .bind(to_db_int(plan.arc_index))
        .bind(to_doc(plan)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ThreadStore for PgStorage {
    async fn list_threads(&self, project_id: &str) -> Result<Vec<PlotThread>, StorageError> {
        self.list_docs("plot_threads", "thread_id", project_id).await
    }

    async fn upsert_thread(&self, thread: &PlotThread) -> Result<(), StorageError> {
        self.upsert_text_doc(
            "plot_threads",
            "thread_id",
            &thread.project_id,
            &thread.id,
            to_doc(thread)?,
        )
        .await
    }
}

#[async_trait]
impl BeatStore for PgStorage {
    async fn list_beats(
        &self,
        project_id: &str,
        since_chapter: u32,
    ) -> Result<Vec<BeatUsage>, StorageError> {
        let rows = sqlx::query(
            "SELECT project_id, beat, chapter, cooldown_until FROM beat_usages
              WHERE project_id = $1 AND chapter >= $2
              ORDER BY chapter, beat",
        )
        .bind(project_id)
        .bind(to_db_int(since_chapter))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("beat")?;
                let beat: BeatType =
                    raw.parse().map_err(|e| StorageError::corrupt(format!("beat {raw}"), e))?;
                Ok(BeatUsage {
                    project_id: row.try_get("project_id")?,
                    beat,
                    chapter: get_u32(row, "chapter")?,
                    cooldown_until: get_u32(row, "cooldown_until")?,
                })
            })
            .collect()
    }

    async fn record_beat(&self, usage: &BeatUsage) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO beat_usages (project_id, beat, chapter, cooldown_until)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (project_id, beat, chapter) DO UPDATE SET
               cooldown_until = EXCLUDED.cooldown_until",
        )
        .bind(&usage.project_id)
        .bind(usage.beat.as_str())
        .bind(to_db_int(usage.chapter))
        .bind(to_db_int(usage.cooldown_until))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ForeshadowStore for PgStorage {
    async fn list_hints(&self, project_id: &str) -> Result<Vec<ForeshadowingHint>, StorageError> {
        self.list_docs("foreshadowing_hints", "hint_id", project_id).await
    }

    async fn upsert_hint(&self, hint: &ForeshadowingHint) -> Result<(), StorageError> {
        self.upsert_text_doc(
            "foreshadowing_hints",
            "hint_id",
            &hint.project_id,
            &hint.id,
            to_doc(hint)?,
        )
        .await
    }
}
