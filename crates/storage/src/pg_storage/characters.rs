//! CharacterStore and WorldStore implementations for PgStorage.

use super::*;

use crate::traits::{CharacterStore, WorldStore};
use async_trait::async_trait;
use novelmill_core::{CharacterArc, CharacterState, LifeStatus, LocationBible};

#[async_trait]
impl CharacterStore for PgStorage {
    async fn list_character_arcs(
        &self,
        project_id: &str,
    ) -> Result<Vec<CharacterArc>, StorageError> {
        self.list_docs("character_arcs", "name", project_id).await
    }

    async fn upsert_character_arc(&self, arc: &CharacterArc) -> Result<(), StorageError> {
        self.upsert_text_doc("character_arcs", "name", &arc.project_id, &arc.name, to_doc(arc)?)
            .await
    }

    async fn record_character_state(&self, state: &CharacterState) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO character_states
                (project_id, name, chapter, status, power, location, recorded_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7)
             ON CONFLICT (project_id, name, chapter) DO UPDATE SET
               status = EXCLUDED.status, power = EXCLUDED.power,
               location = EXCLUDED.location, recorded_at = EXCLUDED.recorded_at",
        )
        .bind(&state.project_id)
        .bind(&state.name)
        .bind(to_db_int(state.chapter))
        .bind(state.status.as_str())
        .bind(&state.power)
        .bind(&state.location)
        .bind(state.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_character_states(
        &self,
        project_id: &str,
    ) -> Result<Vec<CharacterState>, StorageError> {
        self.character_states_before(project_id, u32::MAX).await
    }

    async fn character_states_before(
        &self,
        project_id: &str,
        chapter: u32,
    ) -> Result<Vec<CharacterState>, StorageError> {
        let rows = sqlx::query(
            "SELECT DISTINCT ON (name)
                    project_id, name, chapter, status, power, location, recorded_at
               FROM character_states
              WHERE project_id = $1 AND chapter < $2
              ORDER BY name, chapter DESC",
        )
        .bind(project_id)
        .bind(i64::from(chapter))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(state_from_row).collect()
    }
}

fn state_from_row(row: &PgRow) -> Result<CharacterState, StorageError> {
    let status: String = row.try_get("status")?;
    Ok(CharacterState {
        project_id: row.try_get("project_id")?,
        name: row.try_get("name")?,
        chapter: get_u32(row, "chapter")?,
        status: LifeStatus::coerce(&status),
        power: row.try_get("power")?,
        location: row.try_get("location")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

#[async_trait]
impl WorldStore for PgStorage {
    async fn list_locations(&self, project_id: &str) -> Result<Vec<LocationBible>, StorageError> {
        self.list_docs("locations", "name", project_id).await
    }

    async fn upsert_location(&self, location: &LocationBible) -> Result<(), StorageError> {
        self.upsert_text_doc(
            "locations",
            "name",
            &location.project_id,
            &location.name,
            to_doc(location)?,
        )
        .await
    }
}
