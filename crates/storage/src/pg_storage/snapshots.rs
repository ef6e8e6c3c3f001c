//! Single-row-per-project snapshots: power state and voice fingerprint.

use super::*;

use crate::traits::{PowerStore, VoiceStore};
use async_trait::async_trait;
use novelmill_core::{PowerState, VoiceFingerprint};

#[async_trait]
impl PowerStore for PgStorage {
    async fn get_power_state(&self, project_id: &str) -> Result<Option<PowerState>, StorageError> {
        let row = sqlx::query("SELECT doc FROM power_states WHERE project_id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| from_doc(&r, "doc", "power state")).transpose()
    }

    async fn save_power_state(&self, state: &PowerState) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO power_states (project_id, doc, updated_chapter) VALUES ($1, $2, $3)
             ON CONFLICT (project_id) DO UPDATE SET
               doc = EXCLUDED.doc, updated_chapter = EXCLUDED.updated_chapter",
        )
        .bind(&state.project_id)
        .bind(to_doc(state)?)
        .bind(to_db_int(state.updated_chapter))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VoiceStore for PgStorage {
    async fn get_voice_fingerprint(
        &self,
        project_id: &str,
    ) -> Result<Option<VoiceFingerprint>, StorageError> {
        let row = sqlx::query("SELECT doc FROM voice_fingerprints WHERE project_id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| from_doc(&r, "doc", "voice fingerprint")).transpose()
    }

    async fn save_voice_fingerprint(
        &self,
        fingerprint: &VoiceFingerprint,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO voice_fingerprints (project_id, doc, computed_chapter) VALUES ($1, $2, $3)
             ON CONFLICT (project_id) DO UPDATE SET
               doc = EXCLUDED.doc, computed_chapter = EXCLUDED.computed_chapter",
        )
        .bind(&fingerprint.project_id)
        .bind(to_doc(fingerprint)?)
        .bind(to_db_int(fingerprint.computed_chapter))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
