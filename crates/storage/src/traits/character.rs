use async_trait::async_trait;
use novelmill_core::{CharacterArc, CharacterState};

use crate::error::StorageError;

/// Character arc and character state operations.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn list_character_arcs(&self, project_id: &str)
    -> Result<Vec<CharacterArc>, StorageError>;

    /// Insert or replace an arc keyed by (project, name).
    async fn upsert_character_arc(&self, arc: &CharacterArc) -> Result<(), StorageError>;

    /// Record a state keyed by (project, name, chapter).
    async fn record_character_state(&self, state: &CharacterState) -> Result<(), StorageError>;

    /// The latest state per character, ordered by name.
    async fn latest_character_states(
        &self,
        project_id: &str,
    ) -> Result<Vec<CharacterState>, StorageError>;

    /// The latest state per character recorded strictly before `chapter`, ordered by name.
    async fn character_states_before(
        &self,
        project_id: &str,
        chapter: u32,
    ) -> Result<Vec<CharacterState>, StorageError>;
}
