use async_trait::async_trait;
use novelmill_core::{LocationBible, PowerState, VoiceFingerprint};

use crate::error::StorageError;

/// Power snapshot; one live row per project.
#[async_trait]
pub trait PowerStore: Send + Sync {
    async fn get_power_state(&self, project_id: &str) -> Result<Option<PowerState>, StorageError>;

    /// Overwrite the live snapshot.
    async fn save_power_state(&self, state: &PowerState) -> Result<(), StorageError>;
}

/// Voice fingerprint; one live row per project.
#[async_trait]
pub trait VoiceStore: Send + Sync {
    async fn get_voice_fingerprint(
        &self,
        project_id: &str,
    ) -> Result<Option<VoiceFingerprint>, StorageError>;

    /// Overwrite the live fingerprint.
    async fn save_voice_fingerprint(
        &self,
        fingerprint: &VoiceFingerprint,
    ) -> Result<(), StorageError>;
}

/// Location bible operations.
#[async_trait]
pub trait WorldStore: Send + Sync {
    async fn list_locations(&self, project_id: &str) -> Result<Vec<LocationBible>, StorageError>;

    /// Insert or replace a location keyed by (project, name).
    async fn upsert_location(&self, location: &LocationBible) -> Result<(), StorageError>;
}
