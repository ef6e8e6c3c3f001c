use async_trait::async_trait;
use novelmill_core::{ArcPlan, BeatUsage, ForeshadowingHint, PlotThread};

use crate::error::StorageError;

/// Arc plan operations.
#[async_trait]
pub trait ArcStore: Send + Sync {
    async fn get_arc_plan(
        &self,
        project_id: &str,
        arc_index: u32,
    ) -> Result<Option<ArcPlan>, StorageError>;

    /// Insert or replace the plan keyed by (project, arc index).
    async fn save_arc_plan(&self, plan: &ArcPlan) -> Result<(), StorageError>;
}

/// Plot thread operations.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// All threads of a project, regardless of status.
    async fn list_threads(&self, project_id: &str) -> Result<Vec<PlotThread>, StorageError>;

    /// Insert or replace a thread keyed by (project, id).
    async fn upsert_thread(&self, thread: &PlotThread) -> Result<(), StorageError>;
}

/// Beat usage ledger.
#[async_trait]
pub trait BeatStore: Send + Sync {
    /// Beats used at or after `since_chapter`, ascending by chapter.
    async fn list_beats(
        &self,
        project_id: &str,
        since_chapter: u32,
    ) -> Result<Vec<BeatUsage>, StorageError>;

    /// Record a beat keyed by (project, beat, chapter).
    async fn record_beat(&self, usage: &BeatUsage) -> Result<(), StorageError>;
}

/// Foreshadowing hint operations.
#[async_trait]
pub trait ForeshadowStore: Send + Sync {
    async fn list_hints(&self, project_id: &str) -> Result<Vec<ForeshadowingHint>, StorageError>;

    /// Insert or replace a hint keyed by (project, id).
    async fn upsert_hint(&self, hint: &ForeshadowingHint) -> Result<(), StorageError>;
}
