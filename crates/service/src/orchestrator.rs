use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use novelmill_core::{Chapter, Project};
use novelmill_embeddings::EmbeddingProvider;
use novelmill_llm::CompletionProvider;
use novelmill_memory::{CommittedChapter, MemorySuite};
use novelmill_pipeline::{GenerationPipeline, PipelineError};
use novelmill_storage::NarrativeStore;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::OrchestratorConfig;
use crate::cursor::{contiguous_prefix, plan_next_chapter};
use crate::error::ServiceError;
use crate::side_effects::{TrackerOutcome, run_tracker_writes};

/// What one successful advance produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    pub project_id: String,
    pub chapter: u32,
    pub title: String,
    pub word_count: u32,
    pub attempts: u32,
    /// Cursor after the advance.
    pub cursor: u32,
    pub filled_gap: bool,
}

/// Moves projects forward one chapter at a time.
///
/// Only the orchestrator writes the cursor. One instance per project; two
/// orchestrators advancing the same project must be serialized by the caller.
pub struct Orchestrator {
    store: Arc<dyn NarrativeStore>,
    memory: MemorySuite,
    pipeline: GenerationPipeline,
    config: OrchestratorConfig,
    /// Background tracker batch of the last committed chapter, per project.
    pending: Mutex<HashMap<String, JoinHandle<Vec<TrackerOutcome>>>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn NarrativeStore>,
        llm: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        let memory = MemorySuite::new(Arc::clone(&store), Arc::clone(&llm), embedder);
        let pipeline = GenerationPipeline::new(
            Arc::clone(&store),
            memory.clone(),
            llm,
            config.generation.clone(),
        );
        Self { store, memory, pipeline, config, pending: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Generate, commit and record the next chapter of `project_id`.
    ///
    /// The cursor only moves after a successful commit, and never past a hole
    /// in the committed sequence.
    pub async fn advance_one_chapter(
        &self,
        project_id: &str,
    ) -> Result<AdvanceOutcome, ServiceError> {
        // The next context reads what the previous batch writes.
        self.drain(project_id).await;

        let mut project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| ServiceError::ProjectNotFound(project_id.to_owned()))?;
        let mut committed = self.store.chapter_numbers(project_id).await?;
        let plan = plan_next_chapter(project.cursor, &committed);

        if let Some(rollback) = plan.rollback_to {
            tracing::warn!(
                project = %project_id,
                cursor = project.cursor,
                committed_max = rollback,
                "cursor ahead of committed chapters, rolling back"
            );
            self.store.set_cursor(project_id, rollback).await?;
            project.cursor = rollback;
        }
        if plan.fills_gap {
            tracing::warn!(
                project = %project_id,
                chapter = plan.target,
                cursor = project.cursor,
                "filling gap in committed chapters"
            );
        }

        let chapter_error = |source: PipelineError| ServiceError::Chapter {
            project_id: project_id.to_owned(),
            chapter: plan.target,
            source,
        };
        let generated =
            self.pipeline.generate(&project, plan.target).await.map_err(chapter_error)?;
        let chapter = generated.chapter;
        self.store
            .upsert_chapter(&chapter)
            .await
            .map_err(|e| chapter_error(PipelineError::from(e)))?;
        tracing::info!(
            project = %project_id,
            chapter = chapter.number,
            words = chapter.word_count,
            attempts = generated.attempts,
            continued = generated.continued,
            "chapter committed"
        );

        self.spawn_tracker_writes(&project, &chapter);

        committed.push(chapter.number);
        let cursor = contiguous_prefix(&committed).max(project.cursor);
        if cursor != project.cursor {
            self.store.set_cursor(project_id, cursor).await?;
            tracing::info!(project = %project_id, from = project.cursor, to = cursor, "cursor advanced");
        }

        Ok(AdvanceOutcome {
            project_id: project_id.to_owned(),
            chapter: chapter.number,
            title: chapter.title,
            word_count: chapter.word_count,
            attempts: generated.attempts,
            cursor,
            filled_gap: plan.fills_gap,
        })
    }

    fn spawn_tracker_writes(&self, project: &Project, chapter: &Chapter) {
        let committed = CommittedChapter::new(project, chapter);
        let handle = tokio::spawn(run_tracker_writes(
            self.memory.clone(),
            committed,
            self.config.backfill_limit,
        ));
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project.id.clone(), handle);
        if previous.is_some() {
            tracing::debug!(project = %project.id, "previous tracker batch detached");
        }
    }

    /// Wait for the background tracker batch of `project_id`, if any.
    pub async fn drain(&self, project_id: &str) -> Vec<TrackerOutcome> {
        let handle =
            self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(project_id);
        let Some(handle) = handle else {
            return Vec::new();
        };
        match handle.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::warn!(project = %project_id, error = %e, "tracker batch aborted");
                Vec::new()
            },
        }
    }

    /// Wait for every pending tracker batch. Call before shutting down.
    pub async fn drain_all(&self) -> Vec<TrackerOutcome> {
        let projects: Vec<String> =
            self.pending.lock().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        let mut outcomes = Vec::new();
        for project_id in projects {
            outcomes.extend(self.drain(&project_id).await);
        }
        outcomes
    }
}

#[cfg(test)]
mod orchestrator_tests;
