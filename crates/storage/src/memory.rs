//! In-process storage backend.
//!
//! Keeps every table in ordered maps behind one async lock. Used by tests and by
//! dry runs when no database URL is configured. Semantics match `PgStorage`:
//! upserts by unique key, ascending chapter order, latest-row-wins character state.

use std::collections::BTreeMap;

use async_trait::async_trait;
use novelmill_core::{
    ArcPlan, BeatUsage, Chapter, ChapterSummary, CharacterArc, CharacterState, ChunkMatch,
    ForeshadowingHint, LocationBible, MemoryChunk, PlotThread, PowerState, Project, Synopsis,
    VoiceFingerprint,
};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::traits::{
    ArcStore, BeatStore, ChapterStore, CharacterStore, ChunkStore, ForeshadowStore, PowerStore,
    ProjectStore, SummaryStore, ThreadStore, VoiceStore, WorldStore,
};
use crate::vector::cosine_similarity;

type ProjectKey = String;

#[derive(Default)]
struct Tables {
    projects: BTreeMap<ProjectKey, Project>,
    chapters: BTreeMap<(ProjectKey, u32), Chapter>,
    summaries: BTreeMap<(ProjectKey, u32), ChapterSummary>,
    synopses: BTreeMap<ProjectKey, Synopsis>,
    arcs: BTreeMap<(ProjectKey, u32), ArcPlan>,
    threads: BTreeMap<(ProjectKey, String), PlotThread>,
    beats: BTreeMap<(ProjectKey, u32, String), BeatUsage>,
    hints: BTreeMap<(ProjectKey, String), ForeshadowingHint>,
    character_arcs: BTreeMap<(ProjectKey, String), CharacterArc>,
    character_states: BTreeMap<(ProjectKey, String, u32), CharacterState>,
    power: BTreeMap<ProjectKey, PowerState>,
    voice: BTreeMap<ProjectKey, VoiceFingerprint>,
    locations: BTreeMap<(ProjectKey, String), LocationBible>,
    chunks: BTreeMap<String, MemoryChunk>,
}

/// Storage backend that lives entirely in memory.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage").finish_non_exhaustive()
    }
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn recent_below<T: Clone>(
    map: &BTreeMap<(ProjectKey, u32), T>,
    project_id: &str,
    before: u32,
    limit: usize,
) -> Vec<T> {
    let mut rows: Vec<T> = map
        .range((project_id.to_owned(), 0)..(project_id.to_owned(), before))
        .rev()
        .take(limit)
        .map(|(_, v)| v.clone())
        .collect();
    rows.reverse();
    rows
}

#[async_trait]
impl ProjectStore for MemoryStorage {
    async fn save_project(&self, project: &Project) -> Result<(), StorageError> {
        self.tables.write().await.projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, StorageError> {
        Ok(self.tables.read().await.projects.get(id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        let mut projects: Vec<Project> =
            self.tables.read().await.projects.values().cloned().collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    async fn set_cursor(&self, project_id: &str, cursor: u32) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let project = tables
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StorageError::NotFound { entity: "project", id: project_id.to_owned() })?;
        project.cursor = cursor;
        Ok(())
    }
}

#[async_trait]
impl ChapterStore for MemoryStorage {
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .chapters
            .insert((chapter.project_id.clone(), chapter.number), chapter.clone());
        Ok(())
    }

    async fn get_chapter(
        &self,
        project_id: &str,
        number: u32,
    ) -> Result<Option<Chapter>, StorageError> {
        Ok(self.tables.read().await.chapters.get(&(project_id.to_owned(), number)).cloned())
    }

    async fn recent_chapters(
        &self,
        project_id: &str,
        before: u32,
        limit: usize,
    ) -> Result<Vec<Chapter>, StorageError> {
        Ok(recent_below(&self.tables.read().await.chapters, project_id, before, limit))
    }

    async fn chapter_numbers(&self, project_id: &str) -> Result<Vec<u32>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .chapters
            .keys()
            .filter(|(p, _)| p == project_id)
            .map(|(_, n)| *n)
            .collect())
    }

    async fn count_chapters(&self, project_id: &str) -> Result<usize, StorageError> {
        Ok(self.tables.read().await.chapters.keys().filter(|(p, _)| p == project_id).count())
    }
}

#[async_trait]
impl SummaryStore for MemoryStorage {
    async fn upsert_chapter_summary(&self, summary: &ChapterSummary) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .summaries
            .insert((summary.project_id.clone(), summary.number), summary.clone());
        Ok(())
    }

    async fn get_chapter_summary(
        &self,
        project_id: &str,
        number: u32,
    ) -> Result<Option<ChapterSummary>, StorageError> {
        Ok(self.tables.read().await.summaries.get(&(project_id.to_owned(), number)).cloned())
    }

    async fn recent_summaries(
        &self,
        project_id: &str,
        before: u32,
        limit: usize,
    ) -> Result<Vec<ChapterSummary>, StorageError> {
        Ok(recent_below(&self.tables.read().await.summaries, project_id, before, limit))
    }

    async fn get_synopsis(&self, project_id: &str) -> Result<Option<Synopsis>, StorageError> {
        Ok(self.tables.read().await.synopses.get(project_id).cloned())
    }

    async fn save_synopsis(&self, synopsis: &Synopsis) -> Result<(), StorageError> {
        self.tables.write().await.synopses.insert(synopsis.project_id.clone(), synopsis.clone());
        Ok(())
    }
}

#[async_trait]
impl ArcStore for MemoryStorage {
    async fn get_arc_plan(
        &self,
        project_id: &str,
        arc_index: u32,
    ) -> Result<Option<ArcPlan>, StorageError> {
        Ok(self.tables.read().await.arcs.get(&(project_id.to_owned(), arc_index)).cloned())
    }

    async fn save_arc_plan(&self, plan: &ArcPlan) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .arcs
            .insert((plan.project_id.clone(), plan.arc_index), plan.clone());
        Ok(())
    }
}

#[async_trait]
impl ThreadStore for MemoryStorage {
    async fn list_threads(&self, project_id: &str) -> Result<Vec<PlotThread>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .threads
            .iter()
            .filter(|((p, _), _)| p == project_id)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn upsert_thread(&self, thread: &PlotThread) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .threads
            .insert((thread.project_id.clone(), thread.id.clone()), thread.clone());
        Ok(())
    }
}

#[async_trait]
impl BeatStore for MemoryStorage {
    async fn list_beats(
        &self,
        project_id: &str,
        since_chapter: u32,
    ) -> Result<Vec<BeatUsage>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .beats
            .iter()
            .filter(|((p, chapter, _), _)| p == project_id && *chapter >= since_chapter)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn record_beat(&self, usage: &BeatUsage) -> Result<(), StorageError> {
        self.tables.write().await.beats.insert(
            (usage.project_id.clone(), usage.chapter, usage.beat.as_str().to_owned()),
            usage.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl ForeshadowStore for MemoryStorage {
    async fn list_hints(&self, project_id: &str) -> Result<Vec<ForeshadowingHint>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .hints
            .iter()
            .filter(|((p, _), _)| p == project_id)
            .map(|(_, h)| h.clone())
            .collect())
    }

    async fn upsert_hint(&self, hint: &ForeshadowingHint) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .hints
            .insert((hint.project_id.clone(), hint.id.clone()), hint.clone());
        Ok(())
    }
}

#[async_trait]
impl CharacterStore for MemoryStorage {
    async fn list_character_arcs(
        &self,
        project_id: &str,
    ) -> Result<Vec<CharacterArc>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .character_arcs
            .iter()
            .filter(|((p, _), _)| p == project_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn upsert_character_arc(&self, arc: &CharacterArc) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .character_arcs
            .insert((arc.project_id.clone(), arc.name.clone()), arc.clone());
        Ok(())
    }

    async fn record_character_state(&self, state: &CharacterState) -> Result<(), StorageError> {
        self.tables.write().await.character_states.insert(
            (state.project_id.clone(), state.name.clone(), state.chapter),
            state.clone(),
        );
        Ok(())
    }

    async fn latest_character_states(
        &self,
        project_id: &str,
    ) -> Result<Vec<CharacterState>, StorageError> {
        let tables = self.tables.read().await;
        let mut latest: BTreeMap<&str, &CharacterState> = BTreeMap::new();
        for ((p, name, _), state) in &tables.character_states {
            if p == project_id {
                // Keys iterate in chapter order per name, so the last write wins.
                latest.insert(name.as_str(), state);
            }
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn character_states_before(
        &self,
        project_id: &str,
        chapter: u32,
    ) -> Result<Vec<CharacterState>, StorageError> {
        let tables = self.tables.read().await;
        let mut latest: BTreeMap<&str, &CharacterState> = BTreeMap::new();
        for ((p, name, at), state) in &tables.character_states {
            if p == project_id && *at < chapter {
                latest.insert(name.as_str(), state);
            }
        }
        Ok(latest.into_values().cloned().collect())
    }
}

#[async_trait]
impl PowerStore for MemoryStorage {
    async fn get_power_state(&self, project_id: &str) -> Result<Option<PowerState>, StorageError> {
        Ok(self.tables.read().await.power.get(project_id).cloned())
    }

    async fn save_power_state(&self, state: &PowerState) -> Result<(), StorageError> {
        self.tables.write().await.power.insert(state.project_id.clone(), state.clone());
        Ok(())
    }
}

#[async_trait]
impl VoiceStore for MemoryStorage {
    async fn get_voice_fingerprint(
        &self,
        project_id: &str,
    ) -> Result<Option<VoiceFingerprint>, StorageError> {
        Ok(self.tables.read().await.voice.get(project_id).cloned())
    }

    async fn save_voice_fingerprint(
        &self,
        fingerprint: &VoiceFingerprint,
    ) -> Result<(), StorageError> {
        self.tables.write().await.voice.insert(fingerprint.project_id.clone(), fingerprint.clone());
        Ok(())
    }
}

#[async_trait]
impl WorldStore for MemoryStorage {
    async fn list_locations(&self, project_id: &str) -> Result<Vec<LocationBible>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .locations
            .iter()
            .filter(|((p, _), _)| p == project_id)
            .map(|(_, l)| l.clone())
            .collect())
    }

    async fn upsert_location(&self, location: &LocationBible) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .locations
            .insert((location.project_id.clone(), location.name.clone()), location.clone());
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for MemoryStorage {
    async fn replace_chapter_chunks(
        &self,
        project_id: &str,
        chapter: u32,
        chunks: &[MemoryChunk],
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        tables.chunks.retain(|_, c| !(c.project_id == project_id && c.chapter == chapter));
        for chunk in chunks {
            tables.chunks.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn chunks_without_embeddings(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryChunk>, StorageError> {
        let tables = self.tables.read().await;
        let mut pending: Vec<MemoryChunk> = tables
            .chunks
            .values()
            .filter(|c| c.project_id == project_id && c.embedding.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|c| (c.chapter, c.ordinal));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn store_chunk_embedding(
        &self,
        chunk_id: &str,
        embedding: &[f32],
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let chunk = tables
            .chunks
            .get_mut(chunk_id)
            .ok_or_else(|| StorageError::NotFound { entity: "memory_chunk", id: chunk_id.to_owned() })?;
        chunk.embedding = Some(embedding.to_vec());
        Ok(())
    }

    async fn search_chunks(
        &self,
        project_id: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
        max_chapter: u32,
    ) -> Result<Vec<ChunkMatch>, StorageError> {
        let tables = self.tables.read().await;
        let mut hits: Vec<ChunkMatch> = tables
            .chunks
            .values()
            .filter(|c| c.project_id == project_id && c.chapter <= max_chapter)
            .filter_map(|c| {
                let candidate = c.embedding.as_deref()?;
                let similarity = cosine_similarity(embedding, candidate)?;
                (similarity >= threshold).then(|| ChunkMatch {
                    chunk_id: c.id.clone(),
                    chapter: c.chapter,
                    kind: c.kind,
                    text: c.text.clone(),
                    similarity,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}
