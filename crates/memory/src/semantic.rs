//! Long-range semantic store: chunking, embedding and similarity retrieval.

use std::sync::Arc;

use novelmill_core::constants::{
    CHUNK_TARGET_CHARS, SEMANTIC_RECENCY_WINDOW, SEMANTIC_SIMILARITY_THRESHOLD, SEMANTIC_TOP_K,
};
use novelmill_core::text::{paragraphs, sentences};
use novelmill_core::{ChunkKind, ChunkMatch, MemoryChunk};
use novelmill_embeddings::EmbeddingProvider;
use novelmill_storage::NarrativeStore;
use uuid::Uuid;

use crate::error::TrackerError;
use crate::tracker::CommittedChapter;

fn is_dialogue_paragraph(paragraph: &str) -> bool {
    paragraph.starts_with(['"', '\u{201C}', '\''])
}

/// Split oversized paragraphs at sentence boundaries.
fn pieces(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in paragraphs(body) {
        if paragraph.len() <= CHUNK_TARGET_CHARS {
            out.push(paragraph.to_owned());
            continue;
        }
        let mut current = String::new();
        for sentence in sentences(paragraph) {
            if !current.is_empty() && current.len() + sentence.len() + 1 > CHUNK_TARGET_CHARS {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

fn chunk_id(project_id: &str, chapter: u32, ordinal: u32) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{project_id}:{chapter}:{ordinal}").as_bytes())
        .to_string()
}

/// Chunk a committed chapter into roughly [`CHUNK_TARGET_CHARS`]-sized pieces.
///
/// Chunk ids are derived from (project, chapter, ordinal), so re-ingesting a
/// chapter replaces rather than duplicates.
#[must_use]
pub fn chunk_chapter(chapter: &CommittedChapter) -> Vec<MemoryChunk> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;
    for piece in pieces(&chapter.body) {
        if !current.is_empty() && current_len + piece.len() > CHUNK_TARGET_CHARS {
            groups.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += piece.len() + 2;
        current.push(piece);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let mut chunks: Vec<MemoryChunk> = Vec::with_capacity(groups.len() + 1);
    for group in groups {
        let dialogue = group.iter().filter(|p| is_dialogue_paragraph(p)).count();
        let ordinal = u32::try_from(chunks.len()).unwrap_or(u32::MAX);
        chunks.push(MemoryChunk {
            id: chunk_id(&chapter.project_id, chapter.number, ordinal),
            project_id: chapter.project_id.clone(),
            chapter: chapter.number,
            ordinal,
            kind: if dialogue * 2 > group.len() { ChunkKind::Dialogue } else { ChunkKind::Narrative },
            text: group.join("\n\n"),
            embedding: None,
        });
    }

    if let Some(outline) = &chapter.outline {
        let goals: Vec<&str> = outline.scenes.iter().map(|s| s.goal.trim()).filter(|g| !g.is_empty()).collect();
        let summary = format!(
            "Chapter {} \"{}\": {} {}",
            chapter.number,
            chapter.title,
            goals.join(" "),
            outline.hook
        );
        let ordinal = u32::try_from(chunks.len()).unwrap_or(u32::MAX);
        chunks.push(MemoryChunk {
            id: chunk_id(&chapter.project_id, chapter.number, ordinal),
            project_id: chapter.project_id.clone(),
            chapter: chapter.number,
            ordinal,
            kind: ChunkKind::Summary,
            text: summary.trim().to_owned(),
            embedding: None,
        });
    }
    chunks
}

/// Chunk store with embedding and top-K retrieval beyond the recency window.
pub struct SemanticStore {
    store: Arc<dyn NarrativeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SemanticStore {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Store the chapter's chunks, then fill their embeddings.
    ///
    /// Chunks are persisted even when embedding fails; [`Self::backfill_embeddings`]
    /// picks them up later. Returns the number of chunks embedded now.
    pub async fn ingest(&self, chapter: &CommittedChapter) -> Result<usize, TrackerError> {
        let chunks = chunk_chapter(chapter);
        self.store.replace_chapter_chunks(&chapter.project_id, chapter.number, &chunks).await?;
        match self.embed_and_store(&chunks).await {
            Ok(count) => Ok(count),
            Err(e) => {
                tracing::warn!(
                    project = %chapter.project_id,
                    chapter = chapter.number,
                    chunks = chunks.len(),
                    error = %e,
                    "embedding failed, chunks left for backfill"
                );
                Ok(0)
            },
        }
    }

    /// Embed up to `limit` chunks that have no embedding yet.
    pub async fn backfill_embeddings(&self, project_id: &str, limit: usize) -> Result<usize, TrackerError> {
        let pending = self.store.chunks_without_embeddings(project_id, limit).await?;
        if pending.is_empty() {
            return Ok(0);
        }
        let count = self.embed_and_store(&pending).await?;
        tracing::info!(project = %project_id, count, "backfilled chunk embeddings");
        Ok(count)
    }

    async fn embed_and_store(&self, chunks: &[MemoryChunk]) -> Result<usize, TrackerError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            self.store.store_chunk_embedding(&chunk.id, vector).await?;
        }
        Ok(vectors.len().min(chunks.len()))
    }

    /// Top-K chunks relevant to `query`, from chapters older than the recency window.
    pub async fn retrieve(
        &self,
        project_id: &str,
        chapter: u32,
        query: &str,
    ) -> Result<Vec<ChunkMatch>, TrackerError> {
        let max_chapter = chapter.saturating_sub(SEMANTIC_RECENCY_WINDOW + 1);
        if max_chapter == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        Ok(self
            .store
            .search_chunks(project_id, &embedding, SEMANTIC_SIMILARITY_THRESHOLD, SEMANTIC_TOP_K, max_chapter)
            .await?)
    }
}
