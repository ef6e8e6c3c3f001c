use async_trait::async_trait;
use novelmill_core::{ChunkMatch, MemoryChunk};

use crate::error::StorageError;

/// Memory chunk storage and nearest-neighbor search.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Replace every chunk of `chapter` with `chunks` (re-ingest after upsert-repair).
    async fn replace_chapter_chunks(
        &self,
        project_id: &str,
        chapter: u32,
        chunks: &[MemoryChunk],
    ) -> Result<(), StorageError>;

    /// Chunks whose embedding has not been computed yet, oldest chapter first.
    async fn chunks_without_embeddings(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryChunk>, StorageError>;

    /// Store the embedding vector of a chunk.
    async fn store_chunk_embedding(
        &self,
        chunk_id: &str,
        embedding: &[f32],
    ) -> Result<(), StorageError>;

    /// Top-N embedded chunks of chapters `<= max_chapter` above a similarity threshold.
    ///
    /// Returns matches ordered by similarity descending.
    async fn search_chunks(
        &self,
        project_id: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
        max_chapter: u32,
    ) -> Result<Vec<ChunkMatch>, StorageError>;
}
