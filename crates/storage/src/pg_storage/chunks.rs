//! ChunkStore implementation for PgStorage.

use super::*;

use crate::traits::ChunkStore;
use crate::vector::to_pg_vector;
use async_trait::async_trait;
use novelmill_core::{ChunkKind, ChunkMatch, MemoryChunk};

#[async_trait]
impl ChunkStore for PgStorage {
    async fn replace_chapter_chunks(
        &self,
        project_id: &str,
        chapter: u32,
        chunks: &[MemoryChunk],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM memory_chunks WHERE project_id = $1 AND chapter = $2")
            .bind(project_id)
            .bind(to_db_int(chapter))
            .execute(&mut *tx)
            .await?;
        for chunk in chunks {
            let embedding = chunk.embedding.as_deref().map(to_pg_vector);
            sqlx::query(
                "INSERT INTO memory_chunks (id, project_id, chapter, ordinal, kind, text, embedding)
                 VALUES ($1, $2, $3, $4, $5, $6, $7::vector)",
            )
            .bind(&chunk.id)
            .bind(&chunk.project_id)
            .bind(to_db_int(chunk.chapter))
            .bind(to_db_int(chunk.ordinal))
            .bind(chunk.kind.as_str())
            .bind(&chunk.text)
            .bind(embedding)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn chunks_without_embeddings(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryChunk>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, project_id, chapter, ordinal, kind, text
               FROM memory_chunks
              WHERE project_id = $1 AND embedding IS NULL
              ORDER BY chapter, ordinal
              LIMIT $2",
        )
        .bind(project_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("kind")?;
                Ok(MemoryChunk {
                    id: row.try_get("id")?,
                    project_id: row.try_get("project_id")?,
                    chapter: get_u32(row, "chapter")?,
                    ordinal: get_u32(row, "ordinal")?,
                    kind: ChunkKind::from_db(&kind),
                    text: row.try_get("text")?,
                    embedding: None,
                })
            })
            .collect()
    }

    async fn store_chunk_embedding(
        &self,
        chunk_id: &str,
        embedding: &[f32],
    ) -> Result<(), StorageError> {
        let affected = sqlx::query("UPDATE memory_chunks SET embedding = $1::vector WHERE id = $2")
            .bind(to_pg_vector(embedding))
            .bind(chunk_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(StorageError::NotFound { entity: "memory_chunk", id: chunk_id.to_owned() });
        }
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
        if embedding.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, chapter, kind, text, 1.0 - (embedding <=> $1::vector) AS similarity
               FROM memory_chunks
              WHERE project_id = $2 AND chapter <= $3 AND embedding IS NOT NULL
              ORDER BY embedding <=> $1::vector, id
              LIMIT $4",
        )
        .bind(to_pg_vector(embedding))
        .bind(project_id)
        .bind(to_db_int(max_chapter))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let similarity: f64 = row.try_get("similarity")?;
            #[allow(clippy::cast_possible_truncation, reason = "cosine similarity fits in f32")]
            let similarity = similarity as f32;
            if similarity < threshold {
                continue;
            }
            let kind: String = row.try_get("kind")?;
            hits.push(ChunkMatch {
                chunk_id: row.try_get("id")?,
                chapter: get_u32(row, "chapter")?,
                kind: ChunkKind::from_db(&kind),
                text: row.try_get("text")?,
                similarity,
            });
        }
        Ok(hits)
    }
}

