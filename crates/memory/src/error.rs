//! Typed error enum for memory trackers.

use novelmill_core::CoreError;
use novelmill_embeddings::EmbeddingError;
use novelmill_llm::LlmError;
use novelmill_storage::StorageError;
use thiserror::Error;

/// Tracker failure. Always non-fatal to the chapter commit; callers log it.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("model call: {0}")]
    Llm(#[from] LlmError),
    #[error("embedding: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("unusable model output: {0}")]
    Parse(#[from] CoreError),
}

impl TrackerError {
    /// Whether retrying the same write later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Llm(e) => e.is_transient() || matches!(e, LlmError::RetriesExhausted(_)),
            Self::Embedding(e) => e.is_transient(),
            Self::Parse(_) => false,
        }
    }
}
