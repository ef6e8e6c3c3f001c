//! Typed error enum for chapter generation.

use novelmill_llm::LlmError;
use novelmill_memory::TrackerError;
use novelmill_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Retry budget exhausted or a step produced nothing usable. Nothing is committed.
    #[error("chapter {chapter} generation failed: {reason}")]
    ChapterGenerationFailed { chapter: u32, reason: String },

    /// Reading narrative state for the context failed.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("memory: {0}")]
    Memory(#[from] TrackerError),

    #[error("llm: {0}")]
    Llm(#[from] LlmError),
}

impl PipelineError {
    #[must_use]
    pub fn failed(chapter: u32, reason: impl Into<String>) -> Self {
        Self::ChapterGenerationFailed { chapter, reason: reason.into() }
    }

    /// Whether this error is likely transient (worth retrying the chapter later).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Memory(e) => e.is_transient(),
            Self::Llm(e) => e.is_transient() || matches!(e, LlmError::RetriesExhausted(_)),
            Self::ChapterGenerationFailed { .. } => false,
        }
    }
}
