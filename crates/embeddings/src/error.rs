//! Typed error enum for the embeddings crate.

use thiserror::Error;

/// Errors from embedding generation operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model initialization failed: {0}")]
    ModelInit(String),
    #[error("embedding mutex lock poisoned")]
    LockPoisoned,
    #[error("embedding generation returned empty result")]
    EmptyResult,
    #[error("embedding generation failed: {0}")]
    Generation(String),
    #[error("embedding request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("embedding service returned {code}: {body}")]
    HttpStatus { code: u16, body: String },
    #[error("expected {expected}-dimensional embedding, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Whether a later backfill pass may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpRequest(_) => true,
            Self::HttpStatus { code, .. } => matches!(code, 429 | 500 | 502 | 503 | 529),
            _ => false,
        }
    }
}
