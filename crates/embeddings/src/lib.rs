//! Embedding generation for long-range narrative memory
//!
//! Three backends behind [`EmbeddingProvider`]: an OpenAI-compatible HTTP
//! service, a local fastembed model (`local` feature), and a deterministic
//! hashing embedder used when neither is configured.

mod error;
mod hashing;
mod http;
#[cfg(feature = "local")]
mod local;
mod provider;

use std::sync::Arc;

use novelmill_core::{env_parse_with_default, env_string};

pub use error::EmbeddingError;
pub use hashing::{HASHING_DIMENSION, HashingEmbedder};
pub use http::HttpEmbedder;
#[cfg(feature = "local")]
pub use local::LocalEmbedder;
pub use provider::EmbeddingProvider;

/// Default model name for the HTTP backend.
pub const DEFAULT_EMBEDDINGS_MODEL: &str = "text-embedding-3-small";

/// Pick a provider from `NOVELMILL_EMBEDDINGS_*` variables.
///
/// `NOVELMILL_EMBEDDINGS_URL` selects the HTTP backend; otherwise
/// `NOVELMILL_LOCAL_EMBEDDINGS_MODEL` selects fastembed when the `local` feature
/// is on; otherwise the hashing embedder.
///
/// # Errors
/// Returns an error when the selected backend fails to initialize.
pub fn provider_from_env() -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    if let Some(url) = env_string("NOVELMILL_EMBEDDINGS_URL") {
        let model = env_string("NOVELMILL_EMBEDDINGS_MODEL")
            .unwrap_or_else(|| DEFAULT_EMBEDDINGS_MODEL.to_owned());
        let dimension = env_parse_with_default("NOVELMILL_EMBEDDINGS_DIM", 1536_usize);
        let embedder = HttpEmbedder::new(&url, env_string("NOVELMILL_API_KEY"), model, dimension)?;
        tracing::info!(?embedder, "using HTTP embeddings");
        return Ok(Arc::new(embedder));
    }

    #[cfg(feature = "local")]
    if let Some(model) = env_string("NOVELMILL_LOCAL_EMBEDDINGS_MODEL") {
        return Ok(Arc::new(LocalEmbedder::new(&model)?));
    }

    tracing::info!(dimension = HASHING_DIMENSION, "no embedding service configured, using hashing embedder");
    Ok(Arc::new(HashingEmbedder::default()))
}
