//! Local ONNX embeddings via fastembed.

use std::sync::Mutex;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::EmbeddingError;
use crate::provider::EmbeddingProvider;

const MAX_TEXT_CHARS: usize = 2048;

pub struct LocalEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl std::fmt::Debug for LocalEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedder")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl LocalEmbedder {
    /// Load a model by name; weights are cached after the first download.
    ///
    /// # Errors
    /// Returns [`EmbeddingError::ModelInit`] for unknown names or load failures.
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (model, dimension) = match model_name {
            "all-MiniLM-L6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "BAAI/bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "BAAI/bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            "BAAI/bge-m3" => (EmbeddingModel::BGEM3, 1024),
            other => {
                return Err(EmbeddingError::ModelInit(format!("unsupported local model: {other}")));
            },
        };
        let embedding = TextEmbedding::try_new(InitOptions::new(model))
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;
        tracing::info!(model = model_name, dimension, "Initialized local embedder");
        Ok(Self { model: Mutex::new(embedding), model_name: model_name.to_owned(), dimension })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text]).await?.into_iter().next().ok_or(EmbeddingError::EmptyResult)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let inputs: Vec<String> = texts
            .iter()
            .map(|t| novelmill_core::text::truncate(t, MAX_TEXT_CHARS).to_owned())
            .collect();
        let mut model = self.model.lock().map_err(|_| EmbeddingError::LockPoisoned)?;
        model.embed(inputs, None).map_err(|e| EmbeddingError::Generation(e.to_string()))
    }
}
