//! Deterministic bag-of-words embedder.
//!
//! Used when no embedding service is configured. Each lowercase word is hashed
//! into a signed bucket, so texts sharing vocabulary land close together.

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::provider::{EmbeddingProvider, normalize};

pub const HASHING_DIMENSION: usize = 384;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// # Errors
    /// Returns [`EmbeddingError::ModelInit`] for a zero dimension.
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::ModelInit("dimension must be positive".to_owned()));
        }
        Ok(Self { dimension })
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimension: HASHING_DIMENSION }
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing-bow"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lower = text.to_lowercase();
        let tokens = lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty());
        let dim = self.dimension as u64;
        for token in tokens {
            let hash = fnv1a(token);
            #[allow(clippy::cast_possible_truncation, reason = "bucket < dimension")]
            let bucket = (hash % dim) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            if let Some(slot) = vector.get_mut(bucket) {
                *slot += sign;
            }
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_same_text_same_vector() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("The jade pendant glows").await.unwrap();
        let b = embedder.embed("the JADE pendant glows!").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASHING_DIMENSION);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer_than_disjoint() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("jade pendant from his mother").await.unwrap();
        let related = embedder.embed("he clutched the jade pendant his mother left").await.unwrap();
        let unrelated = embedder.embed("storm clouds over the harbor city").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_yields_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert_eq!(embedder.embed("").await.unwrap(), vec![0.0; 8]);
        assert!(HashingEmbedder::new(0).is_err());
    }
}
