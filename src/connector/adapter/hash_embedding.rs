use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use tracing::debug;

use crate::application::EmbeddingService;
use crate::domain::DomainError;

/// Local embedding path: deterministic seeded-hash vectors, normalized
/// to unit length. No network, no rate limit; identical text always maps
/// to the identical vector, which is what retrieval tests and offline
/// runs need.
pub struct HashEmbedding {
    dimensions: usize,
    model_name: String,
}

impl HashEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(384)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_name: "hash-embedding".to_string(),
        }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for HashEmbedding {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        Ok(self.generate(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let vectors: Vec<Vec<f32>> = texts.iter().map(|text| self.generate(text)).collect();
        debug!("Generated {} local embeddings", vectors.len());
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let service = HashEmbedding::new();

        let a = service.embed_one("hello world").await.unwrap();
        let b = service.embed_one("hello world").await.unwrap();

        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_dimensions() {
        let service = HashEmbedding::with_dimensions(128);
        let vector = service.embed_one("test").await.unwrap();
        assert_eq!(vector.len(), 128);
        assert_eq!(service.dimensions(), 128);
    }

    #[tokio::test]
    async fn test_normalized_and_finite() {
        let service = HashEmbedding::new();
        let vector = service.embed_one("test").await.unwrap();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.001);
        assert!(vector.iter().all(|v| v.is_finite()));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let service = HashEmbedding::new();
        let single = service.embed_one("x").await.unwrap();
        let batch = service.embed_batch(&["x".to_string()]).await.unwrap();
        assert_eq!(batch[0], single);
    }
}
