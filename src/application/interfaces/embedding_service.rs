use async_trait::async_trait;

use crate::domain::DomainError;

/// Generates fixed-dimension vector embeddings from text.
///
/// `embed_batch` is the performance path; implementations bound batch size
/// and callers should prefer one batched call over many single calls.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;

    /// Vector dimension, fixed per model instance.
    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}
