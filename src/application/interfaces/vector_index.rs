use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, RetrievedChunk};

/// Vector storage and similarity search over embedded chunks.
///
/// Upserts are keyed by the chunks' deterministic ids, so re-ingesting a
/// commit never duplicates points.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), DomainError>;

    /// Cosine search filtered to one `(repo, commit)` partition. Results
    /// below `score_threshold` are dropped.
    async fn search(
        &self,
        vector: &[f32],
        repo_id: &str,
        commit_sha: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedChunk>, DomainError>;

    async fn delete_by_repository(&self, repo_id: &str) -> Result<(), DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;
}
