use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::VectorIndex;
use crate::domain::{Chunk, DomainError, RetrievedChunk};

/// In-memory vector index with brute-force cosine scoring. Used in tests
/// and single-shot local runs.
pub struct InMemoryVectorIndex {
    chunks: Mutex<HashMap<String, Chunk>>,
    vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(HashMap::new()),
            vectors: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), DomainError> {
        if chunks.len() != vectors.len() {
            return Err(DomainError::invalid_input(
                "Chunk and vector count mismatch".to_string(),
            ));
        }

        let mut chunk_store = self.chunks.lock().await;
        let mut vector_store = self.vectors.lock().await;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            chunk_store.insert(chunk.id().to_string(), chunk.clone());
            vector_store.insert(chunk.id().to_string(), vector.clone());
        }

        debug!("Stored {} chunks in memory", chunks.len());
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        repo_id: &str,
        commit_sha: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedChunk>, DomainError> {
        let chunk_store = self.chunks.lock().await;
        let vector_store = self.vectors.lock().await;

        let mut scored: Vec<(f32, &Chunk)> = chunk_store
            .values()
            .filter(|chunk| chunk.repo_id() == repo_id && chunk.commit_sha() == commit_sha)
            .filter_map(|chunk| {
                vector_store
                    .get(chunk.id())
                    .map(|stored| (cosine_similarity(vector, stored), chunk))
            })
            .filter(|(score, _)| *score >= score_threshold)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, chunk)| RetrievedChunk {
                chunk_id: chunk.id().to_string(),
                file_path: chunk.file_path().to_string(),
                start_line: chunk.start_line(),
                end_line: chunk.end_line(),
                content: chunk.content().to_string(),
                score,
            })
            .collect())
    }

    async fn delete_by_repository(&self, repo_id: &str) -> Result<(), DomainError> {
        let mut chunk_store = self.chunks.lock().await;
        let mut vector_store = self.vectors.lock().await;

        let ids: Vec<String> = chunk_store
            .values()
            .filter(|chunk| chunk.repo_id() == repo_id)
            .map(|chunk| chunk.id().to_string())
            .collect();

        for id in ids {
            chunk_store.remove(&id);
            vector_store.remove(&id);
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.chunks.lock().await.len() as u64)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(repo: &str, file: &str, start: u32) -> Chunk {
        Chunk::new(
            repo.to_string(),
            "sha".to_string(),
            file.to_string(),
            start,
            start + 10,
            format!("content of {}", file),
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let index = InMemoryVectorIndex::new();
        let chunks = vec![chunk("repo", "a.py", 1)];
        let vectors = vec![vec![1.0, 0.0]];

        index.upsert(&chunks, &vectors).await.unwrap();
        index.upsert(&chunks, &vectors).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_filters_by_partition() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(
                &[chunk("repo-a", "a.py", 1), chunk("repo-b", "b.py", 1)],
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        let results = index
            .search(&[1.0, 0.0], "repo-a", "sha", 10, 0.0)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "a.py");
    }

    #[tokio::test]
    async fn test_score_threshold() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(
                &[chunk("repo", "near.py", 1), chunk("repo", "far.py", 20)],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let results = index
            .search(&[1.0, 0.0], "repo", "sha", 10, 0.35)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "near.py");
    }

    #[tokio::test]
    async fn test_delete_by_repository() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(
                &[chunk("repo-a", "a.py", 1), chunk("repo-b", "b.py", 1)],
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        index.delete_by_repository("repo-a").await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
    }
}
