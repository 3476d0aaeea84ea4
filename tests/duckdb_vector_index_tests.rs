//! Upsert/search tests for the DuckDB vector index.

use codequery::{
    Chunk, DuckdbMetadataRepository, DuckdbVectorIndex, VectorIndex,
};

const DIMS: usize = 4;

async fn index() -> DuckdbVectorIndex {
    let metadata = DuckdbMetadataRepository::in_memory().expect("open duckdb");
    DuckdbVectorIndex::with_connection(metadata.shared_connection(), DIMS)
        .await
        .expect("vector schema")
}

fn chunk(repo: &str, file: &str, start: u32) -> Chunk {
    Chunk::new(
        repo.to_string(),
        "sha".to_string(),
        file.to_string(),
        start,
        start + 10,
        format!("// File: {} (Lines {}-{})\ncontent", file, start, start + 10),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upsert_and_search() {
    let index = index().await;

    index
        .upsert(
            &[chunk("repo", "a.py", 1), chunk("repo", "b.py", 1)],
            &[vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
        )
        .await
        .unwrap();

    let results = index
        .search(&[1.0, 0.0, 0.0, 0.0], "repo", "sha", 10, 0.35)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_path, "a.py");
    assert!(results[0].score > 0.99);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_repeated_upsert_does_not_duplicate() {
    let index = index().await;
    let chunks = vec![chunk("repo", "a.py", 1)];
    let vectors = vec![vec![1.0, 0.0, 0.0, 0.0]];

    index.upsert(&chunks, &vectors).await.unwrap();
    index.upsert(&chunks, &vectors).await.unwrap();

    assert_eq!(index.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_filters_by_commit() {
    let index = index().await;
    index
        .upsert(&[chunk("repo", "a.py", 1)], &[vec![1.0, 0.0, 0.0, 0.0]])
        .await
        .unwrap();

    let other_commit = index
        .search(&[1.0, 0.0, 0.0, 0.0], "repo", "other-sha", 10, 0.0)
        .await
        .unwrap();
    assert!(other_commit.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dimension_mismatch_rejected() {
    let index = index().await;
    let result = index
        .upsert(&[chunk("repo", "a.py", 1)], &[vec![1.0, 0.0]])
        .await;
    assert!(result.is_err());

    let result = index.search(&[1.0, 0.0], "repo", "sha", 10, 0.0).await;
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_finite_vectors_rejected() {
    let index = index().await;
    let result = index
        .upsert(
            &[chunk("repo", "a.py", 1)],
            &[vec![f32::NAN, 0.0, 0.0, 0.0]],
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_by_repository() {
    let index = index().await;
    index
        .upsert(
            &[chunk("repo-a", "a.py", 1), chunk("repo-b", "b.py", 1)],
            &[vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0, 0.0]],
        )
        .await
        .unwrap();

    index.delete_by_repository("repo-a").await.unwrap();
    assert_eq!(index.count().await.unwrap(), 1);
}
