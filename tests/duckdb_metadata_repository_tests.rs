//! Run-claim and repository-pointer tests for the metadata store.

use codequery::{
    DuckdbMetadataRepository, IngestionRun, IngestionStatus, MetadataRepository, RepoProvider,
    Repository, RunStage,
};

fn repository() -> Repository {
    Repository::new(
        RepoProvider::Github,
        "owner".to_string(),
        "repo".to_string(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_repository_roundtrip() {
    let store = DuckdbMetadataRepository::in_memory().unwrap();
    let repo = repository();
    store.save_repository(&repo).await.unwrap();

    let found = store
        .find_repository(RepoProvider::Github, "owner", "repo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), repo.id());
    assert_eq!(found.default_branch(), "main");
    assert!(found.latest_commit_sha().is_none());

    let by_id = store.find_repository_by_id(repo.id()).await.unwrap();
    assert!(by_id.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mark_indexed_updates_pointer() {
    let store = DuckdbMetadataRepository::in_memory().unwrap();
    let repo = repository();
    store.save_repository(&repo).await.unwrap();

    store.mark_indexed(repo.id(), "abc123").await.unwrap();

    let found = store.find_repository_by_id(repo.id()).await.unwrap().unwrap();
    assert_eq!(found.latest_commit_sha(), Some("abc123"));
    assert!(found.last_indexed_at().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_claim_run_is_atomic() {
    let store = DuckdbMetadataRepository::in_memory().unwrap();
    let repo = repository();
    store.save_repository(&repo).await.unwrap();

    let run = IngestionRun::new(repo.id().to_string(), "sha".to_string());
    store.create_run(&run).await.unwrap();

    assert!(store.claim_run(run.id()).await.unwrap());
    // Second claim of the same run must lose.
    assert!(!store.claim_run(run.id()).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_only_one_running_per_repo_commit() {
    let store = DuckdbMetadataRepository::in_memory().unwrap();
    let repo = repository();
    store.save_repository(&repo).await.unwrap();

    let first = IngestionRun::new(repo.id().to_string(), "sha".to_string());
    let second = IngestionRun::new(repo.id().to_string(), "sha".to_string());
    store.create_run(&first).await.unwrap();
    store.create_run(&second).await.unwrap();

    assert!(store.claim_run(first.id()).await.unwrap());
    // A sibling run for the same (repo, commit) cannot start while the
    // first is running.
    assert!(!store.claim_run(second.id()).await.unwrap());

    // Once the first finishes, the sibling may be claimed.
    store.complete_run(first.id(), false).await.unwrap();
    assert!(store.claim_run(second.id()).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stage_advances_are_persisted() {
    let store = DuckdbMetadataRepository::in_memory().unwrap();
    let repo = repository();
    store.save_repository(&repo).await.unwrap();

    let run = IngestionRun::new(repo.id().to_string(), "sha".to_string());
    store.create_run(&run).await.unwrap();
    store.claim_run(run.id()).await.unwrap();

    for stage in [
        RunStage::Clone,
        RunStage::Index,
        RunStage::Graph,
        RunStage::Embed,
        RunStage::Archive,
    ] {
        store.advance_run(run.id(), stage).await.unwrap();
        let found = store.find_run(run.id()).await.unwrap().unwrap();
        assert_eq!(found.stage(), Some(stage));
        assert_eq!(found.status(), IngestionStatus::Running);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fail_run_records_error() {
    let store = DuckdbMetadataRepository::in_memory().unwrap();
    let repo = repository();
    store.save_repository(&repo).await.unwrap();

    let run = IngestionRun::new(repo.id().to_string(), "sha".to_string());
    store.create_run(&run).await.unwrap();
    store.claim_run(run.id()).await.unwrap();
    store
        .fail_run(run.id(), "Repository unavailable: boom")
        .await
        .unwrap();

    let found = store.find_run(run.id()).await.unwrap().unwrap();
    assert_eq!(found.status(), IngestionStatus::Failed);
    assert_eq!(found.error(), Some("Repository unavailable: boom"));
    assert!(found.finished_at().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fail_does_not_overwrite_terminal_state() {
    let store = DuckdbMetadataRepository::in_memory().unwrap();
    let repo = repository();
    store.save_repository(&repo).await.unwrap();

    let run = IngestionRun::new(repo.id().to_string(), "sha".to_string());
    store.create_run(&run).await.unwrap();
    store.claim_run(run.id()).await.unwrap();
    store.complete_run(run.id(), true).await.unwrap();

    store.fail_run(run.id(), "late failure").await.unwrap();

    let found = store.find_run(run.id()).await.unwrap().unwrap();
    assert_eq!(found.status(), IngestionStatus::Completed);
    assert!(found.degraded());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_repository_removes_runs() {
    let store = DuckdbMetadataRepository::in_memory().unwrap();
    let repo = repository();
    store.save_repository(&repo).await.unwrap();

    let run = IngestionRun::new(repo.id().to_string(), "sha".to_string());
    store.create_run(&run).await.unwrap();

    store.delete_repository(repo.id()).await.unwrap();

    assert!(store.find_repository_by_id(repo.id()).await.unwrap().is_none());
    assert!(store.find_run(run.id()).await.unwrap().is_none());
}
