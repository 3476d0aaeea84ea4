use async_trait::async_trait;

use crate::domain::{DomainError, IngestionRun, RepoProvider, Repository, RunStage};

/// Persistence for repository pointers and ingestion run records.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn save_repository(&self, repository: &Repository) -> Result<(), DomainError>;

    async fn find_repository(
        &self,
        provider: RepoProvider,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>, DomainError>;

    async fn find_repository_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError>;

    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError>;

    /// Record a successfully indexed commit on the repository pointer.
    async fn mark_indexed(&self, repo_id: &str, commit_sha: &str) -> Result<(), DomainError>;

    async fn delete_repository(&self, repo_id: &str) -> Result<(), DomainError>;

    async fn create_run(&self, run: &IngestionRun) -> Result<(), DomainError>;

    /// Atomically transition a run PENDING → RUNNING. Returns `false` when
    /// the run was already claimed, finished, or another run for the same
    /// `(repo, commit)` is currently RUNNING; the caller must then no-op.
    async fn claim_run(&self, run_id: &str) -> Result<bool, DomainError>;

    /// Advance a running ingestion to the given stage. Committed before
    /// the stage's work begins.
    async fn advance_run(&self, run_id: &str, stage: RunStage) -> Result<(), DomainError>;

    async fn complete_run(&self, run_id: &str, degraded: bool) -> Result<(), DomainError>;

    async fn fail_run(&self, run_id: &str, error: &str) -> Result<(), DomainError>;

    async fn find_run(&self, run_id: &str) -> Result<Option<IngestionRun>, DomainError>;
}
