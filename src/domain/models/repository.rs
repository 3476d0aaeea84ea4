use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Hosting provider a repository was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepoProvider {
    #[default]
    Github,
    Gitlab,
    Bitbucket,
}

impl RepoProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoProvider::Github => "github",
            RepoProvider::Gitlab => "gitlab",
            RepoProvider::Bitbucket => "bitbucket",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "github" => RepoProvider::Github,
            "gitlab" => RepoProvider::Gitlab,
            "bitbucket" => RepoProvider::Bitbucket,
            unknown => {
                warn!("Unknown provider '{}', defaulting to GitHub", unknown);
                RepoProvider::Github
            }
        }
    }

    pub fn clone_url(&self, owner: &str, name: &str) -> String {
        match self {
            RepoProvider::Github => format!("https://github.com/{}/{}.git", owner, name),
            RepoProvider::Gitlab => format!("https://gitlab.com/{}/{}.git", owner, name),
            RepoProvider::Bitbucket => format!("https://bitbucket.org/{}/{}.git", owner, name),
        }
    }
}

impl std::fmt::Display for RepoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A versioned source tree, unique by `(provider, owner, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    id: String,
    provider: RepoProvider,
    owner: String,
    name: String,
    default_branch: String,
    is_private: bool,
    latest_commit_sha: Option<String>,
    last_indexed_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl Repository {
    pub fn new(provider: RepoProvider, owner: String, name: String) -> Self {
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            provider,
            owner,
            name,
            default_branch: "main".to_string(),
            is_private: false,
            latest_commit_sha: None,
            last_indexed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn with_private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        provider: RepoProvider,
        owner: String,
        name: String,
        default_branch: String,
        is_private: bool,
        latest_commit_sha: Option<String>,
        last_indexed_at: Option<i64>,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            id,
            provider,
            owner,
            name,
            default_branch,
            is_private,
            latest_commit_sha,
            last_indexed_at,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> RepoProvider {
        self.provider
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn latest_commit_sha(&self) -> Option<&str> {
        self.latest_commit_sha.as_deref()
    }

    pub fn last_indexed_at(&self) -> Option<i64> {
        self.last_indexed_at
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn is_indexed(&self) -> bool {
        self.latest_commit_sha.is_some()
    }

    /// Record a successfully indexed commit. Called by the coordinator on
    /// run completion, never by query paths.
    pub fn mark_indexed(&mut self, commit_sha: impl Into<String>) {
        self.latest_commit_sha = Some(commit_sha.into());
        let now = current_timestamp();
        self.last_indexed_at = Some(now);
        self.updated_at = now;
    }
}

pub(crate) fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Lifecycle of an ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Pending => "pending",
            IngestionStatus::Running => "running",
            IngestionStatus::Completed => "completed",
            IngestionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => IngestionStatus::Pending,
            "running" => IngestionStatus::Running,
            "completed" => IngestionStatus::Completed,
            _ => IngestionStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestionStatus::Completed | IngestionStatus::Failed)
    }
}

/// Pipeline stage a running ingestion has reached. Each advance is
/// committed before the next stage starts, so a crashed worker leaves a
/// durable trace of how far it got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Clone,
    Index,
    Graph,
    Embed,
    Archive,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Clone => "clone",
            RunStage::Index => "index",
            RunStage::Graph => "graph",
            RunStage::Embed => "embed",
            RunStage::Archive => "archive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clone" => Some(RunStage::Clone),
            "index" => Some(RunStage::Index),
            "graph" => Some(RunStage::Graph),
            "embed" => Some(RunStage::Embed),
            "archive" => Some(RunStage::Archive),
            _ => None,
        }
    }
}

/// One attempt to process a specific `(repo, commit)` through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRun {
    id: String,
    repo_id: String,
    commit_sha: String,
    status: IngestionStatus,
    stage: Option<RunStage>,
    degraded: bool,
    started_at: i64,
    finished_at: Option<i64>,
    error: Option<String>,
}

impl IngestionRun {
    pub fn new(repo_id: String, commit_sha: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            repo_id,
            commit_sha,
            status: IngestionStatus::Pending,
            stage: None,
            degraded: false,
            started_at: current_timestamp(),
            finished_at: None,
            error: None,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repo_id: String,
        commit_sha: String,
        status: IngestionStatus,
        stage: Option<RunStage>,
        degraded: bool,
        started_at: i64,
        finished_at: Option<i64>,
        error: Option<String>,
    ) -> Self {
        Self {
            id,
            repo_id,
            commit_sha,
            status,
            stage,
            degraded,
            started_at,
            finished_at,
            error,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }

    pub fn status(&self) -> IngestionStatus {
        self.status
    }

    pub fn stage(&self) -> Option<RunStage> {
        self.stage
    }

    pub fn degraded(&self) -> bool {
        self.degraded
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<i64> {
        self.finished_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_creation() {
        let repo = Repository::new(
            RepoProvider::Github,
            "tiangolo".to_string(),
            "fastapi".to_string(),
        );

        assert_eq!(repo.full_name(), "tiangolo/fastapi");
        assert_eq!(repo.default_branch(), "main");
        assert!(!repo.is_indexed());
        assert!(repo.latest_commit_sha().is_none());
    }

    #[test]
    fn test_mark_indexed() {
        let mut repo =
            Repository::new(RepoProvider::Github, "owner".to_string(), "repo".to_string());

        repo.mark_indexed("abc123");

        assert!(repo.is_indexed());
        assert_eq!(repo.latest_commit_sha(), Some("abc123"));
        assert!(repo.last_indexed_at().is_some());
    }

    #[test]
    fn test_provider_clone_url() {
        assert_eq!(
            RepoProvider::Github.clone_url("owner", "repo"),
            "https://github.com/owner/repo.git"
        );
        assert_eq!(
            RepoProvider::Gitlab.clone_url("owner", "repo"),
            "https://gitlab.com/owner/repo.git"
        );
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            IngestionStatus::Pending,
            IngestionStatus::Running,
            IngestionStatus::Completed,
            IngestionStatus::Failed,
        ] {
            assert_eq!(IngestionStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_new_run_is_pending() {
        let run = IngestionRun::new("repo-1".to_string(), "sha-1".to_string());
        assert_eq!(run.status(), IngestionStatus::Pending);
        assert!(run.stage().is_none());
        assert!(!run.degraded());
        assert!(run.error().is_none());
    }
}
