use std::path::Path;

use async_trait::async_trait;

use crate::domain::{DomainError, RepoProvider};

/// A parsed repository pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub provider: RepoProvider,
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// A checked-out working tree in scratch space. The directory is released
/// when the handle drops, including on failure paths.
pub trait WorkTree: Send + Sync {
    fn path(&self) -> &Path;
}

/// Resolves and clones remote repositories.
#[async_trait]
pub trait ClonerService: Send + Sync {
    /// Parse `https://github.com/owner/name[.git]` into its parts.
    /// Malformed URLs are rejected with `InvalidRepoUrl`.
    fn parse_url(&self, url: &str) -> Result<RepoRef, DomainError>;

    /// Resolve the remote HEAD (or a named branch) to a commit SHA without
    /// cloning. Network failures surface as `RepoUnavailable`.
    async fn resolve_head(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
    ) -> Result<String, DomainError>;

    /// Shallow-clone a specific commit (depth 1, single branch, no tags)
    /// into a scratch directory and return its handle.
    async fn clone_at(
        &self,
        repo: &RepoRef,
        commit_sha: &str,
    ) -> Result<Box<dyn WorkTree>, DomainError>;
}
