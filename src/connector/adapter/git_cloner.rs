use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::{ClonerService, RepoRef, WorkTree};
use crate::domain::{DomainError, RepoProvider};

/// Scratch checkout backed by a temp directory; removed on drop.
struct ScratchWorkTree {
    dir: TempDir,
}

impl WorkTree for ScratchWorkTree {
    fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Clones repositories by driving the `git` CLI.
///
/// Only shallow data is ever fetched: depth 1, single branch, no tags.
/// Every network failure surfaces as `RepoUnavailable`; the caller owns
/// the overall clone deadline.
pub struct GitCloner;

impl GitCloner {
    pub fn new() -> Self {
        Self
    }

    async fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<Output, DomainError> {
        let mut command = Command::new("git");
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        // Never prompt for credentials inside a worker.
        command.env("GIT_TERMINAL_PROMPT", "0");

        command
            .output()
            .await
            .map_err(|e| DomainError::repo_unavailable(format!("failed to spawn git: {}", e)))
    }
}

impl Default for GitCloner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClonerService for GitCloner {
    fn parse_url(&self, url: &str) -> Result<RepoRef, DomainError> {
        let mut clean = url.trim().to_string();
        if clean.is_empty() {
            return Err(DomainError::invalid_repo_url("empty URL"));
        }
        if let Some(stripped) = clean.strip_suffix(".git") {
            clean = stripped.to_string();
        }
        if let Some((_, rest)) = clean.split_once("://") {
            clean = rest.to_string();
        }

        let parts: Vec<&str> = clean.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() < 3 {
            return Err(DomainError::invalid_repo_url(format!(
                "expected host/owner/name, got '{}'",
                url
            )));
        }

        let domain = parts[0].to_lowercase();
        let provider = if domain.contains("gitlab") {
            RepoProvider::Gitlab
        } else if domain.contains("bitbucket") {
            RepoProvider::Bitbucket
        } else {
            RepoProvider::Github
        };

        Ok(RepoRef {
            provider,
            owner: parts[1].to_string(),
            name: parts[2].to_string(),
        })
    }

    async fn resolve_head(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
    ) -> Result<String, DomainError> {
        let url = repo.provider.clone_url(&repo.owner, &repo.name);
        let refspec = match branch {
            Some(branch) => format!("refs/heads/{}", branch),
            None => "HEAD".to_string(),
        };

        debug!("Resolving {} {}", url, refspec);
        let output = Self::run_git(&["ls-remote", &url, &refspec], None).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomainError::repo_unavailable(format!(
                "ls-remote failed for {}: {}",
                url,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .split_whitespace()
            .next()
            .filter(|sha| !sha.is_empty())
            .map(String::from)
            .ok_or_else(|| {
                DomainError::repo_unavailable(format!(
                    "could not resolve {} for {}",
                    refspec,
                    repo.full_name()
                ))
            })
    }

    async fn clone_at(
        &self,
        repo: &RepoRef,
        commit_sha: &str,
    ) -> Result<Box<dyn WorkTree>, DomainError> {
        let url = repo.provider.clone_url(&repo.owner, &repo.name);
        let dir = TempDir::with_prefix(format!("codequery_{}_", repo.name))
            .map_err(|e| DomainError::internal(format!("failed to create scratch dir: {}", e)))?;
        let target = dir.path().to_string_lossy().to_string();

        debug!("Cloning {} at {} into {}", url, commit_sha, target);

        // Shallow fetch of exactly one commit: init, add remote, fetch the
        // sha at depth 1, check it out. Servers without allow-any-sha1
        // support fall back to a depth-1 branch clone.
        let init = Self::run_git(&["init", "--quiet", &target], None).await?;
        if !init.status.success() {
            return Err(DomainError::internal("git init failed"));
        }

        Self::run_git(&["remote", "add", "origin", &url], Some(dir.path())).await?;

        let fetch = Self::run_git(
            &["fetch", "--quiet", "--depth", "1", "--no-tags", "origin", commit_sha],
            Some(dir.path()),
        )
        .await?;

        if !fetch.status.success() {
            warn!(
                "Direct commit fetch failed for {}, falling back to branch clone",
                repo.full_name()
            );
            let fallback = Self::run_git(
                &["fetch", "--quiet", "--depth", "1", "--no-tags", "origin"],
                Some(dir.path()),
            )
            .await?;
            if !fallback.status.success() {
                let stderr = String::from_utf8_lossy(&fallback.stderr);
                return Err(DomainError::repo_unavailable(format!(
                    "fetch failed for {}: {}",
                    url,
                    stderr.trim()
                )));
            }
        }

        let checkout = Self::run_git(
            &["checkout", "--quiet", commit_sha],
            Some(dir.path()),
        )
        .await?;
        if !checkout.status.success() {
            let stderr = String::from_utf8_lossy(&checkout.stderr);
            return Err(DomainError::repo_unavailable(format!(
                "checkout of {} failed: {}",
                commit_sha,
                stderr.trim()
            )));
        }

        Ok(Box::new(ScratchWorkTree { dir }))
    }
}
