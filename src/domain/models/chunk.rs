use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A bounded line-range of source text suitable for embedding.
///
/// Chunk ids are a SHA-256 over `(repo_id, commit_sha, file_path,
/// start_line)`, so re-ingesting the same commit upserts rather than
/// duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    id: String,
    repo_id: String,
    commit_sha: String,
    file_path: String,
    start_line: u32,
    end_line: u32,
    content: String,
}

impl Chunk {
    pub fn new(
        repo_id: String,
        commit_sha: String,
        file_path: String,
        start_line: u32,
        end_line: u32,
        content: String,
    ) -> Self {
        let id = Self::deterministic_id(&repo_id, &commit_sha, &file_path, start_line);
        Self {
            id,
            repo_id,
            commit_sha,
            file_path,
            start_line,
            end_line,
            content,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repo_id: String,
        commit_sha: String,
        file_path: String,
        start_line: u32,
        end_line: u32,
        content: String,
    ) -> Self {
        Self {
            id,
            repo_id,
            commit_sha,
            file_path,
            start_line,
            end_line,
            content,
        }
    }

    pub fn deterministic_id(
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
        start_line: u32,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}:{}:{}:{}",
            repo_id, commit_sha, file_path, start_line
        ));
        format!("{:x}", hasher.finalize())
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

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_deterministic() {
        let a = Chunk::new(
            "repo".to_string(),
            "sha".to_string(),
            "src/lib.rs".to_string(),
            1,
            300,
            "fn main() {}".to_string(),
        );
        let b = Chunk::new(
            "repo".to_string(),
            "sha".to_string(),
            "src/lib.rs".to_string(),
            1,
            300,
            "different content, same identity".to_string(),
        );

        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().len(), 64);
    }

    #[test]
    fn test_chunk_id_varies_by_start_line() {
        let a = Chunk::deterministic_id("repo", "sha", "f.py", 1);
        let b = Chunk::deterministic_id("repo", "sha", "f.py", 251);
        assert_ne!(a, b);
    }

    #[test]
    fn test_line_count() {
        let chunk = Chunk::new(
            "r".to_string(),
            "s".to_string(),
            "f".to_string(),
            251,
            300,
            "x".to_string(),
        );
        assert_eq!(chunk.line_count(), 50);
        assert_eq!(chunk.location(), "f:251-300");
    }
}
