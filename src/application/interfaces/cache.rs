use std::time::Duration;

use async_trait::async_trait;

/// A keyed TTL cache over remote work.
///
/// Deliberately infallible at the trait boundary: cache infrastructure
/// problems are logged inside the adapter and surface as misses, never as
/// errors.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

/// Cache key for an embedding: SHA-256 over the exact text.
pub fn embedding_cache_key(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("embedding:{:x}", hasher.finalize())
}

/// Cache key for a query result: SHA-256 over query, repo and commit.
pub fn query_cache_key(query: &str, repo_id: &str, commit_sha: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(repo_id.as_bytes());
    hasher.update(commit_sha.as_bytes());
    format!("query:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_key_is_stable() {
        assert_eq!(
            embedding_cache_key("fn main() {}"),
            embedding_cache_key("fn main() {}")
        );
        assert_ne!(embedding_cache_key("a"), embedding_cache_key("b"));
    }

    #[test]
    fn test_query_key_scoped_by_commit() {
        let a = query_cache_key("who calls main", "repo", "sha1");
        let b = query_cache_key("who calls main", "repo", "sha2");
        assert_ne!(a, b);
    }
}
