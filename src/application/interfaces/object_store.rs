use async_trait::async_trait;

use crate::domain::DomainError;

/// Durable blob storage for per-commit artifacts (source tarballs, graph
/// snapshots, manifests).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object. Writes are atomic per key; re-putting the same key
    /// is allowed and replaces the object.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<(), DomainError>;

    /// Fetch an object into memory. Implementations cap the size they are
    /// willing to buffer and return a storage error beyond it.
    async fn get(&self, key: &str) -> Result<Vec<u8>, DomainError>;

    async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError>;

    /// Remove every object under a key prefix.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), DomainError>;
}
