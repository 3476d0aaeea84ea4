use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use crate::application::ObjectStore;
use crate::domain::DomainError;

/// Largest object the store will buffer into memory on `get`.
const MAX_GET_BYTES: u64 = 10 * 1024 * 1024;

/// Filesystem-backed object store. Keys map to paths under the root;
/// writes go through a temp file and rename so readers never observe a
/// partial object.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, DomainError> {
        if key.split('/').any(|segment| segment == "..") {
            return Err(DomainError::invalid_input(format!(
                "object key must not traverse upward: {}",
                key
            )));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DomainError> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::storage(format!("mkdir failed for {}: {}", key, e)))?;
        }

        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, &data)
            .await
            .map_err(|e| DomainError::storage(format!("write failed for {}: {}", key, e)))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| DomainError::storage(format!("rename failed for {}: {}", key, e)))?;

        debug!("Stored {} ({} bytes, {})", key, data.len(), content_type);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, DomainError> {
        let path = self.key_path(key)?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| DomainError::not_found(format!("object {}", key)))?;
        if metadata.len() > MAX_GET_BYTES {
            return Err(DomainError::storage(format!(
                "object {} is too large to buffer ({} bytes)",
                key,
                metadata.len()
            )));
        }

        tokio::fs::read(&path)
            .await
            .map_err(|e| DomainError::storage(format!("read failed for {}: {}", key, e)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError> {
        let base = self.key_path(prefix)?;
        if !base.exists() {
            return Ok(vec![]);
        }

        let root = self.root.clone();
        let keys = tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            for entry in WalkDir::new(&base).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    if let Ok(relative) = entry.path().strip_prefix(&root) {
                        keys.push(relative.to_string_lossy().replace('\\', "/"));
                    }
                }
            }
            keys.sort();
            keys
        })
        .await
        .map_err(|e| DomainError::internal(format!("list task failed: {}", e)))?;

        Ok(keys)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), DomainError> {
        let path = self.key_path(prefix)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::storage(format!(
                "delete failed for {}: {}",
                prefix, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, store) = store();

        store
            .put("github/o/r/sha/manifest", b"{}".to_vec(), "application/json")
            .await
            .unwrap();

        let data = store.get("github/o/r/sha/manifest").await.unwrap();
        assert_eq!(data, b"{}");
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (_dir, store) = store();

        store.put("k", b"one".to_vec(), "text/plain").await.unwrap();
        store.put("k", b"two".to_vec(), "text/plain").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.get("absent").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_and_delete_prefix() {
        let (_dir, store) = store();
        store
            .put("github/o/r/sha1/manifest", b"a".to_vec(), "application/json")
            .await
            .unwrap();
        store
            .put("github/o/r/sha2/manifest", b"b".to_vec(), "application/json")
            .await
            .unwrap();

        let keys = store.list("github/o/r").await.unwrap();
        assert_eq!(keys.len(), 2);

        store.delete_prefix("github/o/r").await.unwrap();
        assert!(store.list("github/o/r").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let (_dir, store) = store();
        assert!(store.get("../../etc/passwd").await.is_err());
    }
}
