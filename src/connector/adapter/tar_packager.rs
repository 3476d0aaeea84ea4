use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::application::{SourceArchive, SourcePackager};
use crate::domain::DomainError;

/// Packs working trees as gzip tarballs and opens them fully decoded in
/// memory. Binary entries are skipped at open time.
pub struct TarPackager;

impl TarPackager {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TarPackager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePackager for TarPackager {
    async fn pack(&self, root: &Path) -> Result<Vec<u8>, DomainError> {
        let root: PathBuf = root.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let encoder = GzEncoder::new(Vec::new(), Compression::default());
            let mut builder = tar::Builder::new(encoder);
            builder.follow_symlinks(false);
            builder
                .append_dir_all("", &root)
                .map_err(|e| DomainError::storage(format!("tarball build failed: {}", e)))?;
            let encoder = builder
                .into_inner()
                .map_err(|e| DomainError::storage(format!("tarball finalize failed: {}", e)))?;
            encoder
                .finish()
                .map_err(|e| DomainError::storage(format!("gzip finalize failed: {}", e)))
        })
        .await
        .map_err(|e| DomainError::internal(format!("pack task failed: {}", e)))?
    }

    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn SourceArchive>, DomainError> {
        let decoder = GzDecoder::new(bytes.as_slice());
        let mut archive = tar::Archive::new(decoder);

        let mut files = HashMap::new();
        let entries = archive
            .entries()
            .map_err(|e| DomainError::storage(format!("tarball open failed: {}", e)))?;

        for entry in entries {
            let mut entry =
                entry.map_err(|e| DomainError::storage(format!("tarball entry failed: {}", e)))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry
                .path()
                .map_err(|e| DomainError::storage(format!("tarball path failed: {}", e)))?
                .to_string_lossy()
                .replace('\\', "/");
            // `.git` internals are never useful to graph passes.
            if path.split('/').any(|segment| segment == ".git") {
                continue;
            }

            let mut content = String::new();
            if entry.read_to_string(&mut content).is_ok() {
                files.insert(path, content);
            }
        }

        debug!("Opened source archive with {} text files", files.len());
        Ok(Box::new(InMemoryArchive { files }))
    }
}

struct InMemoryArchive {
    files: HashMap<String, String>,
}

#[async_trait]
impl SourceArchive for InMemoryArchive {
    async fn read_file(&self, path: &str) -> Result<Option<String>, DomainError> {
        Ok(self.files.get(path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pack_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/main.py"), "print('hi')\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme\n").unwrap();

        let packager = TarPackager::new();
        let bytes = packager.pack(dir.path()).await.unwrap();
        let archive = packager.open(bytes).unwrap();

        let main = archive.read_file("app/main.py").await.unwrap();
        assert_eq!(main.as_deref(), Some("print('hi')\n"));

        let missing = archive.read_file("app/absent.py").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_binary_entries_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x01]).unwrap();
        std::fs::write(dir.path().join("ok.py"), "x = 1\n").unwrap();

        let packager = TarPackager::new();
        let bytes = packager.pack(dir.path()).await.unwrap();
        let archive = packager.open(bytes).unwrap();

        assert!(archive.read_file("blob.bin").await.unwrap().is_none());
        assert!(archive.read_file("ok.py").await.unwrap().is_some());
    }
}
