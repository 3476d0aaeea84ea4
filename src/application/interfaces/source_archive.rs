use std::path::Path;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Packs working trees into archive bytes and opens them for reading.
#[async_trait]
pub trait SourcePackager: Send + Sync {
    /// Produce a gzip tarball of a working tree.
    async fn pack(&self, root: &Path) -> Result<Vec<u8>, DomainError>;

    /// Open archive bytes for random-access file reads.
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn SourceArchive>, DomainError>;
}

/// Read access to the files of one archived source tree.
///
/// The call-graph builder re-reads function bodies through this rather
/// than the scratch clone, so graph passes can run against any commit
/// whose `source_tree` artifact exists.
#[async_trait]
pub trait SourceArchive: Send + Sync {
    /// Fetch a file's text by repository-relative path. Returns `None`
    /// when the path is absent from the archive or not valid UTF-8.
    async fn read_file(&self, path: &str) -> Result<Option<String>, DomainError>;
}
