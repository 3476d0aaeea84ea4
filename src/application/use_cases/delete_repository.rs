use std::sync::Arc;

use tracing::info;

use crate::application::{MetadataRepository, ObjectStore, SymbolStore, VectorIndex};
use crate::domain::{repository_prefix, DomainError};

/// Cascade-deletes a repository: vectors, symbols, relationships, stored
/// artifacts, then the metadata pointer itself.
pub struct DeleteRepositoryUseCase {
    metadata: Arc<dyn MetadataRepository>,
    symbol_store: Arc<dyn SymbolStore>,
    vector_index: Arc<dyn VectorIndex>,
    object_store: Arc<dyn ObjectStore>,
}

impl DeleteRepositoryUseCase {
    pub fn new(
        metadata: Arc<dyn MetadataRepository>,
        symbol_store: Arc<dyn SymbolStore>,
        vector_index: Arc<dyn VectorIndex>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            metadata,
            symbol_store,
            vector_index,
            object_store,
        }
    }

    pub async fn execute(&self, repo_id: &str) -> Result<(), DomainError> {
        let repository = self
            .metadata
            .find_repository_by_id(repo_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("repository {}", repo_id)))?;

        info!("Deleting repository {} ({})", repository.full_name(), repo_id);

        self.vector_index.delete_by_repository(repo_id).await?;
        self.symbol_store.delete_by_repository(repo_id).await?;
        self.object_store
            .delete_prefix(&repository_prefix(
                repository.provider(),
                repository.owner(),
                repository.name(),
            ))
            .await?;
        self.metadata.delete_repository(repo_id).await?;

        info!("Repository {} deleted", repository.full_name());
        Ok(())
    }
}
