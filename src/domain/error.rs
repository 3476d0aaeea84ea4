use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid repository URL: {0}")]
    InvalidRepoUrl(String),

    #[error("Repository unavailable: {0}")]
    RepoUnavailable(String),

    #[error("Clone timed out: {0}")]
    CloneTimeout(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Generator unavailable: {0}")]
    GeneratorUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid_repo_url(msg: impl Into<String>) -> Self {
        Self::InvalidRepoUrl(msg.into())
    }

    pub fn repo_unavailable(msg: impl Into<String>) -> Self {
        Self::RepoUnavailable(msg.into())
    }

    pub fn clone_timeout(msg: impl Into<String>) -> Self {
        Self::CloneTimeout(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingError(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn generator(msg: impl Into<String>) -> Self {
        Self::GeneratorUnavailable(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }
}
