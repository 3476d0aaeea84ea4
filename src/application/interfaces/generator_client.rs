use async_trait::async_trait;

use crate::domain::DomainError;

/// Single-turn text generation against a remote language model.
#[async_trait]
pub trait GeneratorClient: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, DomainError>;
}
