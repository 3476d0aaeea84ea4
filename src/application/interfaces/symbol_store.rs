use async_trait::async_trait;

use crate::domain::{CallChainNode, CodeSymbol, DomainError, SymbolRelationship, SymbolType};

/// Persistence and graph queries for code symbols and their relationships.
///
/// Transitive lookups are depth-limited and carry a visited-set through the
/// recursion, so they terminate in bounded time on cyclic graphs.
#[async_trait]
pub trait SymbolStore: Send + Sync {
    /// Save a batch of symbols (one file's worth, typically).
    async fn save_symbols(&self, symbols: &[CodeSymbol]) -> Result<(), DomainError>;

    /// Save a batch of relationships.
    async fn save_relationships(
        &self,
        relationships: &[SymbolRelationship],
    ) -> Result<(), DomainError>;

    /// Load every symbol for a `(repo, commit)` partition.
    async fn load_symbols(
        &self,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Vec<CodeSymbol>, DomainError>;

    async fn find_by_id(&self, symbol_id: &str) -> Result<Option<CodeSymbol>, DomainError>;

    /// Find symbols by name. With `fuzzy`, matches on name similarity
    /// (floor 0.3) ordered best-first instead of exact equality.
    async fn find_by_name(
        &self,
        repo_id: &str,
        commit_sha: &str,
        name: &str,
        fuzzy: bool,
        limit: usize,
    ) -> Result<Vec<CodeSymbol>, DomainError>;

    async fn find_by_type(
        &self,
        repo_id: &str,
        commit_sha: &str,
        symbol_type: SymbolType,
        limit: usize,
    ) -> Result<Vec<CodeSymbol>, DomainError>;

    async fn find_in_file(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<CodeSymbol>, DomainError>;

    /// Symbols whose `calls` edges reach the given symbol, up to
    /// `max_depth` hops away (reverse traversal).
    async fn find_callers(
        &self,
        symbol_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CodeSymbol>, DomainError>;

    /// Symbols reachable from the given symbol through `calls` edges, up
    /// to `max_depth` hops (forward traversal).
    async fn find_callees(
        &self,
        symbol_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CodeSymbol>, DomainError>;

    /// First call path found from one symbol to another, or an empty
    /// vector when none exists within `max_depth`. A path from a symbol to
    /// itself is the single-node path.
    async fn find_call_path(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CallChainNode>, DomainError>;

    /// Files the given file imports from (via `imports` edges).
    async fn file_dependencies(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<String>, DomainError>;

    /// Files that import from the given file.
    async fn file_dependents(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<String>, DomainError>;

    /// Symbol counts grouped by type for a `(repo, commit)`.
    async fn stats(
        &self,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Vec<(String, u64)>, DomainError>;

    /// Remove every symbol and relationship belonging to a repository,
    /// across all commits.
    async fn delete_by_repository(&self, repo_id: &str) -> Result<(), DomainError>;
}
