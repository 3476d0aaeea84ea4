use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::{ImportGraph, ImportResolver, ParserService, SourceArchive};
use crate::domain::{
    CodeSymbol, DomainError, RelationshipType, SymbolRelationship, SymbolType,
};

/// Counts reported after a graph build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraphStats {
    pub call_relationships: u64,
    pub import_relationships: u64,
    pub inheritance_relationships: u64,
    pub unresolved_calls: u64,
    pub files_analyzed: u64,
}

/// Builds `calls` and `inherits` edges for one `(repo, commit)`.
///
/// Function bodies are re-read from the archived source tree and
/// re-parsed; each call site is resolved through local symbols, then the
/// import map, then a global name scan. Unresolved calls are counted but
/// never persisted. The lookup caches are per-build.
pub struct CallGraphBuilder {
    parser: Arc<dyn ParserService>,
}

impl CallGraphBuilder {
    pub fn new(parser: Arc<dyn ParserService>) -> Self {
        Self { parser }
    }

    pub async fn build(
        &self,
        repo_id: &str,
        commit_sha: &str,
        symbols: &[CodeSymbol],
        source: &dyn SourceArchive,
    ) -> Result<(Vec<SymbolRelationship>, CallGraphStats), DomainError> {
        info!("Building call graph over {} symbols", symbols.len());

        let cache = SymbolCache::new(symbols);
        let import_graph = ImportResolver::new().build_import_graph(symbols);

        let mut symbols_by_file: HashMap<&str, Vec<&CodeSymbol>> = HashMap::new();
        for symbol in symbols {
            symbols_by_file
                .entry(symbol.file_path())
                .or_default()
                .push(symbol);
        }

        let mut relationships = Vec::new();
        let mut stats = CallGraphStats::default();

        for (file_path, file_symbols) in &symbols_by_file {
            let content = match source.read_file(file_path).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    warn!("No archived source for {}, skipping call analysis", file_path);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to read {} from archive: {}", file_path, e);
                    continue;
                }
            };

            let file_edges = self
                .analyze_file(
                    repo_id,
                    commit_sha,
                    file_path,
                    &content,
                    file_symbols,
                    &cache,
                    &import_graph,
                    &mut stats,
                )
                .await;
            relationships.extend(file_edges);
            stats.files_analyzed += 1;
        }

        info!(
            "Call graph built: {} call edges, {} import edges, {} inherits edges, {} unresolved",
            stats.call_relationships,
            stats.import_relationships,
            stats.inheritance_relationships,
            stats.unresolved_calls
        );

        Ok((relationships, stats))
    }

    #[allow(clippy::too_many_arguments)]
    async fn analyze_file(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
        content: &str,
        file_symbols: &[&CodeSymbol],
        cache: &SymbolCache,
        import_graph: &ImportGraph,
        stats: &mut CallGraphStats,
    ) -> Vec<SymbolRelationship> {
        let mut relationships = Vec::new();

        for symbol in file_symbols {
            match symbol.symbol_type() {
                SymbolType::Function | SymbolType::Method => {
                    let called_names = match self
                        .parser
                        .extract_calls(
                            content,
                            symbol.language(),
                            symbol.line_start(),
                            symbol.line_end(),
                        )
                        .await
                    {
                        Ok(names) => names,
                        Err(e) => {
                            warn!(
                                "Call extraction failed for {} in {}: {}",
                                symbol.qualified_name(),
                                file_path,
                                e
                            );
                            continue;
                        }
                    };

                    for call_name in called_names {
                        match cache.resolve(&call_name, file_path, import_graph, true) {
                            Some(target) if target.id() != symbol.id() => {
                                relationships.push(
                                    SymbolRelationship::new(
                                        repo_id.to_string(),
                                        commit_sha.to_string(),
                                        symbol.id().to_string(),
                                        target.id().to_string(),
                                        RelationshipType::Calls,
                                    )
                                    .with_metadata(serde_json::json!({ "call_name": call_name })),
                                );
                                stats.call_relationships += 1;
                            }
                            Some(_) => {
                                // Self-recursion resolves to the symbol itself;
                                // calls edges are never self-referential.
                            }
                            None => {
                                debug!(
                                    "Could not resolve call '{}' from {} in {}",
                                    call_name,
                                    symbol.qualified_name(),
                                    file_path
                                );
                                stats.unresolved_calls += 1;
                            }
                        }
                    }
                }
                SymbolType::Class => {
                    for base in symbol.detail().base_classes() {
                        if let Some(target) = cache.resolve(base, file_path, import_graph, false) {
                            relationships.push(
                                SymbolRelationship::new(
                                    repo_id.to_string(),
                                    commit_sha.to_string(),
                                    symbol.id().to_string(),
                                    target.id().to_string(),
                                    RelationshipType::Inherits,
                                )
                                .with_metadata(serde_json::json!({ "base_class": base })),
                            );
                            stats.inheritance_relationships += 1;
                        }
                    }
                }
                SymbolType::Import => {
                    // Edges from the import statement to each symbol it
                    // binds; file-granularity dependency queries join
                    // through these.
                    let Some(bindings) = import_graph.get(file_path) else {
                        continue;
                    };
                    for name in symbol.detail().imported_names() {
                        if let Some(target) = bindings.get(name) {
                            relationships.push(
                                SymbolRelationship::new(
                                    repo_id.to_string(),
                                    commit_sha.to_string(),
                                    symbol.id().to_string(),
                                    target.id().to_string(),
                                    RelationshipType::Imports,
                                )
                                .with_metadata(serde_json::json!({ "imported_name": name })),
                            );
                            stats.import_relationships += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        relationships
    }
}

/// Per-build symbol lookup. Keys are `file::qualified_name` and
/// `file::name`; first declaration keeps the simple-name slot.
struct SymbolCache {
    by_key: HashMap<String, CodeSymbol>,
}

impl SymbolCache {
    fn new(symbols: &[CodeSymbol]) -> Self {
        let mut by_key = HashMap::new();
        for symbol in symbols {
            by_key.insert(
                format!("{}::{}", symbol.file_path(), symbol.qualified_name()),
                symbol.clone(),
            );
            let simple = format!("{}::{}", symbol.file_path(), symbol.name());
            by_key.entry(simple).or_insert_with(|| symbol.clone());
        }
        Self { by_key }
    }

    /// Resolution order: same-file symbols, then the file's import map,
    /// then a global last-resort scan by name or qualified name.
    fn resolve(
        &self,
        name: &str,
        current_file: &str,
        import_graph: &ImportGraph,
        callable_only: bool,
    ) -> Option<&CodeSymbol> {
        let accepts = |s: &CodeSymbol| !callable_only || s.is_callable();

        if let Some(symbol) = self.by_key.get(&format!("{}::{}", current_file, name)) {
            if accepts(symbol) {
                return Some(symbol);
            }
        }

        if let Some(bindings) = import_graph.get(current_file) {
            if let Some(symbol) = bindings.get(name) {
                if accepts(symbol) {
                    // The imported symbol was cloned into the graph; fetch
                    // the cached instance to return a uniform lifetime.
                    let key = format!("{}::{}", symbol.file_path(), symbol.qualified_name());
                    if let Some(cached) = self.by_key.get(&key) {
                        return Some(cached);
                    }
                }
            }
        }

        self.by_key
            .values()
            .find(|s| (s.name() == name || s.qualified_name() == name) && accepts(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{FileSymbols, SourceArchive};
    use crate::domain::{Language, SymbolDetail, SymbolScope};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Parser stub that reports fixed call names per (start_line) key.
    struct StubParser {
        calls_by_line: HashMap<u32, Vec<String>>,
    }

    #[async_trait]
    impl ParserService for StubParser {
        fn supported_languages(&self) -> Vec<Language> {
            vec![Language::Python]
        }

        async fn parse_symbols(
            &self,
            _content: &str,
            _language: Language,
        ) -> Result<Option<FileSymbols>, DomainError> {
            Ok(Some(FileSymbols::default()))
        }

        async fn extract_calls(
            &self,
            _content: &str,
            _language: Language,
            line_start: u32,
            _line_end: u32,
        ) -> Result<Vec<String>, DomainError> {
            Ok(self.calls_by_line.get(&line_start).cloned().unwrap_or_default())
        }
    }

    struct MapArchive {
        files: HashMap<String, String>,
    }

    #[async_trait]
    impl SourceArchive for MapArchive {
        async fn read_file(&self, path: &str) -> Result<Option<String>, DomainError> {
            Ok(self.files.get(path).cloned())
        }
    }

    fn function(name: &str, file: &str, line_start: u32) -> CodeSymbol {
        CodeSymbol::new(
            "repo".to_string(),
            "sha".to_string(),
            SymbolType::Function,
            name.to_string(),
            name.to_string(),
            file.to_string(),
            line_start,
            line_start + 5,
            SymbolScope::Global,
            SymbolDetail::Function {
                language: Language::Python,
                is_async: false,
                is_method: false,
                parameters: vec![],
                decorators: vec![],
            },
        )
    }

    fn class(name: &str, bases: &[&str], file: &str, line_start: u32) -> CodeSymbol {
        CodeSymbol::new(
            "repo".to_string(),
            "sha".to_string(),
            SymbolType::Class,
            name.to_string(),
            name.to_string(),
            file.to_string(),
            line_start,
            line_start + 10,
            SymbolScope::Global,
            SymbolDetail::Class {
                language: Language::Python,
                base_classes: bases.iter().map(|s| s.to_string()).collect(),
                decorators: vec![],
            },
        )
    }

    fn py_import(module: &str, names: &[&str], file: &str) -> CodeSymbol {
        CodeSymbol::new(
            "repo".to_string(),
            "sha".to_string(),
            SymbolType::Import,
            module.to_string(),
            module.to_string(),
            file.to_string(),
            1,
            1,
            SymbolScope::Global,
            SymbolDetail::Import {
                language: Language::Python,
                imported_names: names.iter().map(|s| s.to_string()).collect(),
                alias: None,
                is_from_import: true,
            },
        )
    }

    fn archive_for(files: &[&str]) -> MapArchive {
        MapArchive {
            files: files
                .iter()
                .map(|f| (f.to_string(), "source".to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_same_file_call_edge() {
        let caller = function("handler", "api.py", 10);
        let callee = function("validate", "api.py", 30);
        let symbols = vec![caller.clone(), callee.clone()];

        let parser = StubParser {
            calls_by_line: HashMap::from([(10, vec!["validate".to_string()])]),
        };
        let builder = CallGraphBuilder::new(Arc::new(parser));

        let (edges, stats) = builder
            .build("repo", "sha", &symbols, &archive_for(&["api.py"]))
            .await
            .unwrap();

        assert_eq!(stats.call_relationships, 1);
        assert_eq!(edges[0].source_id(), caller.id());
        assert_eq!(edges[0].target_id(), callee.id());
        assert_eq!(edges[0].relationship_type(), RelationshipType::Calls);
    }

    #[tokio::test]
    async fn test_cross_file_call_via_import() {
        let callee = function("login", "auth.py", 5);
        let caller = function("handler", "api.py", 10);
        let import = py_import("auth", &["login"], "api.py");
        let symbols = vec![callee.clone(), caller.clone(), import];

        let parser = StubParser {
            calls_by_line: HashMap::from([(10, vec!["login".to_string()])]),
        };
        let builder = CallGraphBuilder::new(Arc::new(parser));

        let (edges, stats) = builder
            .build("repo", "sha", &symbols, &archive_for(&["api.py", "auth.py"]))
            .await
            .unwrap();

        assert_eq!(stats.call_relationships, 1);
        assert_eq!(edges[0].source_id(), caller.id());
        assert_eq!(edges[0].target_id(), callee.id());
    }

    #[tokio::test]
    async fn test_no_self_edges_for_recursion() {
        let recursive = function("walk", "tree.py", 10);
        let symbols = vec![recursive];

        let parser = StubParser {
            calls_by_line: HashMap::from([(10, vec!["walk".to_string()])]),
        };
        let builder = CallGraphBuilder::new(Arc::new(parser));

        let (edges, stats) = builder
            .build("repo", "sha", &symbols, &archive_for(&["tree.py"]))
            .await
            .unwrap();

        assert!(edges.is_empty());
        assert_eq!(stats.call_relationships, 0);
    }

    #[tokio::test]
    async fn test_unresolved_calls_counted_not_persisted() {
        let caller = function("handler", "api.py", 10);
        let symbols = vec![caller];

        let parser = StubParser {
            calls_by_line: HashMap::from([(10, vec!["print".to_string(), "len".to_string()])]),
        };
        let builder = CallGraphBuilder::new(Arc::new(parser));

        let (edges, stats) = builder
            .build("repo", "sha", &symbols, &archive_for(&["api.py"]))
            .await
            .unwrap();

        assert!(edges.is_empty());
        assert_eq!(stats.unresolved_calls, 2);
    }

    #[tokio::test]
    async fn test_inheritance_edges() {
        let base = class("BaseService", &[], "base.py", 1);
        let derived = class("AuthService", &["BaseService"], "auth.py", 1);
        let import = py_import("base", &["BaseService"], "auth.py");
        let symbols = vec![base.clone(), derived.clone(), import];

        let parser = StubParser {
            calls_by_line: HashMap::new(),
        };
        let builder = CallGraphBuilder::new(Arc::new(parser));

        let (edges, stats) = builder
            .build("repo", "sha", &symbols, &archive_for(&["auth.py", "base.py"]))
            .await
            .unwrap();

        assert_eq!(stats.inheritance_relationships, 1);
        assert_eq!(edges[0].source_id(), derived.id());
        assert_eq!(edges[0].target_id(), base.id());
        assert_eq!(edges[0].relationship_type(), RelationshipType::Inherits);
    }

    #[tokio::test]
    async fn test_import_edges_bind_to_targets() {
        let callee = function("login", "auth.py", 5);
        let import = py_import("auth", &["login"], "api.py");
        let symbols = vec![callee.clone(), import.clone()];

        let parser = StubParser {
            calls_by_line: HashMap::new(),
        };
        let builder = CallGraphBuilder::new(Arc::new(parser));

        let (edges, stats) = builder
            .build("repo", "sha", &symbols, &archive_for(&["api.py", "auth.py"]))
            .await
            .unwrap();

        assert_eq!(stats.import_relationships, 1);
        let edge = edges
            .iter()
            .find(|e| e.relationship_type() == RelationshipType::Imports)
            .unwrap();
        assert_eq!(edge.source_id(), import.id());
        assert_eq!(edge.target_id(), callee.id());
    }

    #[tokio::test]
    async fn test_missing_archive_file_skipped() {
        let caller = function("handler", "api.py", 10);
        let symbols = vec![caller];

        let parser = StubParser {
            calls_by_line: HashMap::from([(10, vec!["anything".to_string()])]),
        };
        let builder = CallGraphBuilder::new(Arc::new(parser));

        let (edges, stats) = builder
            .build("repo", "sha", &symbols, &archive_for(&[]))
            .await
            .unwrap();

        assert!(edges.is_empty());
        assert_eq!(stats.files_analyzed, 0);
    }
}
