use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::SymbolStore;
use crate::domain::{
    CallChainNode, CodeSymbol, DomainError, RelationshipType, SymbolRelationship, SymbolType,
};

/// In-memory symbol graph with breadth-first traversal. The traversal
/// semantics mirror the DuckDB adapter: depth-limited walks with a
/// per-branch visited set.
pub struct InMemorySymbolStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    symbols: HashMap<String, CodeSymbol>,
    relationships: Vec<SymbolRelationship>,
}

impl InMemorySymbolStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

impl Default for InMemorySymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// BFS over `calls` edges; `forward` follows source → target.
    /// The start symbol is not pre-visited, so cycles that return to it
    /// report it as reachable.
    fn walk_calls(&self, start: &str, max_depth: u32, forward: bool) -> Vec<CodeSymbol> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for relationship in &self.relationships {
            if relationship.relationship_type() != RelationshipType::Calls {
                continue;
            }
            let (from, to) = if forward {
                (relationship.source_id(), relationship.target_id())
            } else {
                (relationship.target_id(), relationship.source_id())
            };
            adjacency.entry(from).or_default().push(to);
        }

        let mut found: Vec<(u32, String)> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, u32)> = VecDeque::from([(start, 0)]);

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for &next in adjacency.get(node).into_iter().flatten() {
                if seen.insert(next) {
                    found.push((depth + 1, next.to_string()));
                    queue.push_back((next, depth + 1));
                }
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        found
            .into_iter()
            .filter_map(|(_, id)| self.symbols.get(&id).cloned())
            .collect()
    }
}

#[async_trait]
impl SymbolStore for InMemorySymbolStore {
    async fn save_symbols(&self, symbols: &[CodeSymbol]) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        for symbol in symbols {
            state.symbols.insert(symbol.id().to_string(), symbol.clone());
        }
        Ok(())
    }

    async fn save_relationships(
        &self,
        relationships: &[SymbolRelationship],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        for relationship in relationships {
            // Keyed upsert by (source, target, type).
            let exists = state.relationships.iter().any(|r| {
                r.source_id() == relationship.source_id()
                    && r.target_id() == relationship.target_id()
                    && r.relationship_type() == relationship.relationship_type()
            });
            if !exists {
                state.relationships.push(relationship.clone());
            }
        }
        Ok(())
    }

    async fn load_symbols(
        &self,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let state = self.state.lock().await;
        let mut symbols: Vec<CodeSymbol> = state
            .symbols
            .values()
            .filter(|s| s.repo_id() == repo_id && s.commit_sha() == commit_sha)
            .cloned()
            .collect();
        symbols.sort_by(|a, b| {
            a.file_path()
                .cmp(b.file_path())
                .then(a.line_start().cmp(&b.line_start()))
        });
        Ok(symbols)
    }

    async fn find_by_id(&self, symbol_id: &str) -> Result<Option<CodeSymbol>, DomainError> {
        Ok(self.state.lock().await.symbols.get(symbol_id).cloned())
    }

    async fn find_by_name(
        &self,
        repo_id: &str,
        commit_sha: &str,
        name: &str,
        fuzzy: bool,
        limit: usize,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let state = self.state.lock().await;

        let mut matches: Vec<(f32, CodeSymbol)> = state
            .symbols
            .values()
            .filter(|s| s.repo_id() == repo_id && s.commit_sha() == commit_sha)
            .filter_map(|s| {
                if fuzzy {
                    let score = jaccard(s.name(), name);
                    (score > 0.3).then(|| (score, s.clone()))
                } else {
                    (s.name() == name).then(|| (1.0, s.clone()))
                }
            })
            .collect();

        matches.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches.into_iter().take(limit).map(|(_, s)| s).collect())
    }

    async fn find_by_type(
        &self,
        repo_id: &str,
        commit_sha: &str,
        symbol_type: SymbolType,
        limit: usize,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let symbols = self.load_symbols(repo_id, commit_sha).await?;
        Ok(symbols
            .into_iter()
            .filter(|s| s.symbol_type() == symbol_type)
            .take(limit)
            .collect())
    }

    async fn find_in_file(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let symbols = self.load_symbols(repo_id, commit_sha).await?;
        Ok(symbols
            .into_iter()
            .filter(|s| s.file_path() == file_path)
            .collect())
    }

    async fn find_callers(
        &self,
        symbol_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        Ok(self.state.lock().await.walk_calls(symbol_id, max_depth, false))
    }

    async fn find_callees(
        &self,
        symbol_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        Ok(self.state.lock().await.walk_calls(symbol_id, max_depth, true))
    }

    async fn find_call_path(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CallChainNode>, DomainError> {
        let state = self.state.lock().await;

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for relationship in &state.relationships {
            if relationship.relationship_type() == RelationshipType::Calls {
                adjacency
                    .entry(relationship.source_id())
                    .or_default()
                    .push(relationship.target_id());
            }
        }

        // BFS carrying the full path per frontier entry.
        let mut queue: VecDeque<Vec<&str>> = VecDeque::from([vec![from_id]]);
        while let Some(path) = queue.pop_front() {
            let current = *path.last().expect("path never empty");
            if current == to_id {
                return Ok(path
                    .iter()
                    .enumerate()
                    .filter_map(|(depth, id)| {
                        state.symbols.get(*id).map(|s| CallChainNode {
                            symbol_id: s.id().to_string(),
                            name: s.name().to_string(),
                            qualified_name: s.qualified_name().to_string(),
                            file_path: s.file_path().to_string(),
                            depth: depth as u32,
                        })
                    })
                    .collect());
            }
            if path.len() as u32 > max_depth {
                continue;
            }
            for &next in adjacency.get(current).into_iter().flatten() {
                if !path.contains(&next) {
                    let mut extended = path.clone();
                    extended.push(next);
                    queue.push_back(extended);
                }
            }
        }

        Ok(vec![])
    }

    async fn file_dependencies(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<String>, DomainError> {
        let state = self.state.lock().await;
        let mut files: Vec<String> = state
            .relationships
            .iter()
            .filter(|r| r.relationship_type() == RelationshipType::Imports)
            .filter_map(|r| {
                let source = state.symbols.get(r.source_id())?;
                let target = state.symbols.get(r.target_id())?;
                (source.repo_id() == repo_id
                    && source.commit_sha() == commit_sha
                    && source.file_path() == file_path)
                    .then(|| target.file_path().to_string())
            })
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    async fn file_dependents(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<String>, DomainError> {
        let state = self.state.lock().await;
        let mut files: Vec<String> = state
            .relationships
            .iter()
            .filter(|r| r.relationship_type() == RelationshipType::Imports)
            .filter_map(|r| {
                let source = state.symbols.get(r.source_id())?;
                let target = state.symbols.get(r.target_id())?;
                (target.repo_id() == repo_id
                    && target.commit_sha() == commit_sha
                    && target.file_path() == file_path)
                    .then(|| source.file_path().to_string())
            })
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    async fn stats(
        &self,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Vec<(String, u64)>, DomainError> {
        let symbols = self.load_symbols(repo_id, commit_sha).await?;
        let mut counts: HashMap<&'static str, u64> = HashMap::new();
        for symbol in &symbols {
            *counts.entry(symbol.symbol_type().as_str()).or_default() += 1;
        }
        let mut stats: Vec<(String, u64)> = counts
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        stats.sort();
        Ok(stats)
    }

    async fn delete_by_repository(&self, repo_id: &str) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.symbols.retain(|_, s| s.repo_id() != repo_id);
        state.relationships.retain(|r| r.repo_id() != repo_id);
        Ok(())
    }
}

/// Character-set jaccard similarity, the in-memory stand-in for the
/// database's fuzzy matcher.
fn jaccard(a: &str, b: &str) -> f32 {
    let set_a: HashSet<char> = a.to_lowercase().chars().collect();
    let set_b: HashSet<char> = b.to_lowercase().chars().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f32;
    let union = set_a.union(&set_b).count() as f32;
    intersection / union
}
