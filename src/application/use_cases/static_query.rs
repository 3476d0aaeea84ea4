use std::sync::Arc;

use tracing::{debug, error};

use crate::application::SymbolStore;
use crate::domain::{
    CodeSymbol, Config, DomainError, QueryIntent, StaticQueryResult, SymbolSummary, SymbolType,
};

/// Executes structural queries against the symbol graph.
///
/// Answers are deterministic: every handler returns structured results
/// plus a human-readable `formatted_answer`, and an executed query that
/// matches nothing is a successful empty result, never an invention.
pub struct StaticQueryEngine {
    symbol_store: Arc<dyn SymbolStore>,
    config: Config,
}

impl StaticQueryEngine {
    pub fn new(symbol_store: Arc<dyn SymbolStore>, config: Config) -> Self {
        Self {
            symbol_store,
            config,
        }
    }

    pub async fn execute(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> StaticQueryResult {
        let result = match intent.primary_intent.as_str() {
            "find_symbol" => self.find_symbol(intent, repo_id, commit_sha).await,
            "list_symbols" => self.list_symbols(intent, repo_id, commit_sha).await,
            "find_callers" => self.find_callers(intent, repo_id, commit_sha).await,
            "find_callees" => self.find_callees(intent, repo_id, commit_sha).await,
            "find_call_path" => self.find_call_path(intent, repo_id, commit_sha).await,
            "find_reachable" => self.find_reachable(intent, repo_id, commit_sha).await,
            "find_imports" | "find_dependencies" => {
                self.find_dependencies(intent, repo_id, commit_sha).await
            }
            "find_importers" => self.find_importers(intent, repo_id, commit_sha).await,
            other => {
                return StaticQueryResult::failure(
                    other,
                    format!("No handler for query type: {}", other),
                )
            }
        };

        match result {
            Ok(result) => result,
            Err(e) => {
                error!("Static query {} failed: {}", intent.primary_intent, e);
                StaticQueryResult::failure(
                    intent.primary_intent.clone(),
                    format!("Error executing query: {}", e),
                )
            }
        }
    }

    /// Exact lookup with a fuzzy fallback.
    async fn lookup(
        &self,
        name: &str,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let exact = self
            .symbol_store
            .find_by_name(repo_id, commit_sha, name, false, 10)
            .await?;
        if !exact.is_empty() {
            return Ok(exact);
        }
        self.symbol_store
            .find_by_name(repo_id, commit_sha, name, true, 10)
            .await
    }

    async fn find_symbol(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<StaticQueryResult, DomainError> {
        let Some(name) = intent.entities.first() else {
            return Ok(StaticQueryResult::failure(
                "find_symbol",
                "No symbol name provided",
            ));
        };

        let symbols = self.lookup(name, repo_id, commit_sha).await?;
        if symbols.is_empty() {
            return Ok(StaticQueryResult::empty(
                "find_symbol",
                format!("No symbol found matching '{}'", name),
            ));
        }

        let mut answer = format!("Found {} symbol(s) matching '{}':\n", symbols.len(), name);
        for symbol in symbols.iter().take(10) {
            answer.push_str(&format!(
                "  • {} `{}` at {}\n",
                symbol.symbol_type(),
                symbol.qualified_name(),
                symbol.location()
            ));
        }

        Ok(StaticQueryResult {
            success: true,
            query_type: "find_symbol".to_string(),
            metadata: serde_json::json!({ "count": symbols.len() }),
            results: symbols.iter().map(SymbolSummary::from).collect(),
            formatted_answer: answer,
        })
    }

    async fn list_symbols(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<StaticQueryResult, DomainError> {
        let symbol_type = intent
            .entities
            .first()
            .and_then(|e| match e.to_lowercase().as_str() {
                "functions" => Some(SymbolType::Function),
                "classes" => Some(SymbolType::Class),
                "methods" => Some(SymbolType::Method),
                _ => None,
            })
            .unwrap_or(SymbolType::Function);

        let symbols = self
            .symbol_store
            .find_by_type(repo_id, commit_sha, symbol_type, 100)
            .await?;

        let mut answer = format!("Found {} {}(s):\n", symbols.len(), symbol_type);
        for symbol in symbols.iter().take(50) {
            answer.push_str(&format!(
                "  • `{}` ({})\n",
                symbol.qualified_name(),
                symbol.location()
            ));
        }
        if symbols.len() > 50 {
            answer.push_str(&format!("\n  ... and {} more", symbols.len() - 50));
        }

        Ok(StaticQueryResult {
            success: true,
            query_type: "list_symbols".to_string(),
            metadata: serde_json::json!({
                "symbol_type": symbol_type.as_str(),
                "count": symbols.len(),
            }),
            results: symbols.iter().map(SymbolSummary::from).collect(),
            formatted_answer: answer,
        })
    }

    async fn find_callers(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<StaticQueryResult, DomainError> {
        let Some(name) = intent.entities.first() else {
            return Ok(StaticQueryResult::failure(
                "find_callers",
                "No function name provided",
            ));
        };

        let targets = self.lookup(name, repo_id, commit_sha).await?;
        let Some(target) = targets.first() else {
            return Ok(StaticQueryResult::empty(
                "find_callers",
                format!("Function '{}' not found", name),
            ));
        };

        // Depth 2 surfaces transitive callers one hop beyond the direct ones.
        let callers = self.symbol_store.find_callers(target.id(), 2).await?;

        let answer = if callers.is_empty() {
            format!("No callers found for `{}`", target.qualified_name())
        } else {
            let mut answer = format!(
                "Found {} caller(s) of `{}`:\n",
                callers.len(),
                target.qualified_name()
            );
            for caller in callers.iter().take(20) {
                answer.push_str(&format!(
                    "  • `{}` ({})\n",
                    caller.qualified_name(),
                    caller.location()
                ));
            }
            answer
        };

        Ok(StaticQueryResult {
            success: true,
            query_type: "find_callers".to_string(),
            metadata: serde_json::json!({
                "target_function": target.qualified_name(),
                "count": callers.len(),
            }),
            results: callers.iter().map(SymbolSummary::from).collect(),
            formatted_answer: answer,
        })
    }

    async fn find_callees(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<StaticQueryResult, DomainError> {
        let Some(name) = intent.entities.first() else {
            return Ok(StaticQueryResult::failure(
                "find_callees",
                "No function name provided",
            ));
        };

        let sources = self.lookup(name, repo_id, commit_sha).await?;
        let Some(source) = sources.first() else {
            return Ok(StaticQueryResult::empty(
                "find_callees",
                format!("Function '{}' not found", name),
            ));
        };

        let callees = self.symbol_store.find_callees(source.id(), 1).await?;

        let answer = if callees.is_empty() {
            format!(
                "`{}` doesn't call any other indexed functions",
                source.qualified_name()
            )
        } else {
            let mut answer = format!(
                "`{}` calls {} function(s):\n",
                source.qualified_name(),
                callees.len()
            );
            for callee in callees.iter().take(20) {
                answer.push_str(&format!(
                    "  • `{}` ({})\n",
                    callee.qualified_name(),
                    callee.location()
                ));
            }
            answer
        };

        Ok(StaticQueryResult {
            success: true,
            query_type: "find_callees".to_string(),
            metadata: serde_json::json!({
                "source_function": source.qualified_name(),
                "count": callees.len(),
            }),
            results: callees.iter().map(SymbolSummary::from).collect(),
            formatted_answer: answer,
        })
    }

    async fn find_call_path(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<StaticQueryResult, DomainError> {
        if intent.entities.len() < 2 {
            return Ok(StaticQueryResult::failure(
                "find_call_path",
                "Need both source and target function names",
            ));
        }

        let from_name = &intent.entities[0];
        let to_name = &intent.entities[1];

        let from_matches = self.lookup(from_name, repo_id, commit_sha).await?;
        let to_matches = self.lookup(to_name, repo_id, commit_sha).await?;

        let (Some(from), Some(to)) = (from_matches.first(), to_matches.first()) else {
            return Ok(StaticQueryResult::empty(
                "find_call_path",
                format!(
                    "One or both functions not found: '{}', '{}'",
                    from_name, to_name
                ),
            ));
        };

        let path = self
            .symbol_store
            .find_call_path(from.id(), to.id(), self.config.call_graph_max_depth)
            .await?;

        let answer = if path.is_empty() {
            format!(
                "No call path found from `{}` to `{}`",
                from.qualified_name(),
                to.qualified_name()
            )
        } else {
            let chain: Vec<&str> = path.iter().map(|n| n.qualified_name.as_str()).collect();
            format!("Call path ({} steps):\n  {}", path.len(), chain.join(" -> "))
        };

        let results: Vec<SymbolSummary> = {
            let mut results = Vec::with_capacity(path.len());
            for node in &path {
                if let Some(symbol) = self.symbol_store.find_by_id(&node.symbol_id).await? {
                    results.push(SymbolSummary::from(&symbol));
                }
            }
            results
        };

        Ok(StaticQueryResult {
            success: true,
            query_type: "find_call_path".to_string(),
            metadata: serde_json::json!({
                "from": from.qualified_name(),
                "to": to.qualified_name(),
                "path_length": path.len(),
            }),
            results,
            formatted_answer: answer,
        })
    }

    async fn find_reachable(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<StaticQueryResult, DomainError> {
        let Some(name) = intent.entities.first() else {
            return Ok(StaticQueryResult::failure(
                "find_reachable",
                "No function name provided",
            ));
        };

        let sources = self.lookup(name, repo_id, commit_sha).await?;
        let Some(source) = sources.first() else {
            return Ok(StaticQueryResult::empty(
                "find_reachable",
                format!("Function '{}' not found", name),
            ));
        };

        let reachable = self
            .symbol_store
            .find_callees(source.id(), self.config.call_graph_max_depth)
            .await?;

        let mut answer = format!(
            "Functions reachable from `{}`: {}\n",
            source.qualified_name(),
            reachable.len()
        );
        for symbol in reachable.iter().take(30) {
            answer.push_str(&format!(
                "  • `{}` ({})\n",
                symbol.qualified_name(),
                symbol.file_path()
            ));
        }
        if reachable.len() > 30 {
            answer.push_str(&format!("\n  ... and {} more", reachable.len() - 30));
        }

        Ok(StaticQueryResult {
            success: true,
            query_type: "find_reachable".to_string(),
            metadata: serde_json::json!({
                "source": source.qualified_name(),
                "reachable_count": reachable.len(),
            }),
            results: reachable.iter().map(SymbolSummary::from).collect(),
            formatted_answer: answer,
        })
    }

    async fn find_dependencies(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<StaticQueryResult, DomainError> {
        let Some(file) = intent.entities.first() else {
            return Ok(StaticQueryResult::failure(
                &intent.primary_intent,
                "No file path provided",
            ));
        };

        let dependencies = self
            .symbol_store
            .file_dependencies(repo_id, commit_sha, file)
            .await?;

        debug!("{} depends on {} files", file, dependencies.len());

        let answer = if dependencies.is_empty() {
            format!("`{}` has no resolved internal imports", file)
        } else {
            let mut answer = format!("`{}` imports from {} file(s):\n", file, dependencies.len());
            for dep in &dependencies {
                answer.push_str(&format!("  • {}\n", dep));
            }
            answer
        };

        Ok(StaticQueryResult {
            success: true,
            query_type: intent.primary_intent.clone(),
            metadata: serde_json::json!({ "file": file, "count": dependencies.len() }),
            results: vec![],
            formatted_answer: answer,
        })
    }

    async fn find_importers(
        &self,
        intent: &QueryIntent,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<StaticQueryResult, DomainError> {
        let Some(file) = intent.entities.first() else {
            return Ok(StaticQueryResult::failure(
                "find_importers",
                "No file path provided",
            ));
        };

        let dependents = self
            .symbol_store
            .file_dependents(repo_id, commit_sha, file)
            .await?;

        let answer = if dependents.is_empty() {
            format!("No indexed file imports `{}`", file)
        } else {
            let mut answer = format!("{} file(s) import `{}`:\n", dependents.len(), file);
            for dep in &dependents {
                answer.push_str(&format!("  • {}\n", dep));
            }
            answer
        };

        Ok(StaticQueryResult {
            success: true,
            query_type: "find_importers".to_string(),
            metadata: serde_json::json!({ "file": file, "count": dependents.len() }),
            results: vec![],
            formatted_answer: answer,
        })
    }
}
