use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::{ClassDef, FunctionDef, ImportDef, ParserService, VariableDef};
use crate::domain::{CodeSymbol, Language, SymbolDetail, SymbolScope, SymbolType};

/// Extracts symbol records from parsed files.
///
/// Runs two passes within a file: classes first, so methods can resolve
/// their `parent_symbol_id`, then functions, imports, and variables.
/// Per-file failures are logged and the file is skipped entirely.
pub struct SymbolIndexer {
    parser: Arc<dyn ParserService>,
}

impl SymbolIndexer {
    pub fn new(parser: Arc<dyn ParserService>) -> Self {
        Self { parser }
    }

    /// Index one file into symbol records. Returns an empty vector for
    /// unsupported languages and unparseable content.
    pub async fn index_file(
        &self,
        file_path: &str,
        content: &str,
        repo_id: &str,
        commit_sha: &str,
    ) -> Vec<CodeSymbol> {
        let language = Language::from_path(Path::new(file_path));
        if !language.is_known() || !self.parser.supports_language(language) {
            debug!("Skipping unsupported file: {}", file_path);
            return vec![];
        }

        let file_symbols = match self.parser.parse_symbols(content, language).await {
            Ok(Some(symbols)) => symbols,
            Ok(None) => {
                debug!("Parser produced no tree for {}", file_path);
                return vec![];
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", file_path, e);
                return vec![];
            }
        };

        let mut symbols = Vec::new();
        // Class lookup slot by name; first declaration wins on collision.
        let mut classes_by_name: HashMap<String, CodeSymbol> = HashMap::new();

        for class_def in &file_symbols.classes {
            let symbol = self.class_symbol(class_def, file_path, repo_id, commit_sha, language);
            classes_by_name
                .entry(class_def.name.clone())
                .or_insert_with(|| symbol.clone());
            symbols.push(symbol);
        }

        for func_def in &file_symbols.functions {
            symbols.push(self.function_symbol(
                func_def,
                file_path,
                repo_id,
                commit_sha,
                language,
                &classes_by_name,
            ));
        }

        for import_def in &file_symbols.imports {
            symbols.push(self.import_symbol(import_def, file_path, repo_id, commit_sha, language));
        }

        for var_def in &file_symbols.variables {
            symbols.push(self.variable_symbol(var_def, file_path, repo_id, commit_sha, language));
        }

        debug!("Indexed {} symbols from {}", symbols.len(), file_path);
        symbols
    }

    fn class_symbol(
        &self,
        class_def: &ClassDef,
        file_path: &str,
        repo_id: &str,
        commit_sha: &str,
        language: Language,
    ) -> CodeSymbol {
        CodeSymbol::new(
            repo_id.to_string(),
            commit_sha.to_string(),
            SymbolType::Class,
            class_def.name.clone(),
            class_def.name.clone(),
            file_path.to_string(),
            class_def.line_start,
            class_def.line_end,
            SymbolScope::Global,
            SymbolDetail::Class {
                language,
                base_classes: class_def.base_classes.clone(),
                decorators: class_def.decorators.clone(),
            },
        )
    }

    fn function_symbol(
        &self,
        func_def: &FunctionDef,
        file_path: &str,
        repo_id: &str,
        commit_sha: &str,
        language: Language,
        classes_by_name: &HashMap<String, CodeSymbol>,
    ) -> CodeSymbol {
        let is_method = func_def.parent_class.is_some();
        let (scope, symbol_type) = if is_method {
            (SymbolScope::Class, SymbolType::Method)
        } else {
            (SymbolScope::Global, SymbolType::Function)
        };

        let qualified_name = match &func_def.parent_class {
            Some(class) => format!("{}.{}", class, func_def.name),
            None => func_def.name.clone(),
        };

        let mut symbol = CodeSymbol::new(
            repo_id.to_string(),
            commit_sha.to_string(),
            symbol_type,
            func_def.name.clone(),
            qualified_name,
            file_path.to_string(),
            func_def.line_start,
            func_def.line_end,
            scope,
            SymbolDetail::Function {
                language,
                is_async: func_def.is_async,
                is_method,
                parameters: func_def.parameters.clone(),
                decorators: func_def.decorators.clone(),
            },
        );

        if !func_def.parameters.is_empty() {
            let prefix = if func_def.is_async { "async " } else { "" };
            symbol = symbol.with_signature(format!(
                "{}{}({})",
                prefix,
                func_def.name,
                func_def.parameters.join(", ")
            ));
        }

        if let Some(class) = &func_def.parent_class {
            if let Some(parent) = classes_by_name.get(class) {
                symbol = symbol.with_parent(parent.id());
            }
        }

        symbol
    }

    fn import_symbol(
        &self,
        import_def: &ImportDef,
        file_path: &str,
        repo_id: &str,
        commit_sha: &str,
        language: Language,
    ) -> CodeSymbol {
        CodeSymbol::new(
            repo_id.to_string(),
            commit_sha.to_string(),
            SymbolType::Import,
            import_def.module.clone(),
            import_def.module.clone(),
            file_path.to_string(),
            import_def.line,
            import_def.line,
            SymbolScope::Global,
            SymbolDetail::Import {
                language,
                imported_names: import_def.imported_names.clone(),
                alias: import_def.alias.clone(),
                is_from_import: import_def.is_from_import,
            },
        )
    }

    fn variable_symbol(
        &self,
        var_def: &VariableDef,
        file_path: &str,
        repo_id: &str,
        commit_sha: &str,
        language: Language,
    ) -> CodeSymbol {
        let symbol_type = if var_def.is_constant {
            SymbolType::Constant
        } else {
            SymbolType::Variable
        };

        CodeSymbol::new(
            repo_id.to_string(),
            commit_sha.to_string(),
            symbol_type,
            var_def.name.clone(),
            var_def.name.clone(),
            file_path.to_string(),
            var_def.line,
            var_def.line,
            SymbolScope::Global,
            SymbolDetail::Variable {
                language,
                is_constant: var_def.is_constant,
                type_annotation: None,
            },
        )
    }
}

/// ALL_CAPS names (with digits/underscores) are treated as constants.
pub fn looks_like_constant(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        && name.chars().any(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{FileSymbols, ParserService};
    use crate::domain::DomainError;
    use async_trait::async_trait;

    struct StubParser {
        symbols: FileSymbols,
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
            Ok(Some(self.symbols.clone()))
        }

        async fn extract_calls(
            &self,
            _content: &str,
            _language: Language,
            _line_start: u32,
            _line_end: u32,
        ) -> Result<Vec<String>, DomainError> {
            Ok(vec![])
        }
    }

    fn sample_file() -> FileSymbols {
        FileSymbols {
            functions: vec![
                FunctionDef {
                    name: "login".to_string(),
                    parameters: vec!["self".to_string(), "token".to_string()],
                    is_async: true,
                    decorators: vec![],
                    parent_class: Some("AuthService".to_string()),
                    line_start: 5,
                    line_end: 12,
                },
                FunctionDef {
                    name: "helper".to_string(),
                    parameters: vec![],
                    is_async: false,
                    decorators: vec![],
                    parent_class: None,
                    line_start: 20,
                    line_end: 22,
                },
            ],
            classes: vec![ClassDef {
                name: "AuthService".to_string(),
                base_classes: vec!["BaseService".to_string()],
                decorators: vec![],
                line_start: 1,
                line_end: 15,
            }],
            imports: vec![ImportDef {
                module: "auth".to_string(),
                imported_names: vec!["verify".to_string()],
                alias: None,
                is_from_import: true,
                line: 1,
            }],
            variables: vec![VariableDef {
                name: "MAX_RETRIES".to_string(),
                is_constant: true,
                line: 3,
            }],
        }
    }

    #[tokio::test]
    async fn test_method_gets_parent_and_qualified_name() {
        let indexer = SymbolIndexer::new(Arc::new(StubParser {
            symbols: sample_file(),
        }));

        let symbols = indexer
            .index_file("app/auth.py", "...", "repo", "sha")
            .await;

        let class = symbols
            .iter()
            .find(|s| s.symbol_type() == SymbolType::Class)
            .unwrap();
        let method = symbols
            .iter()
            .find(|s| s.symbol_type() == SymbolType::Method)
            .unwrap();

        assert_eq!(method.qualified_name(), "AuthService.login");
        assert_eq!(method.parent_symbol_id(), Some(class.id()));
        assert_eq!(method.scope(), SymbolScope::Class);
        assert_eq!(method.signature(), Some("async login(self, token)"));
    }

    #[tokio::test]
    async fn test_top_level_function_is_global() {
        let indexer = SymbolIndexer::new(Arc::new(StubParser {
            symbols: sample_file(),
        }));

        let symbols = indexer.index_file("app/auth.py", "...", "r", "s").await;
        let func = symbols.iter().find(|s| s.name() == "helper").unwrap();

        assert_eq!(func.symbol_type(), SymbolType::Function);
        assert_eq!(func.scope(), SymbolScope::Global);
        assert!(func.parent_symbol_id().is_none());
    }

    #[tokio::test]
    async fn test_imports_and_constants() {
        let indexer = SymbolIndexer::new(Arc::new(StubParser {
            symbols: sample_file(),
        }));

        let symbols = indexer.index_file("app/auth.py", "...", "r", "s").await;

        let import = symbols
            .iter()
            .find(|s| s.symbol_type() == SymbolType::Import)
            .unwrap();
        assert_eq!(import.name(), "auth");
        assert!(import.detail().is_from_import());

        let constant = symbols
            .iter()
            .find(|s| s.symbol_type() == SymbolType::Constant)
            .unwrap();
        assert_eq!(constant.name(), "MAX_RETRIES");
    }

    #[tokio::test]
    async fn test_unsupported_language_yields_nothing() {
        let indexer = SymbolIndexer::new(Arc::new(StubParser {
            symbols: sample_file(),
        }));

        let symbols = indexer.index_file("notes.txt", "...", "r", "s").await;
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_constant_heuristic() {
        assert!(looks_like_constant("MAX_RETRIES"));
        assert!(looks_like_constant("TIMEOUT_S"));
        assert!(looks_like_constant("V2"));
        assert!(!looks_like_constant("maxRetries"));
        assert!(!looks_like_constant("Config"));
        assert!(!looks_like_constant("_"));
        assert!(!looks_like_constant(""));
    }
}
