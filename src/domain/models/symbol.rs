use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Language;

/// Kind of static declaration a symbol represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    Function,
    Method,
    Class,
    Import,
    Variable,
    Constant,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Function => "function",
            SymbolType::Method => "method",
            SymbolType::Class => "class",
            SymbolType::Import => "import",
            SymbolType::Variable => "variable",
            SymbolType::Constant => "constant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolType::Function),
            "method" => Some(SymbolType::Method),
            "class" => Some(SymbolType::Class),
            "import" => Some(SymbolType::Import),
            "variable" => Some(SymbolType::Variable),
            "constant" => Some(SymbolType::Constant),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolType::Function | SymbolType::Method)
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lexical scope the symbol was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolScope {
    Global,
    Class,
    Function,
    Module,
}

impl SymbolScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolScope::Global => "global",
            SymbolScope::Class => "class",
            SymbolScope::Function => "function",
            SymbolScope::Module => "module",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "class" => SymbolScope::Class,
            "function" => SymbolScope::Function,
            "module" => SymbolScope::Module,
            _ => SymbolScope::Global,
        }
    }
}

/// Kind-specific payload carried by each symbol.
///
/// Persisted as a tagged JSON column; the variants keep the language tag
/// plus whatever the indexer extracted for that kind of declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolDetail {
    Function {
        language: Language,
        is_async: bool,
        is_method: bool,
        parameters: Vec<String>,
        decorators: Vec<String>,
    },
    Class {
        language: Language,
        base_classes: Vec<String>,
        decorators: Vec<String>,
    },
    Import {
        language: Language,
        imported_names: Vec<String>,
        alias: Option<String>,
        is_from_import: bool,
    },
    Variable {
        language: Language,
        is_constant: bool,
        type_annotation: Option<String>,
    },
}

impl SymbolDetail {
    pub fn language(&self) -> Language {
        match self {
            SymbolDetail::Function { language, .. }
            | SymbolDetail::Class { language, .. }
            | SymbolDetail::Import { language, .. }
            | SymbolDetail::Variable { language, .. } => *language,
        }
    }

    pub fn base_classes(&self) -> &[String] {
        match self {
            SymbolDetail::Class { base_classes, .. } => base_classes,
            _ => &[],
        }
    }

    pub fn imported_names(&self) -> &[String] {
        match self {
            SymbolDetail::Import { imported_names, .. } => imported_names,
            _ => &[],
        }
    }

    pub fn import_alias(&self) -> Option<&str> {
        match self {
            SymbolDetail::Import { alias, .. } => alias.as_deref(),
            _ => None,
        }
    }

    pub fn is_from_import(&self) -> bool {
        matches!(
            self,
            SymbolDetail::Import {
                is_from_import: true,
                ..
            }
        )
    }
}

/// A static declaration extracted from source, scoped to one
/// `(repo_id, commit_sha)` partition. Immutable once indexed; deleted en
/// bloc when its commit is purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSymbol {
    id: String,
    repo_id: String,
    commit_sha: String,
    symbol_type: SymbolType,
    name: String,
    qualified_name: String,
    signature: Option<String>,
    file_path: String,
    line_start: u32,
    line_end: u32,
    scope: SymbolScope,
    parent_symbol_id: Option<String>,
    detail: SymbolDetail,
}

impl CodeSymbol {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo_id: String,
        commit_sha: String,
        symbol_type: SymbolType,
        name: String,
        qualified_name: String,
        file_path: String,
        line_start: u32,
        line_end: u32,
        scope: SymbolScope,
        detail: SymbolDetail,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            repo_id,
            commit_sha,
            symbol_type,
            name,
            qualified_name,
            signature: None,
            file_path,
            line_start,
            line_end,
            scope,
            parent_symbol_id: None,
            detail,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repo_id: String,
        commit_sha: String,
        symbol_type: SymbolType,
        name: String,
        qualified_name: String,
        signature: Option<String>,
        file_path: String,
        line_start: u32,
        line_end: u32,
        scope: SymbolScope,
        parent_symbol_id: Option<String>,
        detail: SymbolDetail,
    ) -> Self {
        Self {
            id,
            repo_id,
            commit_sha,
            symbol_type,
            name,
            qualified_name,
            signature,
            file_path,
            line_start,
            line_end,
            scope,
            parent_symbol_id,
            detail,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_parent(mut self, parent_symbol_id: impl Into<String>) -> Self {
        self.parent_symbol_id = Some(parent_symbol_id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }

    pub fn symbol_type(&self) -> SymbolType {
        self.symbol_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn line_start(&self) -> u32 {
        self.line_start
    }

    pub fn line_end(&self) -> u32 {
        self.line_end
    }

    pub fn scope(&self) -> SymbolScope {
        self.scope
    }

    pub fn parent_symbol_id(&self) -> Option<&str> {
        self.parent_symbol_id.as_deref()
    }

    pub fn detail(&self) -> &SymbolDetail {
        &self.detail
    }

    pub fn language(&self) -> Language {
        self.detail.language()
    }

    pub fn location(&self) -> String {
        format!("{}:{}", self.file_path, self.line_start)
    }

    pub fn is_callable(&self) -> bool {
        self.symbol_type.is_callable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function_detail() -> SymbolDetail {
        SymbolDetail::Function {
            language: Language::Python,
            is_async: false,
            is_method: true,
            parameters: vec!["self".to_string(), "token".to_string()],
            decorators: vec![],
        }
    }

    #[test]
    fn test_symbol_creation() {
        let symbol = CodeSymbol::new(
            "repo-1".to_string(),
            "sha-1".to_string(),
            SymbolType::Method,
            "authenticate".to_string(),
            "AuthService.authenticate".to_string(),
            "app/auth.py".to_string(),
            10,
            25,
            SymbolScope::Class,
            function_detail(),
        )
        .with_parent("class-id")
        .with_signature("authenticate(self, token)");

        assert_eq!(symbol.name(), "authenticate");
        assert_eq!(symbol.qualified_name(), "AuthService.authenticate");
        assert_eq!(symbol.parent_symbol_id(), Some("class-id"));
        assert_eq!(symbol.location(), "app/auth.py:10");
        assert!(symbol.is_callable());
        assert!(symbol.line_start() <= symbol.line_end());
    }

    #[test]
    fn test_detail_serde_roundtrip() {
        let detail = SymbolDetail::Import {
            language: Language::Python,
            imported_names: vec!["login".to_string(), "logout".to_string()],
            alias: None,
            is_from_import: true,
        };

        let json = serde_json::to_string(&detail).unwrap();
        let parsed: SymbolDetail = serde_json::from_str(&json).unwrap();

        assert!(parsed.is_from_import());
        assert_eq!(parsed.imported_names(), &["login", "logout"]);
        assert_eq!(parsed.language(), Language::Python);
    }

    #[test]
    fn test_detail_accessors_on_other_kinds() {
        let detail = function_detail();
        assert!(detail.base_classes().is_empty());
        assert!(detail.imported_names().is_empty());
        assert!(detail.import_alias().is_none());
        assert!(!detail.is_from_import());
    }

    #[test]
    fn test_symbol_type_roundtrip() {
        for t in [
            SymbolType::Function,
            SymbolType::Method,
            SymbolType::Class,
            SymbolType::Import,
            SymbolType::Variable,
            SymbolType::Constant,
        ] {
            assert_eq!(SymbolType::parse(t.as_str()), Some(t));
        }
        assert_eq!(SymbolType::parse("macro"), None);
    }
}
