use async_trait::async_trait;

use crate::domain::{DomainError, Language};

/// A function or method definition extracted from source.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Vec<String>,
    pub is_async: bool,
    pub decorators: Vec<String>,
    /// Containing class, when the function is a method.
    pub parent_class: Option<String>,
    pub line_start: u32,
    pub line_end: u32,
}

/// A class (or class-like type) definition.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    /// Base-class names as written in source, unresolved at this stage.
    pub base_classes: Vec<String>,
    pub decorators: Vec<String>,
    pub line_start: u32,
    pub line_end: u32,
}

/// An import statement.
#[derive(Debug, Clone)]
pub struct ImportDef {
    /// The module string as written (`auth`, `./utils/helper`, `..config`).
    pub module: String,
    /// Names bound by a `from X import a, b` style import.
    pub imported_names: Vec<String>,
    pub alias: Option<String>,
    pub is_from_import: bool,
    pub line: u32,
}

/// A top-level variable or constant declaration.
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub is_constant: bool,
    pub line: u32,
}

/// All symbol definitions extracted from one parsed file.
#[derive(Debug, Clone, Default)]
pub struct FileSymbols {
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    pub imports: Vec<ImportDef>,
    pub variables: Vec<VariableDef>,
}

impl FileSymbols {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.classes.is_empty()
            && self.imports.is_empty()
            && self.variables.is_empty()
    }
}

/// Parses source into typed symbol records and call-site names.
///
/// This is the only component that touches concrete syntax trees; every
/// downstream consumer works with the records it emits. Unparseable input
/// yields `Ok(None)` so the pipeline can skip the file without aborting.
#[async_trait]
pub trait ParserService: Send + Sync {
    fn supported_languages(&self) -> Vec<Language>;

    fn supports_language(&self, language: Language) -> bool {
        self.supported_languages().contains(&language)
    }

    /// Parse a file and extract its symbol definitions. Returns `None` for
    /// content the grammar cannot parse (binary data, syntax the grammar
    /// rejects).
    async fn parse_symbols(
        &self,
        content: &str,
        language: Language,
    ) -> Result<Option<FileSymbols>, DomainError>;

    /// Re-parse a file and collect the callee names invoked inside the
    /// definition spanning exactly `[line_start, line_end]`. For method
    /// calls like `obj.m()` the bare method name `m` is reported.
    async fn extract_calls(
        &self,
        content: &str,
        language: Language,
        line_start: u32,
        line_end: u32,
    ) -> Result<Vec<String>, DomainError>;
}
