use async_trait::async_trait;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Parser, Query, QueryCursor, Tree};

use crate::application::{
    looks_like_constant, ClassDef, FileSymbols, FunctionDef, ImportDef, ParserService, VariableDef,
};
use crate::domain::{DomainError, Language};

/// Node kinds that delimit a function or method definition, across all
/// wired grammars. Used to locate the definition spanning a symbol's
/// recorded line range.
const DEFINITION_KINDS: &[&str] = &[
    "function_definition",
    "function_declaration",
    "method_definition",
    "method_declaration",
    "function_item",
    "arrow_function",
    "function_expression",
];

/// Node kinds of call expressions, across all wired grammars.
const CALL_KINDS: &[&str] = &[
    "call",
    "call_expression",
    "function_call_expression",
    "member_call_expression",
    "method_invocation",
    "macro_invocation",
];

pub struct TreeSitterParser {
    supported_languages: Vec<Language>,
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported_languages: vec![
                Language::Python,
                Language::JavaScript,
                Language::TypeScript,
                Language::Tsx,
                Language::Go,
                Language::Rust,
                Language::Php,
                Language::Cpp,
                Language::Swift,
                Language::Kotlin,
            ],
        }
    }

    fn get_ts_language(&self, language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
            Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
            _ => None,
        }
    }

    fn parse_tree(&self, content: &str, language: Language) -> Option<Tree> {
        let ts_language = self.get_ts_language(language)?;
        let mut parser = Parser::new();
        parser.set_language(&ts_language).ok()?;
        parser.parse(content, None)
    }

    /// Declaration query patterns for languages handled generically
    /// (everything except Python and the JS family, which get a full
    /// walking extractor).
    fn get_declaration_patterns(&self, language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (function_item name: (identifier) @name) @function
                (struct_item name: (type_identifier) @name) @class
                (enum_item name: (type_identifier) @name) @class
                (trait_item name: (type_identifier) @name) @class
                "#
            }
            Language::Go => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_declaration name: (field_identifier) @name) @function
                (type_declaration (type_spec name: (type_identifier) @name)) @class
                "#
            }
            Language::Php => {
                r#"
                (function_definition name: (name) @name) @function
                (method_declaration name: (name) @name) @function
                (class_declaration name: (name) @name) @class
                (interface_declaration name: (name) @name) @class
                (trait_declaration name: (name) @name) @class
                "#
            }
            Language::Cpp => {
                r#"
                (class_specifier name: (type_identifier) @name) @class
                (struct_specifier name: (type_identifier) @name) @class
                (function_definition
                  declarator: (function_declarator declarator: (identifier) @name)) @function
                (function_definition
                  declarator: (function_declarator declarator: (field_identifier) @name)) @function
                "#
            }
            Language::Swift => {
                r#"
                (function_declaration name: (simple_identifier) @name) @function
                (class_declaration name: (type_identifier) @name) @class
                (protocol_declaration name: (type_identifier) @name) @class
                "#
            }
            Language::Kotlin => {
                r#"
                (function_declaration (simple_identifier) @name) @function
                (class_declaration (type_identifier) @name) @class
                (object_declaration (type_identifier) @name) @class
                "#
            }
            _ => "",
        }
    }

    /// Extract declarations via the query table. Parameters and
    /// decorators are not recovered on this path.
    fn extract_via_queries(
        &self,
        content: &str,
        tree: &Tree,
        language: Language,
    ) -> FileSymbols {
        let mut symbols = FileSymbols::default();

        let ts_language = match self.get_ts_language(language) {
            Some(lang) => lang,
            None => return symbols,
        };
        let query_source = self.get_declaration_patterns(language);
        if query_source.is_empty() {
            return symbols;
        }
        let query = match Query::new(&ts_language, query_source) {
            Ok(query) => query,
            Err(e) => {
                debug!("Declaration query failed for {}: {}", language, e);
                return symbols;
            }
        };

        let capture_names: Vec<&str> = query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&query, tree.root_node(), content.as_bytes());

        while let Some(query_match) = matches_iter.next() {
            let mut name: Option<String> = None;
            let mut main_node: Option<Node> = None;
            let mut kind = "";

            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                if capture_name == "name" {
                    name = Some(content[capture.node.byte_range()].to_string());
                } else {
                    main_node = Some(capture.node);
                    kind = capture_name;
                }
            }

            let (Some(name), Some(node)) = (name, main_node) else {
                continue;
            };
            let line_start = node.start_position().row as u32 + 1;
            let line_end = node.end_position().row as u32 + 1;

            match kind {
                "function" => symbols.functions.push(FunctionDef {
                    name,
                    parameters: vec![],
                    is_async: false,
                    decorators: vec![],
                    parent_class: None,
                    line_start,
                    line_end,
                }),
                "class" => symbols.classes.push(ClassDef {
                    name,
                    base_classes: vec![],
                    decorators: vec![],
                    line_start,
                    line_end,
                }),
                _ => {}
            }
        }

        symbols
    }

    // ── Python extraction ────────────────────────────────────────────────

    fn extract_python(&self, content: &str, tree: &Tree) -> FileSymbols {
        let mut symbols = FileSymbols::default();
        let root = tree.root_node();
        let mut cursor = root.walk();

        for child in root.named_children(&mut cursor) {
            self.python_statement(content, child, None, &[], &mut symbols);
        }

        symbols
    }

    /// Handle one module- or class-level Python statement.
    fn python_statement(
        &self,
        content: &str,
        node: Node,
        parent_class: Option<&str>,
        decorators: &[String],
        symbols: &mut FileSymbols,
    ) {
        match node.kind() {
            "decorated_definition" => {
                let mut decs = Vec::new();
                let mut cursor = node.walk();
                let mut inner = None;
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "decorator" => {
                            let text = node_text(content, child);
                            decs.push(text.trim_start_matches('@').to_string());
                        }
                        _ => inner = Some(child),
                    }
                }
                if let Some(inner) = inner {
                    self.python_statement(content, inner, parent_class, &decs, symbols);
                }
            }
            "function_definition" => {
                if let Some(func) =
                    self.python_function(content, node, parent_class, decorators.to_vec())
                {
                    symbols.functions.push(func);
                }
            }
            "class_definition" => {
                let Some(name_node) = node.child_by_field_name("name") else {
                    return;
                };
                let class_name = node_text(content, name_node);

                let mut base_classes = Vec::new();
                if let Some(superclasses) = node.child_by_field_name("superclasses") {
                    let mut cursor = superclasses.walk();
                    for base in superclasses.named_children(&mut cursor) {
                        if matches!(base.kind(), "identifier" | "attribute") {
                            base_classes.push(node_text(content, base));
                        }
                    }
                }

                symbols.classes.push(ClassDef {
                    name: class_name.clone(),
                    base_classes,
                    decorators: decorators.to_vec(),
                    line_start: node.start_position().row as u32 + 1,
                    line_end: node.end_position().row as u32 + 1,
                });

                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for statement in body.named_children(&mut cursor) {
                        self.python_statement(
                            content,
                            statement,
                            Some(class_name.as_str()),
                            &[],
                            symbols,
                        );
                    }
                }
            }
            "import_statement" => {
                // `import a.b [as c], d`
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "dotted_name" => symbols.imports.push(ImportDef {
                            module: node_text(content, child),
                            imported_names: vec![],
                            alias: None,
                            is_from_import: false,
                            line: node.start_position().row as u32 + 1,
                        }),
                        "aliased_import" => {
                            let module = child
                                .child_by_field_name("name")
                                .map(|n| node_text(content, n))
                                .unwrap_or_default();
                            let alias = child
                                .child_by_field_name("alias")
                                .map(|n| node_text(content, n));
                            symbols.imports.push(ImportDef {
                                module,
                                imported_names: vec![],
                                alias,
                                is_from_import: false,
                                line: node.start_position().row as u32 + 1,
                            });
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                // `from a.b import c [as d], e`. Leading dots mark
                // relative imports and stay part of the module string.
                let module = node
                    .child_by_field_name("module_name")
                    .map(|n| node_text(content, n))
                    .unwrap_or_default();

                let mut imported_names = Vec::new();
                let mut alias = None;
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if node.child_by_field_name("module_name") == Some(child) {
                        continue;
                    }
                    match child.kind() {
                        "dotted_name" | "identifier" => {
                            imported_names.push(node_text(content, child));
                        }
                        "aliased_import" => {
                            if let Some(name) = child.child_by_field_name("name") {
                                imported_names.push(node_text(content, name));
                            }
                            alias = child
                                .child_by_field_name("alias")
                                .map(|n| node_text(content, n));
                        }
                        _ => {}
                    }
                }

                symbols.imports.push(ImportDef {
                    module,
                    imported_names,
                    alias,
                    is_from_import: true,
                    line: node.start_position().row as u32 + 1,
                });
            }
            "expression_statement" if parent_class.is_none() => {
                // Module-level `NAME = value` assignments.
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() != "assignment" {
                        continue;
                    }
                    if let Some(left) = child.child_by_field_name("left") {
                        if left.kind() == "identifier" {
                            let name = node_text(content, left);
                            symbols.variables.push(VariableDef {
                                is_constant: looks_like_constant(&name),
                                name,
                                line: node.start_position().row as u32 + 1,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn python_function(
        &self,
        content: &str,
        node: Node,
        parent_class: Option<&str>,
        decorators: Vec<String>,
    ) -> Option<FunctionDef> {
        let name = node_text(content, node.child_by_field_name("name")?);

        let mut parameters = Vec::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                parameters.push(node_text(content, param));
            }
        }

        let is_async = node
            .child(0)
            .map(|first| first.kind() == "async")
            .unwrap_or(false);

        Some(FunctionDef {
            name,
            parameters,
            is_async,
            decorators,
            parent_class: parent_class.map(String::from),
            line_start: node.start_position().row as u32 + 1,
            line_end: node.end_position().row as u32 + 1,
        })
    }

    // ── JavaScript / TypeScript extraction ───────────────────────────────

    fn extract_js(&self, content: &str, tree: &Tree) -> FileSymbols {
        let mut symbols = FileSymbols::default();
        let root = tree.root_node();
        let mut cursor = root.walk();

        for child in root.named_children(&mut cursor) {
            self.js_statement(content, child, &mut symbols);
        }

        symbols
    }

    fn js_statement(&self, content: &str, node: Node, symbols: &mut FileSymbols) {
        match node.kind() {
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    self.js_statement(content, declaration, symbols);
                }
            }
            "function_declaration" => {
                if let Some(func) = self.js_function(content, node, None) {
                    symbols.functions.push(func);
                }
            }
            "class_declaration" => {
                let Some(name_node) = node.child_by_field_name("name") else {
                    return;
                };
                let class_name = node_text(content, name_node);

                let mut base_classes = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "class_heritage" {
                        collect_heritage_names(content, child, &mut base_classes);
                    }
                }

                symbols.classes.push(ClassDef {
                    name: class_name.clone(),
                    base_classes,
                    decorators: vec![],
                    line_start: node.start_position().row as u32 + 1,
                    line_end: node.end_position().row as u32 + 1,
                });

                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for member in body.named_children(&mut cursor) {
                        if member.kind() == "method_definition" {
                            if let Some(func) =
                                self.js_function(content, member, Some(class_name.as_str()))
                            {
                                symbols.functions.push(func);
                            }
                        }
                    }
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name_node) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    if name_node.kind() != "identifier" {
                        continue;
                    }
                    let name = node_text(content, name_node);

                    let value_kind = declarator
                        .child_by_field_name("value")
                        .map(|v| v.kind())
                        .unwrap_or("");
                    if matches!(value_kind, "arrow_function" | "function_expression") {
                        // `const handler = async () => {...}` declares a function.
                        let value = declarator.child_by_field_name("value").unwrap();
                        symbols.functions.push(FunctionDef {
                            name,
                            parameters: js_parameters(content, value),
                            is_async: node_text(content, value).starts_with("async"),
                            decorators: vec![],
                            parent_class: None,
                            line_start: node.start_position().row as u32 + 1,
                            line_end: node.end_position().row as u32 + 1,
                        });
                    } else {
                        symbols.variables.push(VariableDef {
                            is_constant: looks_like_constant(&name),
                            name,
                            line: node.start_position().row as u32 + 1,
                        });
                    }
                }
            }
            "import_statement" => {
                let Some(source) = node.child_by_field_name("source") else {
                    return;
                };
                let module = node_text(content, source)
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_string();

                let mut imported_names = Vec::new();
                let mut alias = None;
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "import_clause" {
                        let mut clause_cursor = child.walk();
                        for part in child.named_children(&mut clause_cursor) {
                            match part.kind() {
                                "identifier" => imported_names.push(node_text(content, part)),
                                "named_imports" => {
                                    let mut spec_cursor = part.walk();
                                    for spec in part.named_children(&mut spec_cursor) {
                                        if spec.kind() == "import_specifier" {
                                            if let Some(name) = spec.child_by_field_name("name") {
                                                imported_names.push(node_text(content, name));
                                            }
                                        }
                                    }
                                }
                                "namespace_import" => {
                                    let mut ns_cursor = part.walk();
                                    for ns in part.named_children(&mut ns_cursor) {
                                        if ns.kind() == "identifier" {
                                            alias = Some(node_text(content, ns));
                                        }
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                }

                let is_from_import = !imported_names.is_empty();
                symbols.imports.push(ImportDef {
                    module,
                    imported_names,
                    alias,
                    is_from_import,
                    line: node.start_position().row as u32 + 1,
                });
            }
            _ => {}
        }
    }

    fn js_function(
        &self,
        content: &str,
        node: Node,
        parent_class: Option<&str>,
    ) -> Option<FunctionDef> {
        let name = node_text(content, node.child_by_field_name("name")?);

        let is_async = {
            let mut cursor = node.walk();
            let has_async = node
                .children(&mut cursor)
                .any(|child| child.kind() == "async");
            has_async
        };

        Some(FunctionDef {
            name,
            parameters: js_parameters(content, node),
            is_async,
            decorators: vec![],
            parent_class: parent_class.map(String::from),
            line_start: node.start_position().row as u32 + 1,
            line_end: node.end_position().row as u32 + 1,
        })
    }

    // ── Call extraction ──────────────────────────────────────────────────

    /// Locate the definition node spanning the given lines: exact match
    /// first, else the tightest definition containing the range.
    fn find_definition_node<'a>(
        root: Node<'a>,
        line_start: u32,
        line_end: u32,
    ) -> Option<Node<'a>> {
        let mut exact = None;
        let mut tightest: Option<Node> = None;

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let node_start = node.start_position().row as u32 + 1;
            let node_end = node.end_position().row as u32 + 1;

            if DEFINITION_KINDS.contains(&node.kind()) {
                if node_start == line_start && node_end == line_end {
                    exact = Some(node);
                    break;
                }
                if node_start <= line_start && node_end >= line_end {
                    let replace = match tightest {
                        None => true,
                        Some(best) => {
                            let best_span = best.end_position().row - best.start_position().row;
                            (node.end_position().row - node.start_position().row) < best_span
                        }
                    };
                    if replace {
                        tightest = Some(node);
                    }
                }
            }

            if node_start <= line_end && node_end >= line_start {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    stack.push(child);
                }
            }
        }

        exact.or(tightest)
    }

    /// Collect callee names in a subtree. Dotted and scoped callees
    /// (`obj.m`, `Mod::f`, `this->g`) yield their final segment.
    fn collect_calls(content: &str, node: Node, calls: &mut Vec<String>) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if CALL_KINDS.contains(&current.kind()) {
                let callee = current
                    .child_by_field_name("function")
                    .or_else(|| current.child_by_field_name("name"))
                    .or_else(|| current.named_child(0));
                if let Some(callee) = callee {
                    let raw = node_text(content, callee);
                    if let Some(name) = final_name_segment(&raw) {
                        calls.push(name);
                    }
                }
            }

            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                stack.push(child);
            }
        }
    }
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParserService for TreeSitterParser {
    fn supported_languages(&self) -> Vec<Language> {
        self.supported_languages.clone()
    }

    async fn parse_symbols(
        &self,
        content: &str,
        language: Language,
    ) -> Result<Option<FileSymbols>, DomainError> {
        let Some(tree) = self.parse_tree(content, language) else {
            return Ok(None);
        };

        let symbols = match language {
            Language::Python => self.extract_python(content, &tree),
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                self.extract_js(content, &tree)
            }
            _ => self.extract_via_queries(content, &tree, language),
        };

        Ok(Some(symbols))
    }

    async fn extract_calls(
        &self,
        content: &str,
        language: Language,
        line_start: u32,
        line_end: u32,
    ) -> Result<Vec<String>, DomainError> {
        let Some(tree) = self.parse_tree(content, language) else {
            return Ok(vec![]);
        };

        let Some(definition) = Self::find_definition_node(tree.root_node(), line_start, line_end)
        else {
            debug!(
                "No definition node spanning lines {}-{}",
                line_start, line_end
            );
            return Ok(vec![]);
        };

        let mut calls = Vec::new();
        Self::collect_calls(content, definition, &mut calls);
        Ok(calls)
    }
}

fn node_text(content: &str, node: Node) -> String {
    content[node.byte_range()].to_string()
}

/// `a.b.c` → `c`, `A::f` → `f`, `p->q` → `q`. Returns `None` for
/// callee expressions that end without an identifier (e.g. `arr[0]()`).
fn final_name_segment(raw: &str) -> Option<String> {
    let last = raw
        .rsplit(|c: char| c == '.' || c == ':' || c == '>')
        .next()?
        .trim();
    let cleaned: String = last
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!cleaned.is_empty() && !cleaned.chars().next().unwrap().is_ascii_digit())
        .then_some(cleaned)
}

fn js_parameters(content: &str, node: Node) -> Vec<String> {
    let Some(params) = node
        .child_by_field_name("parameters")
        .or_else(|| node.child_by_field_name("parameter"))
    else {
        return vec![];
    };
    if params.kind() == "identifier" {
        return vec![node_text(content, params)];
    }
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .map(|param| node_text(content, param))
        .collect()
}

/// Pull base-class names from a `class_heritage` subtree.
fn collect_heritage_names(content: &str, node: Node, names: &mut Vec<String>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if matches!(current.kind(), "identifier" | "type_identifier") {
            names.push(node_text(content, current));
            continue;
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TreeSitterParser {
        TreeSitterParser::new()
    }

    const PYTHON_SOURCE: &str = r#"from auth import login, logout
import os
import numpy as np

MAX_RETRIES = 3

class AuthService(BaseService):
    def verify(self, token):
        decoded = decode(token)
        return login(decoded)

    async def refresh(self):
        self.verify(None)

def standalone():
    return logout()
"#;

    #[tokio::test]
    async fn test_python_symbols() {
        let symbols = parser()
            .parse_symbols(PYTHON_SOURCE, Language::Python)
            .await
            .unwrap()
            .unwrap();

        let class = &symbols.classes[0];
        assert_eq!(class.name, "AuthService");
        assert_eq!(class.base_classes, vec!["BaseService"]);

        let verify = symbols
            .functions
            .iter()
            .find(|f| f.name == "verify")
            .unwrap();
        assert_eq!(verify.parent_class.as_deref(), Some("AuthService"));
        assert_eq!(verify.parameters, vec!["self", "token"]);
        assert!(!verify.is_async);

        let refresh = symbols
            .functions
            .iter()
            .find(|f| f.name == "refresh")
            .unwrap();
        assert!(refresh.is_async);

        let standalone = symbols
            .functions
            .iter()
            .find(|f| f.name == "standalone")
            .unwrap();
        assert!(standalone.parent_class.is_none());
    }

    #[tokio::test]
    async fn test_python_imports() {
        let symbols = parser()
            .parse_symbols(PYTHON_SOURCE, Language::Python)
            .await
            .unwrap()
            .unwrap();

        let from_import = symbols
            .imports
            .iter()
            .find(|i| i.module == "auth")
            .unwrap();
        assert!(from_import.is_from_import);
        assert_eq!(from_import.imported_names, vec!["login", "logout"]);

        let plain = symbols.imports.iter().find(|i| i.module == "os").unwrap();
        assert!(!plain.is_from_import);
        assert!(plain.imported_names.is_empty());

        let aliased = symbols
            .imports
            .iter()
            .find(|i| i.module == "numpy")
            .unwrap();
        assert_eq!(aliased.alias.as_deref(), Some("np"));
    }

    #[tokio::test]
    async fn test_python_constants() {
        let symbols = parser()
            .parse_symbols(PYTHON_SOURCE, Language::Python)
            .await
            .unwrap()
            .unwrap();

        let constant = &symbols.variables[0];
        assert_eq!(constant.name, "MAX_RETRIES");
        assert!(constant.is_constant);
    }

    #[tokio::test]
    async fn test_python_call_extraction() {
        let symbols = parser()
            .parse_symbols(PYTHON_SOURCE, Language::Python)
            .await
            .unwrap()
            .unwrap();
        let verify = symbols
            .functions
            .iter()
            .find(|f| f.name == "verify")
            .unwrap();

        let mut calls = parser()
            .extract_calls(
                PYTHON_SOURCE,
                Language::Python,
                verify.line_start,
                verify.line_end,
            )
            .await
            .unwrap();
        calls.sort();

        assert_eq!(calls, vec!["decode", "login"]);
    }

    #[tokio::test]
    async fn test_python_method_call_takes_final_segment() {
        let symbols = parser()
            .parse_symbols(PYTHON_SOURCE, Language::Python)
            .await
            .unwrap()
            .unwrap();
        let refresh = symbols
            .functions
            .iter()
            .find(|f| f.name == "refresh")
            .unwrap();

        let calls = parser()
            .extract_calls(
                PYTHON_SOURCE,
                Language::Python,
                refresh.line_start,
                refresh.line_end,
            )
            .await
            .unwrap();

        assert_eq!(calls, vec!["verify"]);
    }

    const TS_SOURCE: &str = r#"import { Component, render } from './ui/widget';
import * as utils from './utils';
import React from 'react';

export const MAX_SIZE = 100;

export class Panel extends Component {
    draw(ctx) {
        render(this.layout(ctx));
    }

    layout(ctx) {
        return ctx;
    }
}

export function mount(el) {
    const panel = new Panel();
    panel.draw(el);
}
"#;

    #[tokio::test]
    async fn test_typescript_symbols() {
        let symbols = parser()
            .parse_symbols(TS_SOURCE, Language::TypeScript)
            .await
            .unwrap()
            .unwrap();

        let class = &symbols.classes[0];
        assert_eq!(class.name, "Panel");
        assert_eq!(class.base_classes, vec!["Component"]);

        let draw = symbols.functions.iter().find(|f| f.name == "draw").unwrap();
        assert_eq!(draw.parent_class.as_deref(), Some("Panel"));

        let mount = symbols
            .functions
            .iter()
            .find(|f| f.name == "mount")
            .unwrap();
        assert!(mount.parent_class.is_none());

        let constant = symbols
            .variables
            .iter()
            .find(|v| v.name == "MAX_SIZE")
            .unwrap();
        assert!(constant.is_constant);
    }

    #[tokio::test]
    async fn test_typescript_imports() {
        let symbols = parser()
            .parse_symbols(TS_SOURCE, Language::TypeScript)
            .await
            .unwrap()
            .unwrap();

        let named = symbols
            .imports
            .iter()
            .find(|i| i.module == "./ui/widget")
            .unwrap();
        assert!(named.is_from_import);
        assert_eq!(named.imported_names, vec!["Component", "render"]);

        let namespace = symbols
            .imports
            .iter()
            .find(|i| i.module == "./utils")
            .unwrap();
        assert_eq!(namespace.alias.as_deref(), Some("utils"));

        let default = symbols
            .imports
            .iter()
            .find(|i| i.module == "react")
            .unwrap();
        assert_eq!(default.imported_names, vec!["React"]);
    }

    #[tokio::test]
    async fn test_typescript_calls() {
        let symbols = parser()
            .parse_symbols(TS_SOURCE, Language::TypeScript)
            .await
            .unwrap()
            .unwrap();
        let draw = symbols.functions.iter().find(|f| f.name == "draw").unwrap();

        let mut calls = parser()
            .extract_calls(TS_SOURCE, Language::TypeScript, draw.line_start, draw.line_end)
            .await
            .unwrap();
        calls.sort();

        assert_eq!(calls, vec!["layout", "render"]);
    }

    #[tokio::test]
    async fn test_rust_declarations() {
        let source = r#"
pub struct Engine {
    state: u32,
}

pub fn start(engine: &Engine) -> u32 {
    warm_up(engine.state)
}

fn warm_up(state: u32) -> u32 {
    state + 1
}
"#;
        let symbols = parser()
            .parse_symbols(source, Language::Rust)
            .await
            .unwrap()
            .unwrap();

        assert!(symbols.classes.iter().any(|c| c.name == "Engine"));
        assert!(symbols.functions.iter().any(|f| f.name == "start"));
        assert!(symbols.functions.iter().any(|f| f.name == "warm_up"));
    }

    #[tokio::test]
    async fn test_rust_calls() {
        let source = "fn start() { warm_up(); }\nfn warm_up() {}\n";
        let symbols = parser()
            .parse_symbols(source, Language::Rust)
            .await
            .unwrap()
            .unwrap();
        let start = symbols.functions.iter().find(|f| f.name == "start").unwrap();

        let calls = parser()
            .extract_calls(source, Language::Rust, start.line_start, start.line_end)
            .await
            .unwrap();

        assert_eq!(calls, vec!["warm_up"]);
    }

    #[tokio::test]
    async fn test_go_declarations() {
        let source = r#"
package main

type Server struct {
    port int
}

func (s *Server) Start() {
    s.listen()
}

func listen() {}
"#;
        let symbols = parser()
            .parse_symbols(source, Language::Go)
            .await
            .unwrap()
            .unwrap();

        assert!(symbols.classes.iter().any(|c| c.name == "Server"));
        assert!(symbols.functions.iter().any(|f| f.name == "Start"));
        assert!(symbols.functions.iter().any(|f| f.name == "listen"));
    }

    #[tokio::test]
    async fn test_unknown_language_unsupported() {
        assert!(!parser().supports_language(Language::Ruby));
        assert!(!parser().supports_language(Language::Unknown));
    }

    #[test]
    fn test_final_name_segment() {
        assert_eq!(final_name_segment("foo"), Some("foo".to_string()));
        assert_eq!(final_name_segment("obj.method"), Some("method".to_string()));
        assert_eq!(final_name_segment("a.b.c"), Some("c".to_string()));
        assert_eq!(final_name_segment("Mod::func"), Some("func".to_string()));
        assert_eq!(final_name_segment("ptr->call"), Some("call".to_string()));
        assert_eq!(final_name_segment(""), None);
    }
}
