use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::domain::{CodeSymbol, Language, SymbolType};

/// Per-file mapping from locally visible names to their defining symbols.
pub type ImportGraph = HashMap<String, HashMap<String, CodeSymbol>>;

/// Extension probe order for JS/TS relative imports.
const JS_EXTENSIONS: &[&str] = &[".js", ".ts", ".tsx", ".jsx", "/index.js", "/index.ts"];

/// Builds the import resolution map for one `(repo, commit)`.
///
/// Handles Python absolute and relative (leading-dot) imports and JS/TS
/// relative specifiers. Bare `import X` / `import X as Y` statements do
/// not bind names for call resolution; only `from X import a, b` forms do.
/// Bare JS specifiers (packages) are external and skipped.
#[derive(Default)]
pub struct ImportResolver {
    file_exists: HashSet<String>,
}

impl ImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the full map. Resolving the same module string twice within
    /// one build yields the same target (the file set is fixed up front).
    pub fn build_import_graph(&mut self, symbols: &[CodeSymbol]) -> ImportGraph {
        let mut symbols_by_file: HashMap<String, Vec<&CodeSymbol>> = HashMap::new();
        self.file_exists.clear();

        for symbol in symbols {
            symbols_by_file
                .entry(symbol.file_path().to_string())
                .or_default()
                .push(symbol);
            self.file_exists.insert(symbol.file_path().to_string());
        }

        let mut import_graph: ImportGraph = HashMap::new();
        let mut total_imports = 0usize;
        let mut total_resolved = 0usize;

        for (file_path, file_symbols) in &symbols_by_file {
            let bindings = import_graph.entry(file_path.clone()).or_default();

            for import_sym in file_symbols
                .iter()
                .filter(|s| s.symbol_type() == SymbolType::Import)
            {
                total_imports += 1;
                let resolved = self.resolve_import(import_sym, file_path, &symbols_by_file);
                total_resolved += resolved.len();
                bindings.extend(resolved);
            }
        }

        info!(
            "Import graph built: {} import statements, {} names resolved across {} files",
            total_imports,
            total_resolved,
            import_graph.len()
        );

        import_graph
    }

    fn resolve_import(
        &self,
        import_sym: &CodeSymbol,
        current_file: &str,
        symbols_by_file: &HashMap<String, Vec<&CodeSymbol>>,
    ) -> HashMap<String, CodeSymbol> {
        let mut result = HashMap::new();

        let module = import_sym.name();
        let language = import_sym.language();

        let target_file = match self.module_to_file_path(module, current_file, language) {
            Some(path) => path,
            None => {
                debug!(
                    "Import '{}' from {} is external or unresolved",
                    module, current_file
                );
                return result;
            }
        };

        let target_symbols = match symbols_by_file.get(&target_file) {
            Some(symbols) => symbols,
            None => return result,
        };

        if import_sym.detail().is_from_import() {
            for name in import_sym.detail().imported_names() {
                if let Some(symbol) = Self::find_symbol_in_file(name, target_symbols) {
                    debug!(
                        "Resolved '{}' from {} -> {}::{}",
                        name,
                        module,
                        symbol.file_path(),
                        symbol.qualified_name()
                    );
                    result.insert(name.clone(), symbol.clone());
                } else {
                    debug!("Could not find '{}' in {}", name, target_file);
                }
            }
        } else {
            // `import X` and `import X as Y` would need synthetic module
            // symbols to bind call names; left unresolved.
            debug!(
                "Module import '{}' in {} not bound for call resolution",
                module, current_file
            );
        }

        result
    }

    /// Convert a module string to a repository-relative file path, or
    /// `None` for external modules.
    fn module_to_file_path(
        &self,
        module: &str,
        current_file: &str,
        language: Language,
    ) -> Option<String> {
        match language {
            Language::Python => self.resolve_python_module(module, current_file),
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                self.resolve_js_module(module, current_file)
            }
            _ => None,
        }
    }

    fn resolve_python_module(&self, module: &str, current_file: &str) -> Option<String> {
        if module.starts_with('.') {
            return self.resolve_python_relative(module, current_file);
        }

        let base = module.replace('.', "/");
        let candidates = [format!("{}.py", base), format!("{}/__init__.py", base)];
        candidates
            .into_iter()
            .find(|c| self.file_exists.contains(c))
    }

    /// `..utils` from `app/services/api.py` resolves against `app/`: each
    /// leading dot beyond the first ascends one directory.
    fn resolve_python_relative(&self, module: &str, current_file: &str) -> Option<String> {
        let level = module.chars().take_while(|c| *c == '.').count();
        let remaining = &module[level..];

        let mut dir = parent_dir(current_file);
        for _ in 0..level.saturating_sub(1) {
            dir = parent_dir(&dir);
        }

        if remaining.is_empty() {
            let candidate = join_path(&dir, "__init__.py");
            return self.file_exists.contains(&candidate).then_some(candidate);
        }

        let base = join_path(&dir, &remaining.replace('.', "/"));
        let candidates = [format!("{}.py", base), format!("{}/__init__.py", base)];
        candidates
            .into_iter()
            .find(|c| self.file_exists.contains(c))
    }

    fn resolve_js_module(&self, module: &str, current_file: &str) -> Option<String> {
        if !module.starts_with("./") && !module.starts_with("../") {
            // Bare specifier: an external package.
            return None;
        }

        let base = normalize_path(&join_path(&parent_dir(current_file), module));
        JS_EXTENSIONS
            .iter()
            .map(|ext| format!("{}{}", base, ext))
            .find(|c| self.file_exists.contains(c))
    }

    /// Name lookup within a file: exact name first, then qualified-name
    /// suffix (catches methods referenced by bare name).
    fn find_symbol_in_file<'a>(
        name: &str,
        symbols: &'a [&'a CodeSymbol],
    ) -> Option<&'a CodeSymbol> {
        if let Some(symbol) = symbols.iter().find(|s| s.name() == name) {
            return Some(symbol);
        }
        let suffix = format!(".{}", name);
        symbols
            .iter()
            .find(|s| s.qualified_name().ends_with(&suffix))
            .copied()
    }
}

fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn join_path(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", dir, rest)
    }
}

/// Collapse `.` and `..` segments without touching the filesystem.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
