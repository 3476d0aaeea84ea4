use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{QueryIntent, QueryType};

/// Ordered pattern table for structural questions. First match wins.
static STATIC_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    let table: &[(&str, &str)] = &[
        // Symbol lookup
        (
            r#"find\s+(?:function|class|method|variable)\s+['"]?(\w+)['"]?"#,
            "find_symbol",
        ),
        (
            r#"show\s+(?:me\s+)?(?:all\s+)?(functions|classes|methods)\s+(?:in|from)\s+['"]?(\w+)['"]?"#,
            "list_symbols",
        ),
        (r#"where\s+is\s+['"]?(\w+)['"]?\s+defined"#, "find_symbol"),
        (r"list\s+(?:all\s+)?(functions|classes|methods)", "list_symbols"),
        // Call graph
        (r#"(?:who|what)\s+calls\s+['"]?(\w+)['"]?"#, "find_callers"),
        (
            r#"find\s+(?:all\s+)?callers\s+of\s+['"]?(\w+)['"]?"#,
            "find_callers",
        ),
        (
            r#"what\s+(?:does\s+)?['"]?(\w+)['"]?\s+call"#,
            "find_callees",
        ),
        (
            r#"show\s+call\s+(?:chain|path)\s+from\s+['"]?(\w+)['"]?\s+to\s+['"]?(\w+)['"]?"#,
            "find_call_path",
        ),
        (
            r#"find\s+(?:all\s+)?functions\s+reachable\s+from\s+['"]?(\w+)['"]?"#,
            "find_reachable",
        ),
        // Dependencies
        (
            r#"what\s+(?:does\s+)?['"]?([\w./-]+)['"]?\s+import"#,
            "find_imports",
        ),
        (
            r#"(?:show|find)\s+dependencies\s+of\s+['"]?([\w./-]+)['"]?"#,
            "find_dependencies",
        ),
        (r#"what\s+imports\s+['"]?([\w./-]+)['"]?"#, "find_importers"),
    ];

    table
        .iter()
        .map(|(pattern, intent)| (Regex::new(pattern).expect("invalid static pattern"), *intent))
        .collect()
});

/// Questions needing both structure and understanding.
const HYBRID_KEYWORDS: &[&str] = &[
    "where is",
    "how does",
    "show me how",
    "architecture",
    "flow",
    "process",
    "mechanism",
];

/// Conceptual questions answered from retrieved code alone.
const SEMANTIC_KEYWORDS: &[&str] = &[
    "how",
    "why",
    "explain",
    "describe",
    "what is",
    "what's",
    "tell me about",
    "understand",
    "meaning",
    "purpose",
    "work",
    "implement",
    "design",
    "approach",
];

const STOPWORDS: &[&str] = &["the", "and", "for", "with", "from"];

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("invalid quoted pattern"));
static SNAKE_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("invalid ident pattern"));
static CAMEL_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$").expect("invalid ident pattern"));

/// Classifies questions as static, semantic, or hybrid by deterministic
/// pattern matching: static patterns first (confidence 0.9), then hybrid
/// keywords (0.7), then semantic keywords (0.8), defaulting to a hybrid
/// general query (0.5).
#[derive(Default)]
pub struct QueryRouter;

impl QueryRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, query: &str) -> QueryIntent {
        let query_lower = query.to_lowercase();
        let query_lower = query_lower.trim();

        for (pattern, intent) in STATIC_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(query_lower) {
                let entities: Vec<String> = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str().to_string())
                    .collect();
                return QueryIntent::new(QueryType::Static, *intent, entities, 0.9);
            }
        }

        if HYBRID_KEYWORDS.iter().any(|k| query_lower.contains(k)) {
            return QueryIntent::new(
                QueryType::Hybrid,
                "hybrid_analysis",
                self.extract_entities(query),
                0.7,
            );
        }

        if SEMANTIC_KEYWORDS.iter().any(|k| query_lower.contains(k)) {
            return QueryIntent::new(
                QueryType::Semantic,
                "semantic_search",
                self.extract_entities(query),
                0.8,
            );
        }

        QueryIntent::new(
            QueryType::Hybrid,
            "general_query",
            self.extract_entities(query),
            0.5,
        )
    }

    /// Pull likely code entities out of free text: quoted strings plus
    /// identifier-shaped words (snake_case or CamelCase), stopwords
    /// removed, first occurrence kept.
    fn extract_entities(&self, query: &str) -> Vec<String> {
        let mut entities: Vec<String> = Vec::new();
        let mut push = |candidate: String| {
            if !entities.contains(&candidate) {
                entities.push(candidate);
            }
        };

        for capture in QUOTED.captures_iter(query) {
            push(capture[1].to_string());
        }

        for word in query.split_whitespace() {
            let cleaned: String = word.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect();
            if cleaned.len() <= 2 || STOPWORDS.contains(&cleaned.as_str()) {
                continue;
            }
            if SNAKE_IDENT.is_match(&cleaned) || CAMEL_IDENT.is_match(&cleaned) {
                push(cleaned);
            }
        }

        entities
    }
}
