use serde::{Deserialize, Serialize};

use super::{CodeSymbol, SymbolType};

/// Routing decision for a user question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Static,
    Semantic,
    Hybrid,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Static => "static",
            QueryType::Semantic => "semantic",
            QueryType::Hybrid => "hybrid",
        }
    }

    pub fn uses_static_analysis(&self) -> bool {
        matches!(self, QueryType::Static | QueryType::Hybrid)
    }

    pub fn uses_semantic_search(&self) -> bool {
        matches!(self, QueryType::Semantic | QueryType::Hybrid)
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified intent of a user question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    pub query_type: QueryType,
    pub primary_intent: String,
    pub entities: Vec<String>,
    pub confidence: f32,
}

impl QueryIntent {
    pub fn new(
        query_type: QueryType,
        primary_intent: impl Into<String>,
        entities: Vec<String>,
        confidence: f32,
    ) -> Self {
        Self {
            query_type,
            primary_intent: primary_intent.into(),
            entities,
            confidence,
        }
    }
}

/// A symbol flattened for presentation in query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub id: String,
    pub symbol_type: SymbolType,
    pub name: String,
    pub qualified_name: String,
    pub file_path: String,
    pub line_start: u32,
}

impl From<&CodeSymbol> for SymbolSummary {
    fn from(symbol: &CodeSymbol) -> Self {
        Self {
            id: symbol.id().to_string(),
            symbol_type: symbol.symbol_type(),
            name: symbol.name().to_string(),
            qualified_name: symbol.qualified_name().to_string(),
            file_path: symbol.file_path().to_string(),
            line_start: symbol.line_start(),
        }
    }
}

/// One step on a call chain returned by path queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallChainNode {
    pub symbol_id: String,
    pub name: String,
    pub qualified_name: String,
    pub file_path: String,
    pub depth: u32,
}

/// Result of executing a structural query against the symbol graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticQueryResult {
    pub success: bool,
    pub query_type: String,
    pub results: Vec<SymbolSummary>,
    pub metadata: serde_json::Value,
    pub formatted_answer: String,
}

impl StaticQueryResult {
    pub fn failure(query_type: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            success: false,
            query_type: query_type.into(),
            results: vec![],
            metadata: serde_json::Value::Null,
            formatted_answer: answer.into(),
        }
    }

    /// A query that executed fine but matched nothing. Distinct from
    /// `failure`: downstream consumers treat it as a trustworthy "no".
    pub fn empty(query_type: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            success: true,
            query_type: query_type.into(),
            results: vec![],
            metadata: serde_json::Value::Null,
            formatted_answer: answer.into(),
        }
    }
}

/// A chunk surfaced by vector retrieval, with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub score: f32,
}

/// Full answer produced by the hybrid query pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridQueryResult {
    pub query: String,
    pub query_type: QueryType,
    pub static_results: Option<StaticQueryResult>,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub llm_answer: String,
    pub metadata: serde_json::Value,
}
