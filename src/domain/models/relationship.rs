use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of directed edge between two symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Calls,
    Imports,
    Inherits,
    Uses,
    Defines,
    Exports,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Calls => "calls",
            RelationshipType::Imports => "imports",
            RelationshipType::Inherits => "inherits",
            RelationshipType::Uses => "uses",
            RelationshipType::Defines => "defines",
            RelationshipType::Exports => "exports",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "calls" => Some(RelationshipType::Calls),
            "imports" => Some(RelationshipType::Imports),
            "inherits" => Some(RelationshipType::Inherits),
            "uses" => Some(RelationshipType::Uses),
            "defines" => Some(RelationshipType::Defines),
            "exports" => Some(RelationshipType::Exports),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed edge between two symbols in the same `(repo, commit)`.
///
/// Both endpoints must live in the same partition; `calls` edges are never
/// self-referential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRelationship {
    id: String,
    repo_id: String,
    commit_sha: String,
    source_id: String,
    target_id: String,
    relationship_type: RelationshipType,
    metadata: serde_json::Value,
}

impl SymbolRelationship {
    pub fn new(
        repo_id: String,
        commit_sha: String,
        source_id: String,
        target_id: String,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            repo_id,
            commit_sha,
            source_id,
            target_id,
            relationship_type,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repo_id: String,
        commit_sha: String,
        source_id: String,
        target_id: String,
        relationship_type: RelationshipType,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id,
            repo_id,
            commit_sha,
            source_id,
            target_id,
            relationship_type,
            metadata,
        }
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

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn relationship_type(&self) -> RelationshipType {
        self.relationship_type
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn is_self_edge(&self) -> bool {
        self.source_id == self.target_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_creation() {
        let rel = SymbolRelationship::new(
            "repo".to_string(),
            "sha".to_string(),
            "a".to_string(),
            "b".to_string(),
            RelationshipType::Calls,
        )
        .with_metadata(serde_json::json!({ "call_name": "helper" }));

        assert_eq!(rel.source_id(), "a");
        assert_eq!(rel.target_id(), "b");
        assert_eq!(rel.relationship_type(), RelationshipType::Calls);
        assert!(!rel.is_self_edge());
        assert_eq!(rel.metadata()["call_name"], "helper");
    }

    #[test]
    fn test_relationship_type_roundtrip() {
        for t in [
            RelationshipType::Calls,
            RelationshipType::Imports,
            RelationshipType::Inherits,
            RelationshipType::Uses,
            RelationshipType::Defines,
            RelationshipType::Exports,
        ] {
            assert_eq!(RelationshipType::parse(t.as_str()), Some(t));
        }
        assert_eq!(RelationshipType::parse("references"), None);
    }
}
