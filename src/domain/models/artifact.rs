use serde::{Deserialize, Serialize};

use super::{RepoProvider, RelationshipType, SymbolType};

/// Current artifact layout version recorded in each manifest.
pub const MANIFEST_VERSION: &str = "v2";

/// Kinds of derived artifacts stored alongside a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    SourceTree,
    GraphData,
    AstData,
    Manifest,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::SourceTree => "source_tree",
            ArtifactKind::GraphData => "graph_data",
            ArtifactKind::AstData => "ast_data",
            ArtifactKind::Manifest => "manifest",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::SourceTree => "application/gzip",
            ArtifactKind::GraphData | ArtifactKind::AstData => "application/msgpack",
            ArtifactKind::Manifest => "application/json",
        }
    }
}

/// Object-store key for one artifact:
/// `{provider}/{owner}/{name}/{commit_sha}/{artifact_kind}`.
pub fn artifact_key(
    provider: RepoProvider,
    owner: &str,
    name: &str,
    commit_sha: &str,
    kind: ArtifactKind,
) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        provider.as_str(),
        owner,
        name,
        commit_sha,
        kind.as_str()
    )
}

/// Prefix under which every commit of a repository stores artifacts.
pub fn repository_prefix(provider: RepoProvider, owner: &str, name: &str) -> String {
    format!("{}/{}/{}/", provider.as_str(), owner, name)
}

/// Small JSON summary stored alongside a commit's artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub commit: String,
    pub nodes_count: u64,
    pub version: String,
}

impl Manifest {
    pub fn new(commit: impl Into<String>, nodes_count: u64) -> Self {
        Self {
            commit: commit.into(),
            nodes_count,
            version: MANIFEST_VERSION.to_string(),
        }
    }
}

/// Node in the persisted graph summary artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub kind: SymbolType,
    pub file_path: String,
}

/// Edge in the persisted graph summary artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: RelationshipType,
}

/// Msgpack-serialized snapshot of a commit's symbol graph, stored as the
/// `graph_data` artifact.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_key_layout() {
        let key = artifact_key(
            RepoProvider::Github,
            "tiangolo",
            "fastapi",
            "abc123",
            ArtifactKind::Manifest,
        );
        assert_eq!(key, "github/tiangolo/fastapi/abc123/manifest");
    }

    #[test]
    fn test_repository_prefix_covers_all_commits() {
        let prefix = repository_prefix(RepoProvider::Github, "owner", "repo");
        let key = artifact_key(
            RepoProvider::Github,
            "owner",
            "repo",
            "sha",
            ArtifactKind::SourceTree,
        );
        assert!(key.starts_with(&prefix));
    }

    #[test]
    fn test_manifest_version() {
        let manifest = Manifest::new("abc", 42);
        assert_eq!(manifest.version, "v2");

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"nodes_count\":42"));
    }

    #[test]
    fn test_graph_data_msgpack_roundtrip() {
        let data = GraphData {
            nodes: vec![GraphNode {
                id: "n1".to_string(),
                name: "main".to_string(),
                kind: SymbolType::Function,
                file_path: "main.py".to_string(),
            }],
            edges: vec![],
        };

        let bytes = rmp_serde::to_vec_named(&data).unwrap();
        let parsed: GraphData = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(parsed.nodes.len(), 1);
        assert_eq!(parsed.nodes[0].name, "main");
    }
}
