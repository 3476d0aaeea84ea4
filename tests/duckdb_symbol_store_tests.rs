//! Graph-query tests for the DuckDB symbol store, including cycle
//! safety of the recursive traversals.

use std::collections::HashSet;

use codequery::{
    CodeSymbol, DuckdbMetadataRepository, DuckdbSymbolStore, Language, RelationshipType,
    SymbolDetail, SymbolRelationship, SymbolScope, SymbolStore, SymbolType,
};

fn function(name: &str, file: &str, line: u32) -> CodeSymbol {
    CodeSymbol::new(
        "repo".to_string(),
        "sha".to_string(),
        SymbolType::Function,
        name.to_string(),
        name.to_string(),
        file.to_string(),
        line,
        line + 5,
        SymbolScope::Global,
        SymbolDetail::Function {
            language: Language::Python,
            is_async: false,
            is_method: false,
            parameters: vec![],
            decorators: vec![],
        },
    )
}

fn calls(from: &CodeSymbol, to: &CodeSymbol) -> SymbolRelationship {
    SymbolRelationship::new(
        "repo".to_string(),
        "sha".to_string(),
        from.id().to_string(),
        to.id().to_string(),
        RelationshipType::Calls,
    )
}

async fn store() -> DuckdbSymbolStore {
    let metadata = DuckdbMetadataRepository::in_memory().expect("open duckdb");
    DuckdbSymbolStore::with_connection(metadata.shared_connection())
        .await
        .expect("symbol schema")
}

/// A → B → C → A plus a D hanging off B.
async fn cycle_graph(
    store: &DuckdbSymbolStore,
) -> (CodeSymbol, CodeSymbol, CodeSymbol, CodeSymbol) {
    let a = function("alpha", "a.py", 1);
    let b = function("beta", "b.py", 1);
    let c = function("gamma", "c.py", 1);
    let d = function("delta", "d.py", 1);

    store
        .save_symbols(&[a.clone(), b.clone(), c.clone(), d.clone()])
        .await
        .unwrap();
    store
        .save_relationships(&[calls(&a, &b), calls(&b, &c), calls(&c, &a), calls(&b, &d)])
        .await
        .unwrap();

    (a, b, c, d)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_direct_callees() {
    let store = store().await;
    let (a, b, _, _) = cycle_graph(&store).await;

    let callees = store.find_callees(a.id(), 1).await.unwrap();
    assert_eq!(callees.len(), 1);
    assert_eq!(callees[0].id(), b.id());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transitive_callees_terminate_on_cycle() {
    let store = store().await;
    let (a, _, _, _) = cycle_graph(&store).await;

    let reachable = store.find_callees(a.id(), 10).await.unwrap();
    let names: HashSet<&str> = reachable.iter().map(|s| s.name()).collect();

    // The cycle loops back to alpha, so alpha is reachable from itself.
    assert_eq!(names, HashSet::from(["alpha", "beta", "gamma", "delta"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transitive_callers() {
    let store = store().await;
    let (a, b, c, _) = cycle_graph(&store).await;

    let direct = store.find_callers(b.id(), 1).await.unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].id(), a.id());

    let transitive = store.find_callers(b.id(), 2).await.unwrap();
    let ids: HashSet<&str> = transitive.iter().map(|s| s.id()).collect();
    assert!(ids.contains(a.id()));
    assert!(ids.contains(c.id()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_path_through_cycle() {
    let store = store().await;
    let (a, b, c, _) = cycle_graph(&store).await;

    let path = store.find_call_path(a.id(), c.id(), 10).await.unwrap();
    let ids: Vec<&str> = path.iter().map(|n| n.symbol_id.as_str()).collect();

    assert_eq!(ids, vec![a.id(), b.id(), c.id()]);
    assert_eq!(path[0].depth, 0);
    assert_eq!(path[2].depth, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_path_to_self() {
    let store = store().await;
    let (a, _, _, _) = cycle_graph(&store).await;

    let path = store.find_call_path(a.id(), a.id(), 10).await.unwrap();
    assert_eq!(path.len(), 1);
    assert_eq!(path[0].symbol_id, a.id());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_path_absent() {
    let store = store().await;
    let (_, _, _, d) = cycle_graph(&store).await;
    let isolated = function("omega", "o.py", 1);
    store.save_symbols(&[isolated.clone()]).await.unwrap();

    let path = store.find_call_path(d.id(), isolated.id(), 10).await.unwrap();
    assert!(path.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_depth_limit_is_hard_stop() {
    let store = store().await;
    let (a, _, _, _) = cycle_graph(&store).await;

    let shallow = store.find_callees(a.id(), 2).await.unwrap();
    let names: HashSet<&str> = shallow.iter().map(|s| s.name()).collect();

    // Two hops from alpha: beta, then gamma and delta. Alpha itself is
    // three hops away and must not appear.
    assert_eq!(names, HashSet::from(["beta", "gamma", "delta"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exact_and_fuzzy_name_lookup() {
    let store = store().await;
    cycle_graph(&store).await;

    let exact = store
        .find_by_name("repo", "sha", "alpha", false, 10)
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);

    // A one-character typo still resolves through the fuzzy path.
    let fuzzy = store
        .find_by_name("repo", "sha", "alpah", true, 10)
        .await
        .unwrap();
    assert!(fuzzy.iter().any(|s| s.name() == "alpha"));

    let missing = store
        .find_by_name("repo", "sha", "zzzz", false, 10)
        .await
        .unwrap();
    assert!(missing.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_symbol_roundtrip_preserves_detail() {
    let store = store().await;
    let original = function("alpha", "a.py", 1).with_signature("alpha()");
    store.save_symbols(&[original.clone()]).await.unwrap();

    let loaded = store.find_by_id(original.id()).await.unwrap().unwrap();
    assert_eq!(loaded.name(), "alpha");
    assert_eq!(loaded.signature(), Some("alpha()"));
    assert_eq!(loaded.language(), Language::Python);
    assert_eq!(loaded.scope(), SymbolScope::Global);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stats_group_by_type() {
    let store = store().await;
    cycle_graph(&store).await;

    let stats = store.stats("repo", "sha").await.unwrap();
    assert_eq!(stats, vec![("function".to_string(), 4)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_by_repository_cascades() {
    let store = store().await;
    let (a, _, _, _) = cycle_graph(&store).await;

    store.delete_by_repository("repo").await.unwrap();

    assert!(store.find_by_id(a.id()).await.unwrap().is_none());
    assert!(store.load_symbols("repo", "sha").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shared_connection_between_adapters() {
    // Metadata and symbols share one DuckDB handle, as in production.
    let metadata = DuckdbMetadataRepository::in_memory().unwrap();
    let store = DuckdbSymbolStore::with_connection(metadata.shared_connection())
        .await
        .unwrap();

    let symbol = function("solo", "s.py", 1);
    store.save_symbols(std::slice::from_ref(&symbol)).await.unwrap();

    let by_type = store
        .find_by_type("repo", "sha", SymbolType::Function, 10)
        .await
        .unwrap();
    assert_eq!(by_type.len(), 1);
}
