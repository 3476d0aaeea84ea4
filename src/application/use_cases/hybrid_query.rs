use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::application::{
    query_cache_key, EmbeddingService, GeneratorClient, KeyValueCache, QueryRouter,
    StaticQueryEngine, VectorIndex,
};
use crate::domain::{
    Config, DomainError, HybridQueryResult, QueryIntent, QueryType, RetrievedChunk,
    StaticQueryResult,
};

/// Answers questions by fusing graph queries, vector retrieval and a
/// text generator.
///
/// When the generator fails but static results exist, the static
/// formatted answer is returned verbatim instead of an error.
pub struct HybridQueryService {
    router: QueryRouter,
    static_engine: Arc<StaticQueryEngine>,
    vector_index: Arc<dyn VectorIndex>,
    embedding_service: Arc<dyn EmbeddingService>,
    generator: Arc<dyn GeneratorClient>,
    result_cache: Option<Arc<dyn KeyValueCache>>,
    config: Config,
}

impl HybridQueryService {
    pub fn new(
        static_engine: Arc<StaticQueryEngine>,
        vector_index: Arc<dyn VectorIndex>,
        embedding_service: Arc<dyn EmbeddingService>,
        generator: Arc<dyn GeneratorClient>,
        config: Config,
    ) -> Self {
        Self {
            router: QueryRouter::new(),
            static_engine,
            vector_index,
            embedding_service,
            generator,
            result_cache: None,
            config,
        }
    }

    pub fn with_result_cache(mut self, cache: Arc<dyn KeyValueCache>) -> Self {
        self.result_cache = Some(cache);
        self
    }

    pub async fn execute(
        &self,
        query: &str,
        repo_id: &str,
        commit_sha: &str,
        top_k: Option<usize>,
    ) -> Result<HybridQueryResult, DomainError> {
        let cache_key = query_cache_key(query, repo_id, commit_sha);
        if let Some(cache) = &self.result_cache {
            if let Some(bytes) = cache.get(&cache_key).await {
                if let Ok(cached) = serde_json::from_slice::<HybridQueryResult>(&bytes) {
                    debug!("Query cache hit");
                    return Ok(cached);
                }
            }
        }

        let intent = self.router.classify(query);
        info!(
            "Classified query as {} ({}, confidence {:.1})",
            intent.query_type, intent.primary_intent, intent.confidence
        );

        let static_results = if intent.query_type.uses_static_analysis() {
            Some(self.static_engine.execute(&intent, repo_id, commit_sha).await)
        } else {
            None
        };

        let retrieved_chunks = if intent.query_type.uses_semantic_search() {
            self.retrieve_chunks(query, repo_id, commit_sha, top_k).await
        } else {
            vec![]
        };

        let llm_answer = self
            .generate_answer(query, &intent, static_results.as_ref(), &retrieved_chunks)
            .await;

        let metadata = serde_json::json!({
            "intent": intent.primary_intent,
            "confidence": intent.confidence,
            "entities": intent.entities,
            "has_static": static_results.as_ref().map(|r| r.success).unwrap_or(false),
            "has_semantic": !retrieved_chunks.is_empty(),
        });

        let result = HybridQueryResult {
            query: query.to_string(),
            query_type: intent.query_type,
            static_results,
            retrieved_chunks,
            llm_answer,
            metadata,
        };

        if let Some(cache) = &self.result_cache {
            if let Ok(bytes) = serde_json::to_vec(&result) {
                cache
                    .set(
                        &cache_key,
                        bytes,
                        Duration::from_secs(self.config.query_cache_ttl_s),
                    )
                    .await;
            }
        }

        Ok(result)
    }

    async fn retrieve_chunks(
        &self,
        query: &str,
        repo_id: &str,
        commit_sha: &str,
        top_k: Option<usize>,
    ) -> Vec<RetrievedChunk> {
        let limit = top_k.unwrap_or(self.config.top_k);

        let vector = match self.embedding_service.embed_one(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Query embedding failed: {}", e);
                return vec![];
            }
        };

        match self
            .vector_index
            .search(
                &vector,
                repo_id,
                commit_sha,
                limit,
                self.config.vector_score_threshold,
            )
            .await
        {
            Ok(chunks) => {
                debug!("Retrieved {} semantic chunks", chunks.len());
                chunks
            }
            Err(e) => {
                warn!("Semantic search failed: {}", e);
                vec![]
            }
        }
    }

    async fn generate_answer(
        &self,
        query: &str,
        intent: &QueryIntent,
        static_results: Option<&StaticQueryResult>,
        chunks: &[RetrievedChunk],
    ) -> String {
        let prompt = build_prompt(query, intent, static_results, chunks);

        let generation = tokio::time::timeout(
            Duration::from_secs(self.config.generator_timeout_s),
            self.generator.generate_text(&prompt),
        )
        .await;

        match generation {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!("Generator failed: {}", e);
                self.static_fallback(static_results, &e.to_string())
            }
            Err(_) => {
                warn!(
                    "Generator timed out after {}s",
                    self.config.generator_timeout_s
                );
                self.static_fallback(static_results, "generator timed out")
            }
        }
    }

    fn static_fallback(&self, static_results: Option<&StaticQueryResult>, reason: &str) -> String {
        match static_results {
            Some(results) if results.success => results.formatted_answer.clone(),
            _ => format!("Unable to generate an answer ({})", reason),
        }
    }
}

/// Assemble the generator prompt. Three strategies: pure static answers
/// get a "don't speculate" reformat request, pure semantic questions get
/// only snippets, hybrid questions get both under explicit headers so the
/// generator can separate facts from implementation.
fn build_prompt(
    query: &str,
    intent: &QueryIntent,
    static_results: Option<&StaticQueryResult>,
    chunks: &[RetrievedChunk],
) -> String {
    let mut context = String::new();

    if let Some(results) = static_results.filter(|r| r.success) {
        context.push_str("## Static Analysis Results\n\n");
        context.push_str(&results.formatted_answer);
        context.push('\n');

        if !results.results.is_empty() {
            context.push_str("\n### Structured Data\n");
            for symbol in results.results.iter().take(10) {
                context.push_str(&format!(
                    "- {}: `{}` at {}:{}\n",
                    symbol.symbol_type, symbol.qualified_name, symbol.file_path, symbol.line_start
                ));
            }
        }
    }

    if !chunks.is_empty() {
        context.push_str("\n## Relevant Code Snippets\n");
        for (i, chunk) in chunks.iter().take(5).enumerate() {
            context.push_str(&format!(
                "\n### Snippet {} ({})\n```\n{}\n```\n",
                i + 1,
                chunk.file_path,
                chunk.content
            ));
        }
    }

    match intent.query_type {
        QueryType::Static => {
            let facts = static_results
                .map(|r| r.formatted_answer.as_str())
                .unwrap_or("");
            format!(
                "The user asked: \"{query}\"\n\n\
                 I have precise static analysis results:\n\n{facts}\n\n\
                 Please provide a clear, natural language response based on \
                 these facts. Don't speculate or add information not present \
                 in the facts. If the results are empty or incomplete, say so."
            )
        }
        QueryType::Semantic => format!(
            "The user asked: \"{query}\"\n\n\
             Here are relevant code snippets from the repository:\n\n{context}\n\
             Please answer the user's question based on these code snippets. \
             Focus on explaining concepts, implementations, and design \
             patterns you observe."
        ),
        QueryType::Hybrid => format!(
            "The user asked: \"{query}\"\n\n\
             I have both static analysis results and relevant code snippets:\n\n{context}\n\
             Please provide a comprehensive answer that:\n\
             1. Uses the static analysis facts for precise structural information\n\
             2. References the code snippets to explain implementation details\n\
             3. Combines both to give a complete picture\n\n\
             Be clear about what comes from static analysis (facts) vs code \
             inspection (implementation)."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{SymbolStore, VectorIndex};
    use crate::domain::{CallChainNode, Chunk, CodeSymbol, SymbolType};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct EmptySymbolStore;

    #[async_trait]
    impl SymbolStore for EmptySymbolStore {
        async fn save_symbols(&self, _: &[CodeSymbol]) -> Result<(), DomainError> {
            Ok(())
        }
        async fn save_relationships(
            &self,
            _: &[crate::domain::SymbolRelationship],
        ) -> Result<(), DomainError> {
            Ok(())
        }
        async fn load_symbols(&self, _: &str, _: &str) -> Result<Vec<CodeSymbol>, DomainError> {
            Ok(vec![])
        }
        async fn find_by_id(&self, _: &str) -> Result<Option<CodeSymbol>, DomainError> {
            Ok(None)
        }
        async fn find_by_name(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: bool,
            _: usize,
        ) -> Result<Vec<CodeSymbol>, DomainError> {
            Ok(vec![])
        }
        async fn find_by_type(
            &self,
            _: &str,
            _: &str,
            _: SymbolType,
            _: usize,
        ) -> Result<Vec<CodeSymbol>, DomainError> {
            Ok(vec![])
        }
        async fn find_in_file(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<Vec<CodeSymbol>, DomainError> {
            Ok(vec![])
        }
        async fn find_callers(&self, _: &str, _: u32) -> Result<Vec<CodeSymbol>, DomainError> {
            Ok(vec![])
        }
        async fn find_callees(&self, _: &str, _: u32) -> Result<Vec<CodeSymbol>, DomainError> {
            Ok(vec![])
        }
        async fn find_call_path(
            &self,
            _: &str,
            _: &str,
            _: u32,
        ) -> Result<Vec<CallChainNode>, DomainError> {
            Ok(vec![])
        }
        async fn file_dependencies(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<Vec<String>, DomainError> {
            Ok(vec![])
        }
        async fn file_dependents(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<Vec<String>, DomainError> {
            Ok(vec![])
        }
        async fn stats(&self, _: &str, _: &str) -> Result<Vec<(String, u64)>, DomainError> {
            Ok(vec![])
        }
        async fn delete_by_repository(&self, _: &str) -> Result<(), DomainError> {
            Ok(())
        }
    }

    struct EmptyVectorIndex;

    #[async_trait]
    impl VectorIndex for EmptyVectorIndex {
        async fn upsert(&self, _: &[Chunk], _: &[Vec<f32>]) -> Result<(), DomainError> {
            Ok(())
        }
        async fn search(
            &self,
            _: &[f32],
            _: &str,
            _: &str,
            _: usize,
            _: f32,
        ) -> Result<Vec<RetrievedChunk>, DomainError> {
            Ok(vec![])
        }
        async fn delete_by_repository(&self, _: &str) -> Result<(), DomainError> {
            Ok(())
        }
        async fn count(&self) -> Result<u64, DomainError> {
            Ok(0)
        }
    }

    struct FixedEmbedding;

    #[async_trait]
    impl EmbeddingService for FixedEmbedding {
        async fn embed_one(&self, _: &str) -> Result<Vec<f32>, DomainError> {
            Ok(vec![0.0; 8])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
            Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
        }
        fn dimensions(&self) -> usize {
            8
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingGenerator {
        called: AtomicBool,
    }

    #[async_trait]
    impl GeneratorClient for FailingGenerator {
        async fn generate_text(&self, _: &str) -> Result<String, DomainError> {
            self.called.store(true, Ordering::SeqCst);
            Err(DomainError::generator("connection refused"))
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl GeneratorClient for EchoGenerator {
        async fn generate_text(&self, prompt: &str) -> Result<String, DomainError> {
            Ok(format!("ANSWER[{}]", prompt.len()))
        }
    }

    fn service(generator: Arc<dyn GeneratorClient>) -> HybridQueryService {
        let config = Config::default();
        let static_engine = Arc::new(StaticQueryEngine::new(
            Arc::new(EmptySymbolStore),
            config.clone(),
        ));
        HybridQueryService::new(
            static_engine,
            Arc::new(EmptyVectorIndex),
            Arc::new(FixedEmbedding),
            generator,
            config,
        )
    }

    #[tokio::test]
    async fn test_static_query_shape() {
        let service = service(Arc::new(EchoGenerator));

        let result = service
            .execute("Who calls authenticate?", "repo", "sha", None)
            .await
            .unwrap();

        assert_eq!(result.query_type, QueryType::Static);
        assert!(result.static_results.is_some());
        assert!(result.retrieved_chunks.is_empty());
        assert!(result.llm_answer.starts_with("ANSWER["));
        assert_eq!(result.metadata["intent"], "find_callers");
    }

    #[tokio::test]
    async fn test_semantic_query_skips_static() {
        let service = service(Arc::new(EchoGenerator));

        let result = service
            .execute("Explain how dependency injection works", "repo", "sha", None)
            .await
            .unwrap();

        assert_eq!(result.query_type, QueryType::Semantic);
        assert!(result.static_results.is_none());
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back_to_static() {
        let generator = Arc::new(FailingGenerator {
            called: AtomicBool::new(false),
        });
        let service = service(generator.clone());

        let result = service
            .execute("Who calls authenticate?", "repo", "sha", None)
            .await
            .unwrap();

        assert!(generator.called.load(Ordering::SeqCst));
        // The empty-but-successful static answer is surfaced verbatim.
        assert_eq!(
            result.llm_answer,
            result.static_results.as_ref().unwrap().formatted_answer
        );
    }

    #[tokio::test]
    async fn test_generator_failure_without_static_reports_error() {
        let service = service(Arc::new(FailingGenerator {
            called: AtomicBool::new(false),
        }));

        let result = service
            .execute("Explain how caching works", "repo", "sha", None)
            .await
            .unwrap();

        assert!(result.llm_answer.contains("Unable to generate an answer"));
    }

    #[test]
    fn test_prompt_strategies() {
        let intent = QueryIntent::new(QueryType::Static, "find_callers", vec![], 0.9);
        let static_result = StaticQueryResult::empty("find_callers", "No callers found");
        let prompt = build_prompt("q", &intent, Some(&static_result), &[]);
        assert!(prompt.contains("Don't speculate"));

        let intent = QueryIntent::new(QueryType::Semantic, "semantic_search", vec![], 0.8);
        let chunk = RetrievedChunk {
            chunk_id: "c".to_string(),
            file_path: "a.py".to_string(),
            start_line: 1,
            end_line: 10,
            content: "def f(): pass".to_string(),
            score: 0.9,
        };
        let prompt = build_prompt("q", &intent, None, std::slice::from_ref(&chunk));
        assert!(prompt.contains("Relevant Code Snippets"));
        assert!(!prompt.contains("Static Analysis Results"));

        let intent = QueryIntent::new(QueryType::Hybrid, "hybrid_analysis", vec![], 0.7);
        let prompt = build_prompt("q", &intent, Some(&static_result), &[chunk]);
        assert!(prompt.contains("Static Analysis Results"));
        assert!(prompt.contains("Relevant Code Snippets"));
        assert!(prompt.contains("facts"));
    }
}
