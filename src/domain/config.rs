use serde::{Deserialize, Serialize};

/// Tunables for the ingestion and query pipeline.
///
/// Defaults match the free-tier-friendly settings the pipeline ships with;
/// every field can be overridden via `CODEQUERY_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Lines per chunk window.
    pub chunk_window_lines: usize,
    /// Overlap between adjacent windows.
    pub chunk_overlap_lines: usize,
    /// Files larger than this are skipped by the chunker.
    pub max_file_bytes: u64,
    /// Maximum texts per embedding call.
    pub embed_batch_size: usize,
    /// Requests per minute allowed against the remote embedder.
    pub embed_rpm: u32,
    /// Retries per text on 429/5xx before the chunk is dropped.
    pub embed_max_retries: u32,
    /// Concurrent outbound embedding calls.
    pub embed_concurrency: usize,
    /// Per-call timeout for embedding requests, seconds.
    pub embed_timeout_s: u64,
    /// Depth limit for recursive graph queries.
    pub call_graph_max_depth: u32,
    /// Minimum cosine score for a retrieved chunk to surface.
    pub vector_score_threshold: f32,
    /// Default semantic retrieval size.
    pub top_k: usize,
    /// Embedding cache TTL, seconds.
    pub embedding_cache_ttl_s: u64,
    /// Query-result cache TTL, seconds.
    pub query_cache_ttl_s: u64,
    /// Hard timeout for a shallow clone, seconds.
    pub clone_timeout_s: u64,
    /// Per-call timeout for generator requests, seconds.
    pub generator_timeout_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_window_lines: 300,
            chunk_overlap_lines: 50,
            max_file_bytes: 1_048_576,
            embed_batch_size: 64,
            embed_rpm: 10,
            embed_max_retries: 3,
            embed_concurrency: 2,
            embed_timeout_s: 120,
            call_graph_max_depth: 10,
            vector_score_threshold: 0.35,
            top_k: 5,
            embedding_cache_ttl_s: 86_400,
            query_cache_ttl_s: 3_600,
            clone_timeout_s: 600,
            generator_timeout_s: 60,
        }
    }
}

impl Config {
    /// Build a config from defaults, then apply `CODEQUERY_*` environment
    /// overrides. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        read_env("CODEQUERY_CHUNK_WINDOW_LINES", &mut config.chunk_window_lines);
        read_env("CODEQUERY_CHUNK_OVERLAP_LINES", &mut config.chunk_overlap_lines);
        read_env("CODEQUERY_MAX_FILE_BYTES", &mut config.max_file_bytes);
        read_env("CODEQUERY_EMBED_BATCH_SIZE", &mut config.embed_batch_size);
        read_env("CODEQUERY_EMBED_RPM", &mut config.embed_rpm);
        read_env("CODEQUERY_EMBED_MAX_RETRIES", &mut config.embed_max_retries);
        read_env("CODEQUERY_EMBED_CONCURRENCY", &mut config.embed_concurrency);
        read_env("CODEQUERY_EMBED_TIMEOUT_S", &mut config.embed_timeout_s);
        read_env("CODEQUERY_CALL_GRAPH_MAX_DEPTH", &mut config.call_graph_max_depth);
        read_env("CODEQUERY_VECTOR_SCORE_THRESHOLD", &mut config.vector_score_threshold);
        read_env("CODEQUERY_TOP_K", &mut config.top_k);
        read_env("CODEQUERY_EMBEDDING_CACHE_TTL_S", &mut config.embedding_cache_ttl_s);
        read_env("CODEQUERY_QUERY_CACHE_TTL_S", &mut config.query_cache_ttl_s);
        read_env("CODEQUERY_CLONE_TIMEOUT_S", &mut config.clone_timeout_s);
        read_env("CODEQUERY_GENERATOR_TIMEOUT_S", &mut config.generator_timeout_s);
        config
    }

    pub fn chunk_stride(&self) -> usize {
        self.chunk_window_lines
            .saturating_sub(self.chunk_overlap_lines)
            .max(1)
    }
}

fn read_env<T: std::str::FromStr>(name: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("Ignoring unparseable {}={}", name, raw),
        }
    }
}
