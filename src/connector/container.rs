use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::application::{
    ClonerService, EmbeddingService, GeneratorClient, KeyValueCache, MetadataRepository,
    ObjectStore, ParserService, SourcePackager, SymbolStore, VectorIndex, WorkQueue,
};
use crate::connector::adapter::{
    AnthropicGenerator, DuckdbMetadataRepository, DuckdbSymbolStore, DuckdbVectorIndex,
    GeminiEmbedding, GitCloner, HashEmbedding, LocalObjectStore, MemoryCache, MemoryWorkQueue,
    TarPackager, TokenBucket, TreeSitterParser,
};
use crate::domain::Config;
use crate::{
    DeleteRepositoryUseCase, HybridQueryService, IngestRepositoryUseCase, StaticQueryEngine,
};

pub struct ContainerConfig {
    pub data_dir: String,
    /// Use the remote embedder when a `GEMINI_API_KEY` is present;
    /// otherwise the local hash embedder runs with no rate limit.
    pub remote_embeddings: bool,
    pub config: Config,
}

/// Wires adapters into use cases. One container per process.
pub struct Container {
    metadata: Arc<DuckdbMetadataRepository>,
    symbol_store: Arc<dyn SymbolStore>,
    vector_index: Arc<dyn VectorIndex>,
    object_store: Arc<dyn ObjectStore>,
    embedding_service: Arc<dyn EmbeddingService>,
    generator: Arc<dyn GeneratorClient>,
    cloner: Arc<dyn ClonerService>,
    parser: Arc<dyn ParserService>,
    packager: Arc<dyn SourcePackager>,
    queue: Arc<dyn WorkQueue>,
    query_cache: Arc<dyn KeyValueCache>,
    config: Config,
}

impl Container {
    pub async fn new(container_config: ContainerConfig) -> Result<Self> {
        let config = container_config.config;
        let data_dir = PathBuf::from(&container_config.data_dir);
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("codequery.duckdb");
        let metadata = Arc::new(DuckdbMetadataRepository::new(&db_path)?);
        let shared_conn = metadata.shared_connection();

        let parser = Arc::new(TreeSitterParser::new());

        let embedding_cache: Arc<dyn KeyValueCache> = Arc::new(MemoryCache::new());
        let embedding_service: Arc<dyn EmbeddingService> = match std::env::var("GEMINI_API_KEY") {
            Ok(api_key) if container_config.remote_embeddings => {
                debug!("Using remote Gemini embeddings");
                let limiter = Arc::new(TokenBucket::per_minute(config.embed_rpm));
                Arc::new(
                    GeminiEmbedding::new(api_key, &config, limiter)
                        .with_cache(Arc::clone(&embedding_cache)),
                )
            }
            _ => {
                debug!("Using local hash embeddings");
                Arc::new(HashEmbedding::new())
            }
        };

        let symbol_store: Arc<dyn SymbolStore> =
            Arc::new(DuckdbSymbolStore::with_connection(Arc::clone(&shared_conn)).await?);
        let vector_index: Arc<dyn VectorIndex> = Arc::new(
            DuckdbVectorIndex::with_connection(shared_conn, embedding_service.dimensions())
                .await?,
        );

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalObjectStore::new(data_dir.join("objects")));

        let generator: Arc<dyn GeneratorClient> = Arc::new(AnthropicGenerator::from_env(
            Duration::from_secs(config.generator_timeout_s),
        ));

        Ok(Self {
            metadata,
            symbol_store,
            vector_index,
            object_store,
            embedding_service,
            generator,
            cloner: Arc::new(GitCloner::new()),
            parser,
            packager: Arc::new(TarPackager::new()),
            queue: Arc::new(MemoryWorkQueue::new()),
            query_cache: Arc::new(MemoryCache::new()),
            config,
        })
    }

    pub fn ingest_use_case(&self) -> IngestRepositoryUseCase {
        IngestRepositoryUseCase::new(
            self.metadata.clone(),
            self.symbol_store.clone(),
            self.vector_index.clone(),
            self.object_store.clone(),
            self.embedding_service.clone(),
            self.cloner.clone(),
            self.parser.clone(),
            self.packager.clone(),
            self.queue.clone(),
            self.config.clone(),
        )
    }

    pub fn query_service(&self) -> HybridQueryService {
        let static_engine = Arc::new(StaticQueryEngine::new(
            self.symbol_store.clone(),
            self.config.clone(),
        ));
        HybridQueryService::new(
            static_engine,
            self.vector_index.clone(),
            self.embedding_service.clone(),
            self.generator.clone(),
            self.config.clone(),
        )
        .with_result_cache(self.query_cache.clone())
    }

    pub fn delete_use_case(&self) -> DeleteRepositoryUseCase {
        DeleteRepositoryUseCase::new(
            self.metadata.clone(),
            self.symbol_store.clone(),
            self.vector_index.clone(),
            self.object_store.clone(),
        )
    }

    pub fn metadata(&self) -> Arc<dyn MetadataRepository> {
        self.metadata.clone()
    }

    pub fn symbol_store(&self) -> Arc<dyn SymbolStore> {
        self.symbol_store.clone()
    }

    pub fn queue(&self) -> Arc<dyn WorkQueue> {
        self.queue.clone()
    }
}
