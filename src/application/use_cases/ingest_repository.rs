use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{stream, StreamExt};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::application::{
    CallGraphBuilder, Chunker, ClonerService, EmbeddingService, MetadataRepository, ObjectStore,
    ParserService, SourcePackager, SymbolIndexer, SymbolStore, VectorIndex, WorkQueue, WorkTree,
};
use crate::domain::{
    artifact_key, ArtifactKind, Chunk, CodeSymbol, Config, DomainError, GraphData, GraphEdge,
    GraphNode, IngestionRun, IngestionStatus, Manifest, Repository, RunStage, SymbolRelationship,
};

/// Error string recorded on externally cancelled runs.
const CANCELLED: &str = "cancelled";

/// What the caller gets back from `ingest` before any work happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub run_id: String,
    pub repo_id: String,
    pub status: IngestionStatus,
}

/// Drives the ingestion pipeline for one repository commit.
///
/// The pipeline is sequential across stages; each stage's status advance
/// is committed before its work starts, so a crashed worker leaves a
/// durable trace. Stage outputs are keyed by `(repo, commit)` and written
/// idempotently, which makes re-running a commit safe. Per-file and
/// per-chunk errors stay local; only infrastructure failures flip the run
/// to FAILED.
pub struct IngestRepositoryUseCase {
    metadata: Arc<dyn MetadataRepository>,
    symbol_store: Arc<dyn SymbolStore>,
    vector_index: Arc<dyn VectorIndex>,
    object_store: Arc<dyn ObjectStore>,
    embedding_service: Arc<dyn EmbeddingService>,
    cloner: Arc<dyn ClonerService>,
    packager: Arc<dyn SourcePackager>,
    queue: Arc<dyn WorkQueue>,
    indexer: SymbolIndexer,
    call_graph_builder: CallGraphBuilder,
    chunker: Chunker,
    config: Config,
}

impl IngestRepositoryUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metadata: Arc<dyn MetadataRepository>,
        symbol_store: Arc<dyn SymbolStore>,
        vector_index: Arc<dyn VectorIndex>,
        object_store: Arc<dyn ObjectStore>,
        embedding_service: Arc<dyn EmbeddingService>,
        cloner: Arc<dyn ClonerService>,
        parser: Arc<dyn ParserService>,
        packager: Arc<dyn SourcePackager>,
        queue: Arc<dyn WorkQueue>,
        config: Config,
    ) -> Self {
        Self {
            metadata,
            symbol_store,
            vector_index,
            object_store,
            embedding_service,
            cloner,
            packager,
            queue,
            indexer: SymbolIndexer::new(parser.clone()),
            call_graph_builder: CallGraphBuilder::new(parser),
            chunker: Chunker::new(&config),
            config,
        }
    }

    /// Register a repository (if new), resolve its HEAD, create a PENDING
    /// run and enqueue it for a worker.
    pub async fn ingest(
        &self,
        repo_url: &str,
        branch: Option<&str>,
        is_private: bool,
    ) -> Result<IngestReceipt, DomainError> {
        let repo_ref = self.cloner.parse_url(repo_url)?;
        let commit_sha = self.cloner.resolve_head(&repo_ref, branch).await?;

        let repository = match self
            .metadata
            .find_repository(repo_ref.provider, &repo_ref.owner, &repo_ref.name)
            .await?
        {
            Some(repository) => repository,
            None => {
                let mut repository = Repository::new(
                    repo_ref.provider,
                    repo_ref.owner.clone(),
                    repo_ref.name.clone(),
                )
                .with_private(is_private);
                if let Some(branch) = branch {
                    repository = repository.with_default_branch(branch);
                }
                self.metadata.save_repository(&repository).await?;
                repository
            }
        };

        let run = IngestionRun::new(repository.id().to_string(), commit_sha.clone());
        self.metadata.create_run(&run).await?;
        self.queue.enqueue(run.id()).await?;

        info!(
            "Queued ingestion run {} for {} at {}",
            run.id(),
            repository.full_name(),
            commit_sha
        );

        Ok(IngestReceipt {
            run_id: run.id().to_string(),
            repo_id: repository.id().to_string(),
            status: IngestionStatus::Pending,
        })
    }

    pub async fn status(&self, run_id: &str) -> Result<IngestionRun, DomainError> {
        self.metadata
            .find_run(run_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("run {}", run_id)))
    }

    /// Mark a run as externally cancelled. The worker notices at the next
    /// stage boundary; partial artifacts are left in place.
    pub async fn cancel(&self, run_id: &str) -> Result<(), DomainError> {
        self.metadata.fail_run(run_id, CANCELLED).await
    }

    /// Consume the work queue until it is closed.
    pub async fn run_worker(&self) {
        while let Some(run_id) = self.queue.dequeue().await {
            if let Err(e) = self.process(&run_id).await {
                warn!("Run {} failed: {}", run_id, e);
            }
            self.queue.ack(&run_id).await;
        }
    }

    /// Process one queued run. Safe under at-least-once delivery: the
    /// atomic PENDING → RUNNING claim makes duplicate deliveries no-ops.
    pub async fn process(&self, run_id: &str) -> Result<(), DomainError> {
        if !self.metadata.claim_run(run_id).await? {
            debug!("Run {} already claimed or finished, skipping", run_id);
            return Ok(());
        }

        let run = self.status(run_id).await?;
        let repository = self
            .metadata
            .find_repository_by_id(run.repo_id())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("repository {}", run.repo_id())))?;

        info!(
            "Starting run {} for {} at {}",
            run_id,
            repository.full_name(),
            run.commit_sha()
        );
        let started = Instant::now();

        match self.run_pipeline(&repository, &run).await {
            Ok(degraded) => {
                self.metadata.complete_run(run_id, degraded).await?;
                self.metadata
                    .mark_indexed(repository.id(), run.commit_sha())
                    .await?;
                info!(
                    "Run {} completed in {:.1}s{}",
                    run_id,
                    started.elapsed().as_secs_f64(),
                    if degraded { " (degraded)" } else { "" }
                );
                Ok(())
            }
            Err(e) if is_cancellation(&e) => {
                // The FAILED("cancelled") record was already written.
                info!("Run {} cancelled", run_id);
                Ok(())
            }
            Err(e) => {
                self.metadata.fail_run(run_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        repository: &Repository,
        run: &IngestionRun,
    ) -> Result<bool, DomainError> {
        let run_id = run.id();
        let repo_id = repository.id();
        let commit_sha = run.commit_sha();

        // Stage 1: clone.
        self.advance(run_id, RunStage::Clone).await?;
        let repo_ref = crate::application::RepoRef {
            provider: repository.provider(),
            owner: repository.owner().to_string(),
            name: repository.name().to_string(),
        };
        let worktree = tokio::time::timeout(
            Duration::from_secs(self.config.clone_timeout_s),
            self.cloner.clone_at(&repo_ref, commit_sha),
        )
        .await
        .map_err(|_| {
            DomainError::clone_timeout(format!(
                "clone of {} exceeded {}s",
                repository.full_name(),
                self.config.clone_timeout_s
            ))
        })??;

        // Stage 2: parse and index symbols, then archive the source tree
        // so the graph stage can read function bodies back from storage.
        self.check_cancelled(run_id).await?;
        self.advance(run_id, RunStage::Index).await?;
        let symbols = self.index_tree(worktree.as_ref(), repo_id, commit_sha).await?;

        let tarball = self.packager.pack(worktree.path()).await?;
        let source_key = artifact_key(
            repository.provider(),
            repository.owner(),
            repository.name(),
            commit_sha,
            ArtifactKind::SourceTree,
        );
        self.object_store
            .put(
                &source_key,
                tarball.clone(),
                ArtifactKind::SourceTree.content_type(),
            )
            .await?;
        debug!("Source tree uploaded to {}", source_key);

        // Stage 3: resolve imports and build the call graph.
        self.check_cancelled(run_id).await?;
        self.advance(run_id, RunStage::Graph).await?;
        let archive = self.packager.open(tarball)?;
        let (relationships, graph_stats) = self
            .call_graph_builder
            .build(repo_id, commit_sha, &symbols, archive.as_ref())
            .await?;
        self.symbol_store.save_relationships(&relationships).await?;
        info!(
            "Graph stage: {} call edges, {} inherits edges, {} unresolved",
            graph_stats.call_relationships,
            graph_stats.inheritance_relationships,
            graph_stats.unresolved_calls
        );

        // Stage 4: chunk, embed, upsert.
        self.check_cancelled(run_id).await?;
        self.advance(run_id, RunStage::Embed).await?;
        let chunks = self
            .chunker
            .chunk_tree(worktree.path(), repo_id, commit_sha);
        let degraded = self.embed_and_upsert(&chunks).await?;

        // Stage 5: graph snapshot and manifest artifacts.
        self.check_cancelled(run_id).await?;
        self.advance(run_id, RunStage::Archive).await?;
        let graph_data = build_graph_data(&symbols, &relationships);
        let graph_bytes = rmp_serde::to_vec_named(&graph_data)
            .map_err(|e| DomainError::internal(format!("graph serialization failed: {}", e)))?;
        self.object_store
            .put(
                &artifact_key(
                    repository.provider(),
                    repository.owner(),
                    repository.name(),
                    commit_sha,
                    ArtifactKind::GraphData,
                ),
                graph_bytes,
                ArtifactKind::GraphData.content_type(),
            )
            .await?;

        let manifest = Manifest::new(commit_sha, symbols.len() as u64);
        let manifest_bytes = serde_json::to_vec(&manifest)
            .map_err(|e| DomainError::internal(format!("manifest serialization failed: {}", e)))?;
        self.object_store
            .put(
                &artifact_key(
                    repository.provider(),
                    repository.owner(),
                    repository.name(),
                    commit_sha,
                    ArtifactKind::Manifest,
                ),
                manifest_bytes,
                ArtifactKind::Manifest.content_type(),
            )
            .await?;

        Ok(degraded)
    }

    /// Walk the working tree, index each file, and persist symbols in
    /// per-file batches. Unreadable and unparseable files are skipped.
    async fn index_tree(
        &self,
        worktree: &dyn WorkTree,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let root = worktree.path();
        let files: Vec<_> = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .collect();

        info!("Indexing {} files", files.len());

        let mut all_symbols = Vec::new();
        for entry in files {
            let rel_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            if let Ok(meta) = entry.metadata() {
                if meta.len() > self.config.max_file_bytes {
                    debug!("Skipping oversized file {} ({} bytes)", rel_path, meta.len());
                    continue;
                }
            }

            let content = match tokio::fs::read_to_string(entry.path()).await {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping unreadable file {}: {}", rel_path, e);
                    continue;
                }
            };

            let symbols = self
                .indexer
                .index_file(&rel_path, &content, repo_id, commit_sha)
                .await;
            if symbols.is_empty() {
                continue;
            }

            self.symbol_store.save_symbols(&symbols).await?;
            all_symbols.extend(symbols);
        }

        info!("Indexed {} symbols", all_symbols.len());
        Ok(all_symbols)
    }

    /// Embed chunks in bounded batches with bounded concurrency, then
    /// upsert. A failed batch retries chunk-by-chunk; chunks that still
    /// fail are dropped. Returns whether the run is degraded (more than
    /// half the chunks lost).
    async fn embed_and_upsert(&self, chunks: &[Chunk]) -> Result<bool, DomainError> {
        if chunks.is_empty() {
            return Ok(false);
        }

        let batches: Vec<&[Chunk]> = chunks.chunks(self.config.embed_batch_size).collect();
        info!(
            "Embedding {} chunks in {} batches",
            chunks.len(),
            batches.len()
        );

        let embedder = &self.embedding_service;
        let batch_results: Vec<(Vec<Chunk>, Vec<Vec<f32>>, u64)> = stream::iter(batches)
            .map(|batch| async move {
                let texts: Vec<String> = batch.iter().map(|c| c.content().to_string()).collect();
                match embedder.embed_batch(&texts).await {
                    Ok(vectors) => (batch.to_vec(), vectors, 0u64),
                    Err(e) => {
                        warn!("Batch embedding failed ({}), retrying per chunk", e);
                        let mut kept_chunks = Vec::new();
                        let mut kept_vectors = Vec::new();
                        let mut failed = 0u64;
                        for chunk in batch {
                            match embedder.embed_one(chunk.content()).await {
                                Ok(vector) => {
                                    kept_chunks.push(chunk.clone());
                                    kept_vectors.push(vector);
                                }
                                Err(e) => {
                                    warn!("Dropping chunk {}: {}", chunk.location(), e);
                                    failed += 1;
                                }
                            }
                        }
                        (kept_chunks, kept_vectors, failed)
                    }
                }
            })
            .buffer_unordered(self.config.embed_concurrency.max(1))
            .collect()
            .await;

        let mut failed_total = 0u64;
        for (batch_chunks, vectors, failed) in batch_results {
            failed_total += failed;
            if !batch_chunks.is_empty() {
                self.vector_index.upsert(&batch_chunks, &vectors).await?;
            }
        }

        let degraded = failed_total * 2 > chunks.len() as u64;
        if failed_total > 0 {
            warn!(
                "Dropped {}/{} chunks during embedding{}",
                failed_total,
                chunks.len(),
                if degraded { "; run marked degraded" } else { "" }
            );
        }
        Ok(degraded)
    }

    async fn advance(&self, run_id: &str, stage: RunStage) -> Result<(), DomainError> {
        debug!("Run {} entering stage {}", run_id, stage.as_str());
        self.metadata.advance_run(run_id, stage).await
    }

    /// Stage-boundary check for external cancellation.
    async fn check_cancelled(&self, run_id: &str) -> Result<(), DomainError> {
        let run = self.status(run_id).await?;
        if run.status() == IngestionStatus::Failed {
            return Err(DomainError::internal(CANCELLED));
        }
        Ok(())
    }
}

fn is_cancellation(error: &DomainError) -> bool {
    matches!(error, DomainError::Internal(msg) if msg == CANCELLED)
}

fn build_graph_data(symbols: &[CodeSymbol], relationships: &[SymbolRelationship]) -> GraphData {
    GraphData {
        nodes: symbols
            .iter()
            .map(|s| GraphNode {
                id: s.id().to_string(),
                name: s.qualified_name().to_string(),
                kind: s.symbol_type(),
                file_path: s.file_path().to_string(),
            })
            .collect(),
        edges: relationships
            .iter()
            .map(|r| GraphEdge {
                source: r.source_id().to_string(),
                target: r.target_id().to_string(),
                kind: r.relationship_type(),
            })
            .collect(),
    }
}
