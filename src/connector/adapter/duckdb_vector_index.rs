use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::VectorIndex;
use crate::domain::{Chunk, DomainError, RetrievedChunk};

/// DuckDB-backed vector index over embedded chunks.
///
/// Vectors are stored as fixed-size FLOAT arrays and scored with
/// `array_cosine_distance`; the dimension is fixed at construction to
/// match the embedding model. Upserts key on the chunks' deterministic
/// ids.
pub struct DuckdbVectorIndex {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
}

impl DuckdbVectorIndex {
    pub async fn with_connection(
        conn: Arc<Mutex<Connection>>,
        dimensions: usize,
    ) -> Result<Self, DomainError> {
        {
            let guard = conn.lock().await;
            Self::initialize_schema(&guard, dimensions)?;
        }
        Ok(Self { conn, dimensions })
    }

    fn initialize_schema(conn: &Connection, dimensions: usize) -> Result<(), DomainError> {
        let schema_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                content TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunk_embeddings (
                chunk_id TEXT PRIMARY KEY,
                vector FLOAT[{dims}] NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_repo_commit
            ON chunks(repo_id, commit_sha);
            "#,
            dims = dimensions
        );

        conn.execute_batch(&schema_sql)
            .map_err(|e| DomainError::storage(format!("Failed to initialize vector schema: {}", e)))?;

        debug!("DuckDB vector tables initialized ({} dims)", dimensions);
        Ok(())
    }

    fn vector_to_array_literal(&self, vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::invalid_input(format!(
                "Expected embedding dimension {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(DomainError::invalid_input(
                "Embedding contains non-finite values".to_string(),
            ));
        }

        let mut literal = String::with_capacity(vector.len() * 8);
        literal.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                literal.push_str(", ");
            }
            literal.push_str(&format!("{}", v));
        }
        literal.push(']');
        literal.push_str(&format!("::FLOAT[{}]", self.dimensions));
        Ok(literal)
    }

    fn row_to_retrieved(row: &Row<'_>) -> duckdb::Result<RetrievedChunk> {
        Ok(RetrievedChunk {
            chunk_id: row.get::<_, String>(0)?,
            file_path: row.get::<_, String>(1)?,
            start_line: row.get::<_, i64>(2)? as u32,
            end_line: row.get::<_, i64>(3)? as u32,
            content: row.get::<_, String>(4)?,
            score: row.get::<_, f32>(5)?,
        })
    }
}

#[async_trait]
impl VectorIndex for DuckdbVectorIndex {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), DomainError> {
        if chunks.is_empty() {
            return Ok(());
        }
        if chunks.len() != vectors.len() {
            return Err(DomainError::invalid_input(
                "Chunk and vector count mismatch".to_string(),
            ));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO chunks \
                     (id, repo_id, commit_sha, file_path, start_line, end_line, content) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;

            for chunk in chunks {
                stmt.execute(params![
                    chunk.id(),
                    chunk.repo_id(),
                    chunk.commit_sha(),
                    chunk.file_path(),
                    chunk.start_line() as i64,
                    chunk.end_line() as i64,
                    chunk.content(),
                ])
                .map_err(|e| {
                    DomainError::storage(format!("Failed to insert chunk {}: {}", chunk.id(), e))
                })?;
            }
        }

        for (chunk, vector) in chunks.iter().zip(vectors) {
            let array_literal = self.vector_to_array_literal(vector)?;
            // The array literal is inlined because DuckDB's fixed-size
            // FLOAT[N] type does not accept parameter binding.
            let sql = format!(
                "INSERT OR REPLACE INTO chunk_embeddings (chunk_id, vector) VALUES (?, {})",
                array_literal
            );
            tx.execute(&sql, params![chunk.id()]).map_err(|e| {
                DomainError::storage(format!(
                    "Failed to insert embedding for chunk {}: {}",
                    chunk.id(),
                    e
                ))
            })?;
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!("Upserted {} chunks with embeddings", chunks.len());
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        repo_id: &str,
        commit_sha: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedChunk>, DomainError> {
        let array_literal = self.vector_to_array_literal(vector)?;

        let sql = format!(
            "SELECT c.id, c.file_path, c.start_line, c.end_line, c.content, \
                    CAST(1.0 - array_cosine_distance(e.vector, {lit}) AS FLOAT) AS score \
             FROM chunk_embeddings e \
             JOIN chunks c ON c.id = e.chunk_id \
             WHERE c.repo_id = ? AND c.commit_sha = ? \
             ORDER BY array_cosine_distance(e.vector, {lit}) \
             LIMIT ?",
            lit = array_literal
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare search: {}", e)))?;
        let mut rows = stmt
            .query(params![repo_id, commit_sha, limit as i64])
            .map_err(|e| DomainError::storage(format!("Failed to run search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        {
            let retrieved = Self::row_to_retrieved(row)
                .map_err(|e| DomainError::storage(format!("Failed to parse result: {}", e)))?;
            if retrieved.score >= score_threshold {
                results.push(retrieved);
            }
        }
        Ok(results)
    }

    async fn delete_by_repository(&self, repo_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM chunk_embeddings WHERE chunk_id IN \
             (SELECT id FROM chunks WHERE repo_id = ?)",
            params![repo_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete embeddings: {}", e)))?;
        tx.execute("DELETE FROM chunks WHERE repo_id = ?", params![repo_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete chunks: {}", e)))?;

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to count chunks: {}", e)))?;
        Ok(count as u64)
    }
}
