use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::MetadataRepository;
use crate::domain::{
    DomainError, IngestionRun, IngestionStatus, RepoProvider, Repository, RunStage,
};

fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// DuckDB-backed repository pointers and ingestion run records.
///
/// Owns the database connection; other adapters share it via
/// `shared_connection()` because DuckDB allows one write connection per
/// file.
pub struct DuckdbMetadataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbMetadataRepository {
    pub fn new(path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Returns a clone of the shared connection Arc so other adapters can
    /// use the same DuckDB handle.
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                default_branch TEXT NOT NULL,
                is_private BOOLEAN NOT NULL DEFAULT false,
                latest_commit_sha TEXT,
                last_indexed_at BIGINT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                UNIQUE (provider, owner, name)
            );

            CREATE TABLE IF NOT EXISTS ingestion_runs (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                status TEXT NOT NULL,
                stage TEXT,
                degraded BOOLEAN NOT NULL DEFAULT false,
                started_at BIGINT NOT NULL,
                finished_at BIGINT,
                error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_runs_repo_commit
            ON ingestion_runs(repo_id, commit_sha, status);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize metadata schema: {}", e)))?;

        debug!("DuckDB metadata tables initialized");
        Ok(())
    }

    fn row_to_repository(row: &Row<'_>) -> duckdb::Result<Repository> {
        Ok(Repository::reconstitute(
            row.get::<_, String>(0)?,
            RepoProvider::parse(&row.get::<_, String>(1)?),
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, bool>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<i64>>(7)?,
            row.get::<_, i64>(8)?,
            row.get::<_, i64>(9)?,
        ))
    }

    fn row_to_run(row: &Row<'_>) -> duckdb::Result<IngestionRun> {
        Ok(IngestionRun::reconstitute(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            IngestionStatus::parse(&row.get::<_, String>(3)?),
            row.get::<_, Option<String>>(4)?.and_then(|s| RunStage::parse(&s)),
            row.get::<_, bool>(5)?,
            row.get::<_, i64>(6)?,
            row.get::<_, Option<i64>>(7)?,
            row.get::<_, Option<String>>(8)?,
        ))
    }

    const REPO_COLUMNS: &'static str = "id, provider, owner, name, default_branch, is_private, \
         latest_commit_sha, last_indexed_at, created_at, updated_at";

    const RUN_COLUMNS: &'static str =
        "id, repo_id, commit_sha, status, stage, degraded, started_at, finished_at, error";
}

#[async_trait]
impl MetadataRepository for DuckdbMetadataRepository {
    async fn save_repository(&self, repository: &Repository) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT OR REPLACE INTO repositories (
                id, provider, owner, name, default_branch, is_private,
                latest_commit_sha, last_indexed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                repository.id(),
                repository.provider().as_str(),
                repository.owner(),
                repository.name(),
                repository.default_branch(),
                repository.is_private(),
                repository.latest_commit_sha(),
                repository.last_indexed_at(),
                repository.created_at(),
                repository.updated_at(),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save repository: {}", e)))?;
        Ok(())
    }

    async fn find_repository(
        &self,
        provider: RepoProvider,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories WHERE provider = ? AND owner = ? AND name = ?",
            Self::REPO_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare query: {}", e)))?;
        let mut rows = stmt
            .query(params![provider.as_str(), owner, name])
            .map_err(|e| DomainError::storage(format!("Failed to run query: {}", e)))?;

        rows.next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
            .map(Self::row_to_repository)
            .transpose()
            .map_err(|e| DomainError::storage(format!("Failed to parse repository: {}", e)))
    }

    async fn find_repository_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {} FROM repositories WHERE id = ?", Self::REPO_COLUMNS);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare query: {}", e)))?;
        let mut rows = stmt
            .query(params![id])
            .map_err(|e| DomainError::storage(format!("Failed to run query: {}", e)))?;

        rows.next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
            .map(Self::row_to_repository)
            .transpose()
            .map_err(|e| DomainError::storage(format!("Failed to parse repository: {}", e)))
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories ORDER BY owner, name",
            Self::REPO_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare query: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DomainError::storage(format!("Failed to run query: {}", e)))?;

        let mut repositories = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        {
            repositories.push(
                Self::row_to_repository(row)
                    .map_err(|e| DomainError::storage(format!("Failed to parse row: {}", e)))?,
            );
        }
        Ok(repositories)
    }

    async fn mark_indexed(&self, repo_id: &str, commit_sha: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let now = current_timestamp();
        conn.execute(
            "UPDATE repositories SET latest_commit_sha = ?, last_indexed_at = ?, updated_at = ? \
             WHERE id = ?",
            params![commit_sha, now, now, repo_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to mark indexed: {}", e)))?;
        Ok(())
    }

    async fn delete_repository(&self, repo_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute("DELETE FROM ingestion_runs WHERE repo_id = ?", params![repo_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete runs: {}", e)))?;
        tx.execute("DELETE FROM repositories WHERE id = ?", params![repo_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete repository: {}", e)))?;

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    async fn create_run(&self, run: &IngestionRun) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO ingestion_runs (
                id, repo_id, commit_sha, status, stage, degraded,
                started_at, finished_at, error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                run.id(),
                run.repo_id(),
                run.commit_sha(),
                run.status().as_str(),
                run.stage().map(|s| s.as_str()),
                run.degraded(),
                run.started_at(),
                run.finished_at(),
                run.error(),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to create run: {}", e)))?;
        Ok(())
    }

    async fn claim_run(&self, run_id: &str) -> Result<bool, DomainError> {
        let conn = self.conn.lock().await;
        // PENDING → RUNNING succeeds only when no sibling run for the
        // same (repo, commit) is already RUNNING; losers see 0 rows.
        let updated = conn
            .execute(
                r#"UPDATE ingestion_runs SET status = 'running'
                   WHERE id = ? AND status = 'pending'
                     AND NOT EXISTS (
                        SELECT 1 FROM ingestion_runs sibling
                        WHERE sibling.repo_id = ingestion_runs.repo_id
                          AND sibling.commit_sha = ingestion_runs.commit_sha
                          AND sibling.status = 'running'
                     )"#,
                params![run_id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to claim run: {}", e)))?;
        Ok(updated == 1)
    }

    async fn advance_run(&self, run_id: &str, stage: RunStage) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE ingestion_runs SET stage = ? WHERE id = ? AND status = 'running'",
            params![stage.as_str(), run_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to advance run: {}", e)))?;
        Ok(())
    }

    async fn complete_run(&self, run_id: &str, degraded: bool) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE ingestion_runs SET status = 'completed', degraded = ?, finished_at = ? \
             WHERE id = ?",
            params![degraded, current_timestamp(), run_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to complete run: {}", e)))?;
        Ok(())
    }

    async fn fail_run(&self, run_id: &str, error: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE ingestion_runs SET status = 'failed', error = ?, finished_at = ? \
             WHERE id = ? AND status IN ('pending', 'running')",
            params![error, current_timestamp(), run_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to fail run: {}", e)))?;
        Ok(())
    }

    async fn find_run(&self, run_id: &str) -> Result<Option<IngestionRun>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {} FROM ingestion_runs WHERE id = ?", Self::RUN_COLUMNS);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare query: {}", e)))?;
        let mut rows = stmt
            .query(params![run_id])
            .map_err(|e| DomainError::storage(format!("Failed to run query: {}", e)))?;

        rows.next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
            .map(Self::row_to_run)
            .transpose()
            .map_err(|e| DomainError::storage(format!("Failed to parse run: {}", e)))
    }
}
