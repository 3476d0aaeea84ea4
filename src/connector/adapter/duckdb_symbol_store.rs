use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::SymbolStore;
use crate::domain::{
    CallChainNode, CodeSymbol, DomainError, Language, SymbolDetail, SymbolRelationship,
    SymbolScope, SymbolType,
};

/// DuckDB-backed symbol graph.
///
/// Transitive queries run as recursive CTEs inside the database. Each
/// recursion carries a delimiter-wrapped path string of visited symbol
/// ids, so traversals terminate on cyclic graphs; depth is a hard stop on
/// top of that.
pub struct DuckdbSymbolStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbSymbolStore {
    /// Create a new adapter using an existing shared connection.
    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        {
            let guard = conn.lock().await;
            Self::initialize_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS code_symbols (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                symbol_type TEXT NOT NULL,
                name TEXT NOT NULL,
                qualified_name TEXT NOT NULL,
                signature TEXT,
                file_path TEXT NOT NULL,
                line_start INTEGER NOT NULL,
                line_end INTEGER NOT NULL,
                scope TEXT NOT NULL,
                parent_symbol_id TEXT,
                detail TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS symbol_relationships (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                metadata TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_symbols_repo_commit
            ON code_symbols(repo_id, commit_sha);

            CREATE INDEX IF NOT EXISTS idx_symbols_name
            ON code_symbols(repo_id, name);

            CREATE INDEX IF NOT EXISTS idx_symbols_file
            ON code_symbols(repo_id, commit_sha, file_path);

            CREATE INDEX IF NOT EXISTS idx_relationships_source
            ON symbol_relationships(source_id, relationship_type);

            CREATE INDEX IF NOT EXISTS idx_relationships_target
            ON symbol_relationships(target_id, relationship_type);

            CREATE INDEX IF NOT EXISTS idx_relationships_repo
            ON symbol_relationships(repo_id);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize symbol schema: {}", e)))?;

        debug!("DuckDB symbol tables initialized");
        Ok(())
    }

    fn row_to_symbol(row: &Row<'_>) -> duckdb::Result<CodeSymbol> {
        let symbol_type = SymbolType::parse(&row.get::<_, String>(3)?)
            .unwrap_or(SymbolType::Variable);
        let detail_json: String = row.get(12)?;
        let detail = serde_json::from_str::<SymbolDetail>(&detail_json).unwrap_or(
            SymbolDetail::Variable {
                language: Language::Unknown,
                is_constant: false,
                type_annotation: None,
            },
        );

        Ok(CodeSymbol::reconstitute(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            symbol_type,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, i64>(8)? as u32,
            row.get::<_, i64>(9)? as u32,
            SymbolScope::parse(&row.get::<_, String>(10)?),
            row.get::<_, Option<String>>(11)?,
            detail,
        ))
    }

    const SYMBOL_COLUMNS: &'static str = "id, repo_id, commit_sha, symbol_type, name, \
         qualified_name, signature, file_path, line_start, line_end, scope, parent_symbol_id, \
         detail";

    fn query_symbols(
        conn: &Connection,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare query: {}", e)))?;
        let mut rows = stmt
            .query(params)
            .map_err(|e| DomainError::storage(format!("Failed to run query: {}", e)))?;

        let mut symbols = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        {
            let symbol = Self::row_to_symbol(row)
                .map_err(|e| DomainError::storage(format!("Failed to parse symbol row: {}", e)))?;
            symbols.push(symbol);
        }
        Ok(symbols)
    }

    /// Depth-limited traversal over `calls` edges. `forward` walks
    /// source → target (callees); reverse walks target → source (callers).
    async fn traverse_calls(
        &self,
        symbol_id: &str,
        max_depth: u32,
        forward: bool,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let (join_on, walk_from) = if forward {
            ("sr.target_id", "sr.source_id")
        } else {
            ("sr.source_id", "sr.target_id")
        };

        // The origin is deliberately absent from the visited path, so a
        // cycle that loops back to it still reports it as reachable; the
        // per-branch visited set is what stops the recursion.
        let sql = format!(
            r#"
            WITH RECURSIVE walk AS (
                SELECT cs.*, 1 AS depth, '/' || cs.id || '/' AS path
                FROM code_symbols cs
                JOIN symbol_relationships sr ON cs.id = {join_on}
                WHERE {walk_from} = ?
                  AND sr.relationship_type = 'calls'

                UNION ALL

                SELECT cs.*, w.depth + 1, w.path || cs.id || '/'
                FROM code_symbols cs
                JOIN symbol_relationships sr ON cs.id = {join_on}
                JOIN walk w ON {walk_from} = w.id
                WHERE sr.relationship_type = 'calls'
                  AND w.depth < ?
                  AND strpos(w.path, '/' || cs.id || '/') = 0
            )
            SELECT {columns}, MIN(depth) AS depth
            FROM walk
            GROUP BY {columns}
            ORDER BY depth, qualified_name
            "#,
            join_on = join_on,
            walk_from = walk_from,
            columns = Self::SYMBOL_COLUMNS,
        );

        let conn = self.conn.lock().await;
        Self::query_symbols(&conn, &sql, &[&symbol_id, &(max_depth as i64)])
    }
}

#[async_trait]
impl SymbolStore for DuckdbSymbolStore {
    async fn save_symbols(&self, symbols: &[CodeSymbol]) -> Result<(), DomainError> {
        if symbols.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    r#"INSERT OR REPLACE INTO code_symbols (
                        id, repo_id, commit_sha, symbol_type, name, qualified_name,
                        signature, file_path, line_start, line_end, scope,
                        parent_symbol_id, detail
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;

            for symbol in symbols {
                let detail = serde_json::to_string(symbol.detail())
                    .map_err(|e| DomainError::internal(format!("detail serialization: {}", e)))?;
                stmt.execute(params![
                    symbol.id(),
                    symbol.repo_id(),
                    symbol.commit_sha(),
                    symbol.symbol_type().as_str(),
                    symbol.name(),
                    symbol.qualified_name(),
                    symbol.signature(),
                    symbol.file_path(),
                    symbol.line_start() as i64,
                    symbol.line_end() as i64,
                    symbol.scope().as_str(),
                    symbol.parent_symbol_id(),
                    detail,
                ])
                .map_err(|e| DomainError::storage(format!("Failed to save symbol: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!("Saved {} symbols", symbols.len());
        Ok(())
    }

    async fn save_relationships(
        &self,
        relationships: &[SymbolRelationship],
    ) -> Result<(), DomainError> {
        if relationships.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    r#"INSERT OR REPLACE INTO symbol_relationships (
                        id, repo_id, commit_sha, source_id, target_id,
                        relationship_type, metadata
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;

            for relationship in relationships {
                stmt.execute(params![
                    relationship.id(),
                    relationship.repo_id(),
                    relationship.commit_sha(),
                    relationship.source_id(),
                    relationship.target_id(),
                    relationship.relationship_type().as_str(),
                    relationship.metadata().to_string(),
                ])
                .map_err(|e| {
                    DomainError::storage(format!("Failed to save relationship: {}", e))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!("Saved {} relationships", relationships.len());
        Ok(())
    }

    async fn load_symbols(
        &self,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM code_symbols WHERE repo_id = ? AND commit_sha = ? ORDER BY file_path, line_start",
            Self::SYMBOL_COLUMNS
        );
        Self::query_symbols(&conn, &sql, &[&repo_id, &commit_sha])
    }

    async fn find_by_id(&self, symbol_id: &str) -> Result<Option<CodeSymbol>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM code_symbols WHERE id = ?",
            Self::SYMBOL_COLUMNS
        );
        Ok(Self::query_symbols(&conn, &sql, &[&symbol_id])?.into_iter().next())
    }

    async fn find_by_name(
        &self,
        repo_id: &str,
        commit_sha: &str,
        name: &str,
        fuzzy: bool,
        limit: usize,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let conn = self.conn.lock().await;

        if fuzzy {
            // jaccard() plays the role pg_trgm similarity() does on
            // Postgres: character-set similarity with a 0.3 floor.
            let sql = format!(
                "SELECT {} FROM code_symbols \
                 WHERE repo_id = ? AND commit_sha = ? AND jaccard(name, ?) > 0.3 \
                 ORDER BY jaccard(name, ?) DESC LIMIT {}",
                Self::SYMBOL_COLUMNS,
                limit as i64
            );
            Self::query_symbols(&conn, &sql, &[&repo_id, &commit_sha, &name, &name])
        } else {
            let sql = format!(
                "SELECT {} FROM code_symbols \
                 WHERE repo_id = ? AND commit_sha = ? AND name = ? LIMIT {}",
                Self::SYMBOL_COLUMNS,
                limit as i64
            );
            Self::query_symbols(&conn, &sql, &[&repo_id, &commit_sha, &name])
        }
    }

    async fn find_by_type(
        &self,
        repo_id: &str,
        commit_sha: &str,
        symbol_type: SymbolType,
        limit: usize,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM code_symbols \
             WHERE repo_id = ? AND commit_sha = ? AND symbol_type = ? \
             ORDER BY file_path, line_start LIMIT {}",
            Self::SYMBOL_COLUMNS,
            limit as i64
        );
        Self::query_symbols(&conn, &sql, &[&repo_id, &commit_sha, &symbol_type.as_str()])
    }

    async fn find_in_file(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM code_symbols \
             WHERE repo_id = ? AND commit_sha = ? AND file_path = ? ORDER BY line_start",
            Self::SYMBOL_COLUMNS
        );
        Self::query_symbols(&conn, &sql, &[&repo_id, &commit_sha, &file_path])
    }

    async fn find_callers(
        &self,
        symbol_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        self.traverse_calls(symbol_id, max_depth, false).await
    }

    async fn find_callees(
        &self,
        symbol_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CodeSymbol>, DomainError> {
        self.traverse_calls(symbol_id, max_depth, true).await
    }

    async fn find_call_path(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: u32,
    ) -> Result<Vec<CallChainNode>, DomainError> {
        let conn = self.conn.lock().await;

        // The base case is the start symbol itself, so a path from a
        // symbol to itself is the single-node path.
        let sql = r#"
            WITH RECURSIVE call_path AS (
                SELECT cs.id, 0 AS depth, '/' || cs.id || '/' AS path
                FROM code_symbols cs
                WHERE cs.id = ?

                UNION ALL

                SELECT cs.id, cp.depth + 1, cp.path || cs.id || '/'
                FROM code_symbols cs
                JOIN symbol_relationships sr ON cs.id = sr.target_id
                JOIN call_path cp ON sr.source_id = cp.id
                WHERE sr.relationship_type = 'calls'
                  AND cp.depth < ?
                  AND strpos(cp.path, '/' || cs.id || '/') = 0
            )
            SELECT path FROM call_path WHERE id = ? ORDER BY depth LIMIT 1
        "#;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare path query: {}", e)))?;
        let mut rows = stmt
            .query(params![from_id, max_depth as i64, to_id])
            .map_err(|e| DomainError::storage(format!("Failed to run path query: {}", e)))?;

        let path: Option<String> = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read path row: {}", e)))?
            .map(|row| row.get(0))
            .transpose()
            .map_err(|e| DomainError::storage(format!("Failed to parse path: {}", e)))?;

        let Some(path) = path else {
            return Ok(vec![]);
        };
        drop(rows);
        drop(stmt);

        let ids: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut chain = Vec::with_capacity(ids.len());
        for (depth, id) in ids.iter().enumerate() {
            let sql = format!(
                "SELECT {} FROM code_symbols WHERE id = ?",
                Self::SYMBOL_COLUMNS
            );
            if let Some(symbol) = Self::query_symbols(&conn, &sql, &[id])?.into_iter().next() {
                chain.push(CallChainNode {
                    symbol_id: symbol.id().to_string(),
                    name: symbol.name().to_string(),
                    qualified_name: symbol.qualified_name().to_string(),
                    file_path: symbol.file_path().to_string(),
                    depth: depth as u32,
                });
            }
        }

        Ok(chain)
    }

    async fn file_dependencies(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<String>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = r#"
            SELECT DISTINCT target.file_path
            FROM code_symbols source
            JOIN symbol_relationships sr ON source.id = sr.source_id
            JOIN code_symbols target ON sr.target_id = target.id
            WHERE source.file_path = ?
              AND source.repo_id = ? AND source.commit_sha = ?
              AND sr.relationship_type = 'imports'
            ORDER BY target.file_path
        "#;
        query_strings(&conn, sql, &[&file_path, &repo_id, &commit_sha])
    }

    async fn file_dependents(
        &self,
        repo_id: &str,
        commit_sha: &str,
        file_path: &str,
    ) -> Result<Vec<String>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = r#"
            SELECT DISTINCT source.file_path
            FROM code_symbols target
            JOIN symbol_relationships sr ON target.id = sr.target_id
            JOIN code_symbols source ON sr.source_id = source.id
            WHERE target.file_path = ?
              AND target.repo_id = ? AND target.commit_sha = ?
              AND sr.relationship_type = 'imports'
            ORDER BY source.file_path
        "#;
        query_strings(&conn, sql, &[&file_path, &repo_id, &commit_sha])
    }

    async fn stats(
        &self,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Vec<(String, u64)>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT symbol_type, COUNT(*) FROM code_symbols \
                 WHERE repo_id = ? AND commit_sha = ? GROUP BY symbol_type ORDER BY symbol_type",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare stats: {}", e)))?;
        let mut rows = stmt
            .query(params![repo_id, commit_sha])
            .map_err(|e| DomainError::storage(format!("Failed to run stats: {}", e)))?;

        let mut stats = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read stats row: {}", e)))?
        {
            let symbol_type: String = row
                .get(0)
                .map_err(|e| DomainError::storage(format!("Failed to read type: {}", e)))?;
            let count: i64 = row
                .get(1)
                .map_err(|e| DomainError::storage(format!("Failed to read count: {}", e)))?;
            stats.push((symbol_type, count as u64));
        }
        Ok(stats)
    }

    async fn delete_by_repository(&self, repo_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM symbol_relationships WHERE repo_id = ?",
            params![repo_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete relationships: {}", e)))?;
        tx.execute("DELETE FROM code_symbols WHERE repo_id = ?", params![repo_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete symbols: {}", e)))?;

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }
}

fn query_strings(
    conn: &Connection,
    sql: &str,
    params: &[&dyn duckdb::ToSql],
) -> Result<Vec<String>, DomainError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| DomainError::storage(format!("Failed to prepare query: {}", e)))?;
    let mut rows = stmt
        .query(params)
        .map_err(|e| DomainError::storage(format!("Failed to run query: {}", e)))?;

    let mut values = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
    {
        values.push(
            row.get::<_, String>(0)
                .map_err(|e| DomainError::storage(format!("Failed to parse value: {}", e)))?,
        );
    }
    Ok(values)
}
