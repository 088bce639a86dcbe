use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::SymbolRepository;
use crate::domain::{DomainError, Language, NodeType, Symbol};

pub struct DuckdbSymbolRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbSymbolRepository {
    /// Create a new adapter using an existing shared connection.
    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let conn_guard = conn.lock().await;
        Self::initialize_schema(&conn_guard)?;
        drop(conn_guard);

        Ok(Self { conn })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS symbols (
                id TEXT PRIMARY KEY,
                repository_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                name TEXT NOT NULL,
                qualified_name TEXT,
                kind TEXT NOT NULL,
                language TEXT NOT NULL,
                visibility TEXT,
                doc TEXT,
                signature TEXT,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                parent_symbol_id TEXT,
                parent_symbol_name TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_symbols_repo
            ON symbols(repository_id);

            CREATE INDEX IF NOT EXISTS idx_symbols_file
            ON symbols(repository_id, file_path);

            CREATE INDEX IF NOT EXISTS idx_symbols_name
            ON symbols(name);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize symbols schema: {}", e)))?;

        // FTS needs its own install; older DuckDB builds without network access
        // may already have it installed locally, so a failure here is non-fatal
        // to basic symbol storage but fuzzy_candidates will degrade without it.
        if let Err(e) = conn.execute_batch("INSTALL fts; LOAD fts;") {
            tracing::warn!("DuckDB fts extension unavailable, fuzzy symbol search degraded: {}", e);
            return Ok(());
        }

        Self::rebuild_fts_index(conn)?;

        debug!("DuckDB symbols table initialized");
        Ok(())
    }

    fn rebuild_fts_index(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            "PRAGMA create_fts_index('symbols', 'id', 'name', 'qualified_name', 'doc', overwrite=1);",
        )
        .map_err(|e| DomainError::storage(format!("Failed to build symbols FTS index: {}", e)))?;
        Ok(())
    }

    fn row_to_symbol(row: &duckdb::Row<'_>) -> duckdb::Result<Symbol> {
        let kind = NodeType::parse(&row.get::<_, String>(5)?);
        let language = Language::parse(&row.get::<_, String>(6)?);

        let mut symbol = Symbol::new(
            row.get::<_, String>(0)?,  // id
            row.get::<_, String>(1)?,  // repository_id
            row.get::<_, String>(2)?,  // file_path
            row.get::<_, String>(3)?,  // name
            kind,
            language,
            row.get::<_, i32>(10)? as u32, // start_line
            row.get::<_, i32>(11)? as u32, // end_line
        );

        if let Some(qualified_name) = row.get::<_, Option<String>>(4)? {
            symbol = symbol.with_qualified_name(qualified_name);
        }
        if let Some(visibility) = row.get::<_, Option<String>>(7)? {
            symbol = symbol.with_visibility(visibility);
        }
        if let Some(doc) = row.get::<_, Option<String>>(8)? {
            symbol = symbol.with_doc(doc);
        }
        if let Some(signature) = row.get::<_, Option<String>>(9)? {
            symbol = symbol.with_signature(signature);
        }
        if let (Some(parent_id), Some(parent_name)) = (
            row.get::<_, Option<String>>(12)?,
            row.get::<_, Option<String>>(13)?,
        ) {
            symbol = symbol.with_parent(parent_id, parent_name);
        }

        Ok(symbol)
    }

    const SELECT_COLUMNS: &'static str = "id, repository_id, file_path, name, qualified_name, \
        kind, language, visibility, doc, signature, start_line, end_line, \
        parent_symbol_id, parent_symbol_name";
}

#[async_trait]
impl SymbolRepository for DuckdbSymbolRepository {
    async fn save_batch(&self, symbols: &[Symbol]) -> Result<(), DomainError> {
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
                    r#"INSERT INTO symbols (
                        id, repository_id, file_path, name, qualified_name,
                        kind, language, visibility, doc, signature,
                        start_line, end_line, parent_symbol_id, parent_symbol_name
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT (id) DO UPDATE SET
                        repository_id = excluded.repository_id,
                        file_path = excluded.file_path,
                        name = excluded.name,
                        qualified_name = excluded.qualified_name,
                        kind = excluded.kind,
                        language = excluded.language,
                        visibility = excluded.visibility,
                        doc = excluded.doc,
                        signature = excluded.signature,
                        start_line = excluded.start_line,
                        end_line = excluded.end_line,
                        parent_symbol_id = excluded.parent_symbol_id,
                        parent_symbol_name = excluded.parent_symbol_name
                    "#,
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

            for symbol in symbols {
                stmt.execute(params![
                    symbol.id(),
                    symbol.repository_id(),
                    symbol.file_path(),
                    symbol.name(),
                    symbol.qualified_name(),
                    symbol.kind().as_str(),
                    symbol.language().as_str(),
                    symbol.visibility(),
                    symbol.doc(),
                    symbol.signature(),
                    symbol.start_line() as i32,
                    symbol.end_line() as i32,
                    symbol.parent_symbol_id(),
                    symbol.parent_symbol_name(),
                ])
                .map_err(|e| DomainError::storage(format!("Failed to save symbol: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        drop(conn);

        let conn = self.conn.lock().await;
        let _ = Self::rebuild_fts_index(&conn);

        debug!("Saved {} symbols to DuckDB", symbols.len());
        Ok(())
    }

    async fn delete_by_file_path(&self, repository_id: &str, file_path: &str) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute(
                "DELETE FROM symbols WHERE repository_id = ? AND file_path = ?",
                params![repository_id, file_path],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete symbols: {}", e)))?;

        drop(conn);
        let conn = self.conn.lock().await;
        let _ = Self::rebuild_fts_index(&conn);

        Ok(deleted as u64)
    }

    async fn delete_by_repository(&self, repository_id: &str) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute(
                "DELETE FROM symbols WHERE repository_id = ?",
                params![repository_id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete symbols: {}", e)))?;

        drop(conn);
        let conn = self.conn.lock().await;
        let _ = Self::rebuild_fts_index(&conn);

        Ok(deleted as u64)
    }

    async fn find_by_name(
        &self,
        name: &str,
        repository_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Symbol>, DomainError> {
        let conn = self.conn.lock().await;

        let repo_filter = if repository_id.is_some() {
            " AND repository_id = ?"
        } else {
            ""
        };

        // Tier 1: exact name match. Tier 2: qualified-name suffix match.
        // Tier 3: substring match. UNION preserves tier ordering via the
        // synthetic `tier` column so exact hits always outrank substrings.
        let sql = format!(
            r#"
            SELECT {cols}, 0 AS tier FROM symbols WHERE name = ?{repo_filter}
            UNION ALL
            SELECT {cols}, 1 AS tier FROM symbols WHERE name != ? AND qualified_name LIKE '%' || ? {repo_filter}
            UNION ALL
            SELECT {cols}, 2 AS tier FROM symbols WHERE name != ? AND (qualified_name IS NULL OR qualified_name NOT LIKE '%' || ?) AND name LIKE '%' || ? || '%'{repo_filter}
            ORDER BY tier
            LIMIT ?
            "#,
            cols = Self::SELECT_COLUMNS,
            repo_filter = repo_filter,
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let mut params_vec: Vec<Box<dyn duckdb::ToSql>> = Vec::new();
        params_vec.push(Box::new(name.to_string()));
        if let Some(repo_id) = repository_id {
            params_vec.push(Box::new(repo_id.to_string()));
        }
        params_vec.push(Box::new(name.to_string()));
        params_vec.push(Box::new(name.to_string()));
        if let Some(repo_id) = repository_id {
            params_vec.push(Box::new(repo_id.to_string()));
        }
        params_vec.push(Box::new(name.to_string()));
        params_vec.push(Box::new(name.to_string()));
        params_vec.push(Box::new(name.to_string()));
        if let Some(repo_id) = repository_id {
            params_vec.push(Box::new(repo_id.to_string()));
        }
        params_vec.push(Box::new(limit as i64));

        let param_refs: Vec<&dyn duckdb::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_symbol)
            .map_err(|e| DomainError::storage(format!("Failed to query symbols: {}", e)))?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }

        Ok(symbols)
    }

    async fn fuzzy_candidates(
        &self,
        name: &str,
        repository_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Symbol>, DomainError> {
        let conn = self.conn.lock().await;

        let repo_filter = if repository_id.is_some() {
            "AND sub.repository_id = ?"
        } else {
            ""
        };

        // bm25 scores and ranks first; the LIMIT caps the already-ranked
        // result, so the closest match can never be truncated away before
        // it gets scored.
        let sql = format!(
            r#"
            SELECT {cols} FROM (
                SELECT s.*, fts_main_symbols.match_bm25(s.id, ?) AS score
                FROM symbols s
            ) sub
            WHERE score IS NOT NULL {repo_filter}
            ORDER BY score DESC
            LIMIT ?
            "#,
            cols = Self::SELECT_COLUMNS,
            repo_filter = repo_filter,
        );

        let mut stmt = match conn.prepare(&sql) {
            Ok(stmt) => stmt,
            Err(e) => {
                tracing::warn!("fts query unavailable, returning no fuzzy candidates: {}", e);
                return Ok(Vec::new());
            }
        };

        let mut params_vec: Vec<Box<dyn duckdb::ToSql>> = Vec::new();
        params_vec.push(Box::new(name.to_string()));
        if let Some(repo_id) = repository_id {
            params_vec.push(Box::new(repo_id.to_string()));
        }
        params_vec.push(Box::new(limit as i64));

        let param_refs: Vec<&dyn duckdb::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_symbol)
            .map_err(|e| DomainError::storage(format!("Failed to query fuzzy symbols: {}", e)))?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }

        Ok(symbols)
    }
}
