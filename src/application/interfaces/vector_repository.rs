use async_trait::async_trait;

use crate::domain::{CodeChunk, DomainError, Embedding, SearchQuery, SearchResult};

/// Vector storage and similarity search operations.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    async fn save_batch(
        &self,
        chunks: &[CodeChunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError>;

    async fn delete(&self, chunk_id: &str) -> Result<(), DomainError>;

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError>;

    /// Delete all chunks for a specific file path within a repository.
    /// Returns the number of chunks deleted.
    async fn delete_by_file_path(
        &self,
        repository_id: &str,
        file_path: &str,
    ) -> Result<u64, DomainError>;

    async fn search(
        &self,
        query_embedding: &[f32],
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError>;

    /// Keyword/full-text leg of hybrid search. Backends without native text
    /// search degrade to an empty result set so RRF fusion falls back to
    /// semantic-only ranking.
    async fn search_text(
        &self,
        _terms: &[&str],
        _query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError> {
        Ok(vec![])
    }

    async fn count(&self) -> Result<u64, DomainError>;

    /// Every chunk carrying a non-null `symbol_name`, optionally scoped to one
    /// repository. Backs `symbol_lookup` and `fuzzy_symbol` (spec §4.7, §6):
    /// those use cases rank and edit-distance-filter this candidate set in
    /// Rust rather than pushing ranking into the store.
    async fn list_symbols(
        &self,
        repository_id: Option<&str>,
    ) -> Result<Vec<CodeChunk>, DomainError>;

    /// Force any buffered writes to become visible to subsequent reads.
    /// Most backends commit per-batch already; this is a no-op for them.
    async fn flush(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
