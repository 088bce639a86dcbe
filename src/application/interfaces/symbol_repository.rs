use async_trait::async_trait;

use crate::domain::{DomainError, Symbol};

/// Persists and looks up [`Symbol`] rows independently of the `chunks`
/// table, so lookups carry `kind`/`visibility`/`doc`/`signature` and the
/// parent-symbol forest without scanning chunk content for a symbol name.
#[async_trait]
pub trait SymbolRepository: Send + Sync {
    async fn save_batch(&self, symbols: &[Symbol]) -> Result<(), DomainError>;

    async fn delete_by_file_path(&self, repository_id: &str, file_path: &str) -> Result<u64, DomainError>;

    async fn delete_by_repository(&self, repository_id: &str) -> Result<u64, DomainError>;

    /// Tiered exact/qualified-suffix/substring lookup by name, scoped to one
    /// repository when given.
    async fn find_by_name(
        &self,
        name: &str,
        repository_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Symbol>, DomainError>;

    /// FTS-bm25-ranked fuzzy candidates for `name`, already ordered by
    /// relevance and capped to `limit` — the cap is applied AFTER ranking,
    /// not before, so the true closest match in a large repository is never
    /// dropped before it gets a chance to score.
    async fn fuzzy_candidates(
        &self,
        name: &str,
        repository_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Symbol>, DomainError>;
}
