use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{DomainError, LanguageStats, Repository};

/// Persistence for repository metadata — the `repositories` table of spec §3,
/// plus the derived per-language rollups surfaced by `get_status`.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn save(&self, repository: &Repository) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError>;

    async fn find_by_path(&self, path: &str) -> Result<Option<Repository>, DomainError>;

    async fn list(&self) -> Result<Vec<Repository>, DomainError>;

    async fn delete(&self, id: &str) -> Result<(), DomainError>;

    async fn update_stats(
        &self,
        id: &str,
        chunk_count: u64,
        file_count: u64,
    ) -> Result<(), DomainError>;

    async fn update_languages(
        &self,
        id: &str,
        languages: HashMap<String, LanguageStats>,
    ) -> Result<(), DomainError>;

    /// Atomically increment `index_generation` and return the new value.
    /// Called inside the same per-file commit transaction as the symbol/reference
    /// row swap (spec §4.4 write protocol, §3 "Index generation").
    async fn bump_generation(&self, id: &str) -> Result<u64, DomainError>;
}
