use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::application::{
    CallGraphUseCase, FileHashRepository, MetadataRepository, SymbolRepository, VectorRepository,
};
use crate::domain::DomainError;

/// Deregisters a repository and purges every row it owns across both stores.
///
/// Implements the spec's delete-purge law: after this completes, `symbol_lookup`
/// against the repository returns empty and the vector store holds no points
/// under its namespace — every delete below runs synchronously as part of
/// `execute`, not on a later sweep.
pub struct DeleteRepositoryUseCase {
    repository_repo: Arc<dyn MetadataRepository>,
    vector_repo: Arc<dyn VectorRepository>,
    file_hash_repo: Arc<dyn FileHashRepository>,
    symbol_repo: Arc<dyn SymbolRepository>,
    call_graph_use_case: Arc<CallGraphUseCase>,
}

impl DeleteRepositoryUseCase {
    pub fn new(
        repository_repo: Arc<dyn MetadataRepository>,
        vector_repo: Arc<dyn VectorRepository>,
        file_hash_repo: Arc<dyn FileHashRepository>,
        symbol_repo: Arc<dyn SymbolRepository>,
        call_graph_use_case: Arc<CallGraphUseCase>,
    ) -> Self {
        Self {
            repository_repo,
            vector_repo,
            file_hash_repo,
            symbol_repo,
            call_graph_use_case,
        }
    }

    pub async fn execute(&self, id: &str) -> Result<(), DomainError> {
        let repo = self
            .repository_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Repository not found: {}", id)))?;

        info!("Deregistering repository: {} ({})", repo.name(), repo.path());

        // Order doesn't matter for correctness here (all three stores are scoped to
        // `id` and the repository row itself is deleted last), but symbol/reference
        // rows are dropped before the repository row so a concurrent reader never
        // observes a repository with dangling children.
        self.call_graph_use_case.delete_by_repository(id).await?;
        self.file_hash_repo.delete_by_repository(id).await?;
        self.symbol_repo.delete_by_repository(id).await?;
        self.vector_repo.delete_by_repository(id).await?;
        self.repository_repo.delete(id).await?;

        info!("Repository deregistered");

        Ok(())
    }

    pub async fn delete_by_path(&self, path: &str) -> Result<(), DomainError> {
        let canonical_path = Path::new(path)
            .canonicalize()
            .map_err(|e| DomainError::InvalidInput(format!("Invalid path '{}': {}", path, e)))?
            .to_string_lossy()
            .to_string();

        let repo = self
            .repository_repo
            .find_by_path(&canonical_path)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Repository not found at path: {}", path))
            })?;

        self.execute(repo.id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{
        DuckdbCallGraphRepository, DuckdbFileHashRepository, DuckdbMetadataRepository,
        DuckdbSymbolRepository, InMemoryVectorRepository, ParserBasedExtractor,
    };
    use crate::domain::Repository;

    #[tokio::test]
    async fn delete_purges_all_stores() {
        let metadata = Arc::new(DuckdbMetadataRepository::in_memory().unwrap());
        let conn = metadata.shared_connection();
        let file_hash_repo: Arc<dyn FileHashRepository> = Arc::new(
            DuckdbFileHashRepository::with_connection(conn.clone())
                .await
                .unwrap(),
        );
        let call_graph_repo = Arc::new(
            DuckdbCallGraphRepository::with_connection(conn.clone())
                .await
                .unwrap(),
        );
        let symbol_repo: Arc<dyn SymbolRepository> = Arc::new(
            DuckdbSymbolRepository::with_connection(conn)
                .await
                .unwrap(),
        );
        let parser = Arc::new(crate::connector::TreeSitterParser::new());
        let extractor = Arc::new(ParserBasedExtractor::new(parser));
        let call_graph_use_case = Arc::new(CallGraphUseCase::new(extractor, call_graph_repo));
        let vector_repo: Arc<dyn VectorRepository> = Arc::new(InMemoryVectorRepository::new());

        let repo = Repository::new("demo".into(), "/tmp/demo".into());
        metadata.save(&repo).await.unwrap();

        let use_case = DeleteRepositoryUseCase::new(
            metadata.clone(),
            vector_repo,
            file_hash_repo,
            symbol_repo,
            call_graph_use_case.clone(),
        );

        use_case.execute(repo.id()).await.unwrap();

        assert!(metadata.find_by_id(repo.id()).await.unwrap().is_none());
        let refs = call_graph_use_case
            .find_by_repository(repo.id())
            .await
            .unwrap();
        assert!(refs.is_empty());
    }
}
