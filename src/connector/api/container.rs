use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::{
    CallGraphRepository, DeleteRepositoryUseCase, EmbeddingService, FileHashRepository,
    ImpactAnalysisUseCase, IndexRepositoryUseCase, ListRepositoriesUseCase, ParserBasedExtractor,
    ParserService, RerankingService, SearchCodeUseCase, SymbolContextUseCase, SymbolRepository,
    VectorRepository,
};
use crate::domain::VectorStore;
use crate::{
    CallGraphExtractor, CallGraphUseCase, DuckdbCallGraphRepository, DuckdbFileHashRepository,
    DuckdbMetadataRepository, DuckdbSymbolRepository, DuckdbVectorRepository,
    InMemoryVectorRepository, MockEmbedding, MockReranking, OrtEmbedding, OrtReranking,
    TreeSitterParser,
};

/// Process-wide construction knobs for [`Container`]. Mirrors the teacher's
/// `ContainerConfig`; `Coordinator` owns exactly one of these (the store
/// already multiplexes many registered repositories by `repository_id`,
/// the way `ListRepositoriesUseCase`/`IndexRepositoryUseCase` already treat
/// it) and layers the worker pool, watcher, and cache from
/// `CoordinatorConfig` on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ContainerConfig {
    pub data_dir: String,
    pub mock_embeddings: bool,
    pub namespace: String,
    pub memory_storage: bool,
    pub no_rerank: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            data_dir: ".codesearch".to_string(),
            mock_embeddings: false,
            namespace: "default".to_string(),
            memory_storage: false,
            no_rerank: false,
        }
    }
}

/// Owns every store handle, service, and use-case factory for the shared
/// store. `Coordinator` owns exactly one `Container`; every registered
/// repository is a row in that same store, distinguished by
/// `repository_id`.
pub struct Container {
    parser: Arc<TreeSitterParser>,
    embedding_service: Arc<dyn EmbeddingService>,
    reranking_service: Option<Arc<dyn RerankingService>>,
    vector_repo: Arc<dyn VectorRepository>,
    repo_adapter: Arc<DuckdbMetadataRepository>,
    file_hash_repo: Arc<dyn FileHashRepository>,
    symbol_repo: Arc<dyn SymbolRepository>,
    call_graph_use_case: Arc<CallGraphUseCase>,
    config: ContainerConfig,
}

/// Initialise the three DuckDB-backed metadata repositories that share a
/// connection with the vector store (or stand alone, when vectors live
/// in-memory).
async fn init_duckdb_metadata_repos(
    db_path: &std::path::Path,
    shared_conn: Option<Arc<tokio::sync::Mutex<duckdb::Connection>>>,
) -> Result<(
    Arc<DuckdbMetadataRepository>,
    Arc<dyn FileHashRepository>,
    Arc<dyn CallGraphRepository>,
    Arc<dyn SymbolRepository>,
)> {
    let repo_adapter = match shared_conn {
        Some(ref conn) => Arc::new(DuckdbMetadataRepository::with_connection(Arc::clone(conn))?),
        None => Arc::new(DuckdbMetadataRepository::new(db_path)?),
    };
    let conn = repo_adapter.shared_connection();
    let file_hash_repo: Arc<dyn FileHashRepository> =
        Arc::new(DuckdbFileHashRepository::with_connection(Arc::clone(&conn)).await?);
    let call_graph_repo: Arc<dyn CallGraphRepository> =
        Arc::new(DuckdbCallGraphRepository::with_connection(Arc::clone(&conn)).await?);
    let symbol_repo: Arc<dyn SymbolRepository> =
        Arc::new(DuckdbSymbolRepository::with_connection(conn).await?);
    Ok((repo_adapter, file_hash_repo, call_graph_repo, symbol_repo))
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self> {
        let db_path = PathBuf::from(&config.data_dir).join("codesearch.duckdb");

        let parser = Arc::new(TreeSitterParser::new());

        let embedding_service: Arc<dyn EmbeddingService> = if config.mock_embeddings {
            debug!("Using mock embedding service");
            Arc::new(MockEmbedding::new())
        } else {
            debug!("Initializing ONNX embedding service...");
            Arc::new(OrtEmbedding::new(None)?)
        };

        let reranking_service: Option<Arc<dyn RerankingService>> = if !config.no_rerank {
            if config.mock_embeddings {
                debug!("Using mock reranking service");
                Some(Arc::new(MockReranking::new()))
            } else {
                debug!("Initializing ONNX reranking service...");
                match OrtReranking::new(None) {
                    Ok(reranker) => Some(Arc::new(reranker)),
                    Err(e) => {
                        tracing::warn!(
                            "Failed to initialize reranking service: {}. Continuing without reranking.",
                            e
                        );
                        None
                    }
                }
            }
        } else {
            None
        };

        let (vector_repo, repo_adapter, file_hash_repo, call_graph_repo, symbol_repo): (
            Arc<dyn VectorRepository>,
            Arc<DuckdbMetadataRepository>,
            Arc<dyn FileHashRepository>,
            Arc<dyn CallGraphRepository>,
            Arc<dyn SymbolRepository>,
        ) = if config.memory_storage {
            debug!("Using in-memory vector storage");
            let vector = Arc::new(InMemoryVectorRepository::new());
            let (repo_adapter, file_hash_repo, call_graph_repo, symbol_repo) =
                init_duckdb_metadata_repos(&db_path, None).await?;
            (vector, repo_adapter, file_hash_repo, call_graph_repo, symbol_repo)
        } else {
            match DuckdbVectorRepository::new_with_namespace(&db_path, &config.namespace) {
                Ok(duckdb) => {
                    debug!(
                        "Using DuckDB vector storage at {:?} namespace {}",
                        db_path, config.namespace
                    );
                    let shared_conn = duckdb.shared_connection();
                    let (repo_adapter, file_hash_repo, call_graph_repo, symbol_repo) =
                        init_duckdb_metadata_repos(&db_path, Some(shared_conn)).await?;
                    (
                        Arc::new(duckdb),
                        repo_adapter,
                        file_hash_repo,
                        call_graph_repo,
                        symbol_repo,
                    )
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize DuckDB ({}): {}. Falling back to in-memory storage.",
                        db_path.display(),
                        e
                    );
                    let vector = Arc::new(InMemoryVectorRepository::new());
                    let (repo_adapter, file_hash_repo, call_graph_repo, symbol_repo) =
                        init_duckdb_metadata_repos(&db_path, None).await?;
                    (vector, repo_adapter, file_hash_repo, call_graph_repo, symbol_repo)
                }
            }
        };

        // ParserBasedExtractor lives in the connector layer (it does file I/O);
        // CallGraphUseCase only knows about the CallGraphExtractor trait.
        let extractor = Arc::new(ParserBasedExtractor::new(
            parser.clone() as Arc<dyn ParserService>
        )) as Arc<dyn CallGraphExtractor>;
        let call_graph_use_case = Arc::new(CallGraphUseCase::new(extractor, call_graph_repo));

        Ok(Self {
            parser,
            embedding_service,
            reranking_service,
            vector_repo,
            repo_adapter,
            file_hash_repo,
            symbol_repo,
            call_graph_use_case,
            config,
        })
    }

    pub fn index_use_case(&self) -> IndexRepositoryUseCase {
        IndexRepositoryUseCase::new(
            self.repo_adapter.clone(),
            self.vector_repo.clone(),
            self.file_hash_repo.clone(),
            self.symbol_repo.clone(),
            self.call_graph_use_case.clone(),
            self.parser.clone(),
            self.embedding_service.clone(),
        )
    }

    pub fn search_use_case(&self) -> SearchCodeUseCase {
        let mut use_case =
            SearchCodeUseCase::new(self.vector_repo.clone(), self.embedding_service.clone());

        if let Some(reranker) = self.reranking_service.clone() {
            use_case = use_case.with_reranking(reranker);
        }

        use_case
    }

    pub fn list_use_case(&self) -> ListRepositoriesUseCase {
        ListRepositoriesUseCase::new(self.repo_adapter.clone())
    }

    pub fn delete_use_case(&self) -> DeleteRepositoryUseCase {
        DeleteRepositoryUseCase::new(
            self.repo_adapter.clone(),
            self.vector_repo.clone(),
            self.file_hash_repo.clone(),
            self.symbol_repo.clone(),
            self.call_graph_use_case.clone(),
        )
    }

    pub fn call_graph_use_case(&self) -> Arc<CallGraphUseCase> {
        self.call_graph_use_case.clone()
    }

    pub fn impact_use_case(&self) -> ImpactAnalysisUseCase {
        ImpactAnalysisUseCase::new(self.call_graph_use_case.clone())
    }

    pub fn context_use_case(&self) -> SymbolContextUseCase {
        SymbolContextUseCase::new(self.call_graph_use_case.clone())
    }

    pub fn metadata_repo(&self) -> Arc<DuckdbMetadataRepository> {
        self.repo_adapter.clone()
    }

    pub fn vector_repo(&self) -> Arc<dyn VectorRepository> {
        self.vector_repo.clone()
    }

    pub fn file_hash_repo(&self) -> Arc<dyn FileHashRepository> {
        self.file_hash_repo.clone()
    }

    pub fn symbol_repo(&self) -> Arc<dyn SymbolRepository> {
        self.symbol_repo.clone()
    }

    pub fn data_dir(&self) -> &str {
        &self.config.data_dir
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn memory_storage(&self) -> bool {
        self.config.memory_storage
    }

    pub fn default_store(&self) -> VectorStore {
        if self.config.memory_storage {
            VectorStore::InMemory
        } else {
            VectorStore::DuckDb
        }
    }
}
