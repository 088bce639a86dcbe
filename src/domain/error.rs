use thiserror::Error;

/// Error taxonomy for the indexing and retrieval core. Parse failures and
/// embedding/vector failures are caught at their respective boundaries
/// (`TreeSitterParser` degrading to the lexical scanner, `Coordinator::semantic_search`
/// setting `SemanticSearchResult::fallback_used`) rather than reaching a caller
/// as one of these variants.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Worker pool or work queue saturated; caller may retry with backoff.
    #[error("Busy: {0}")]
    Busy(String),

    /// Requested generation exceeds what the store currently holds.
    #[error("Stale: requested generation {requested}, have {current}")]
    Stale { requested: u64, current: u64 },

    /// Incremental parser failed to load its grammar; plugin degraded to lexical mode.
    #[error("Parser unavailable for {0}, degraded to lexical mode")]
    ParserUnavailable(String),

    /// Embedding or vector-store RPC failed; semantic path degraded, lexical path intact.
    #[error("Semantic provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Regex/FTS query syntax error, or an option value out of its documented range.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Request was cancelled before completion via a `CancellationToken`.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl DomainError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    pub fn stale(requested: u64, current: u64) -> Self {
        Self::Stale { requested, current }
    }

    pub fn parser_unavailable(msg: impl Into<String>) -> Self {
        Self::ParserUnavailable(msg.into())
    }

    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::ProviderUnavailable(msg.into())
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn is_provider_unavailable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}
