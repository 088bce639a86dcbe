mod call_graph_repository;
mod embedding_service;
mod file_hash_repository;
mod metadata_repository;
mod parser_service;
mod reranking_service;
mod symbol_repository;
mod vector_repository;

pub use call_graph_repository::*;
pub use embedding_service::*;
pub use file_hash_repository::*;
pub use metadata_repository::*;
pub use parser_service::*;
pub use reranking_service::*;
pub use symbol_repository::*;
pub use vector_repository::*;
