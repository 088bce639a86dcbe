mod debouncer;
mod duckdb_call_graph_repository;
mod duckdb_file_hash_repository;
mod duckdb_metadata_repository;
mod duckdb_symbol_repository;
mod duckdb_vector_repository;
mod in_memory_vector_repository;
mod lexical_scanner;
mod mock_embedding;
mod mock_reranking;
mod ort_embedding;
mod ort_reranking;
mod query_cache;
mod treesitter_parser;
mod watcher;
mod work_queue;

pub use debouncer::*;
pub use duckdb_call_graph_repository::*;
pub use duckdb_file_hash_repository::*;
pub use duckdb_metadata_repository::*;
pub use duckdb_symbol_repository::*;
pub use duckdb_vector_repository::*;
pub use in_memory_vector_repository::*;
pub use lexical_scanner::*;
pub use mock_embedding::*;
pub use mock_reranking::*;
pub use ort_embedding::*;
pub use ort_reranking::*;
pub use query_cache::*;
pub use treesitter_parser::*;
pub use watcher::*;
pub use work_queue::*;
