mod call_graph;
mod delete_repository;
mod impact_analysis;
mod index_repository;
mod list_repositories;
mod rrf_fuse;
mod search_code;
mod symbol_context;

pub use call_graph::*;
pub use delete_repository::*;
pub use impact_analysis::*;
pub use index_repository::*;
pub use list_repositories::*;
pub use rrf_fuse::*;
pub use search_code::*;
pub use symbol_context::*;
