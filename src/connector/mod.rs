//! # Connector Layer
//!
//! External integrations implementing domain/application ports:
//! - Parsing (tree-sitter, per-language rule tables, lexical-mode fallback)
//! - Storage (DuckDB symbol/FTS + vector store, in-memory fallback)
//! - Embeddings and reranking (ONNX Runtime, mock doubles for tests)
//! - The change pipeline (watcher, debouncer, work queue) and query cache
//! - The process-wide `Coordinator` (C8) and the shared `Container` it owns

pub mod adapter;
pub mod api;

pub use adapter::*;
pub use api::*;
