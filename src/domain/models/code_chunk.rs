use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::file_hash::compute_file_hash;
use super::Language;

/// Fixed namespace for deriving deterministic chunk ids. Generated once and
/// frozen here — changing it would silently reassign every chunk id on next
/// index run, defeating the point of determinism.
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3f, 0x1a, 0x8e, 0x02, 0x6c, 0x4d, 0x4b, 0x91, 0x9a, 0x77, 0x2d, 0x1c, 0x5e, 0x8b, 0x3a, 0x44,
]);

/// Derive a deterministic chunk id from its content address, not just its
/// position. Folding in a content hash means an edit to a function body
/// produces a new point id even when the body doesn't shift `start_line`,
/// so the old vector point is deleted rather than silently left behind
/// under a stale id while a new one is inserted alongside it.
fn deterministic_chunk_id(
    repository_id: &str,
    file_path: &str,
    start_line: u32,
    node_type: NodeType,
    content: &str,
) -> String {
    let content_hash = compute_file_hash(content);
    let key = format!(
        "{repository_id}\0{file_path}\0{start_line}\0{}\0{content_hash}",
        node_type.as_str()
    );
    Uuid::new_v5(&CHUNK_ID_NAMESPACE, key.as_bytes()).to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    id: String,
    file_path: String,
    content: String,
    start_line: u32,
    end_line: u32,
    language: Language,
    node_type: NodeType,
    symbol_name: Option<String>,
    parent_symbol: Option<String>,
    repository_id: String,
    doc: Option<String>,
    signature: Option<String>,
    visibility: Option<String>,
}

impl CodeChunk {
    pub fn new(
        file_path: String,
        content: String,
        start_line: u32,
        end_line: u32,
        language: Language,
        node_type: NodeType,
        repository_id: String,
    ) -> Self {
        let id = deterministic_chunk_id(&repository_id, &file_path, start_line, node_type, &content);
        Self {
            id,
            file_path,
            content,
            start_line,
            end_line,
            language,
            node_type,
            symbol_name: None,
            parent_symbol: None,
            repository_id,
            doc: None,
            signature: None,
            visibility: None,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        file_path: String,
        content: String,
        start_line: u32,
        end_line: u32,
        language: Language,
        node_type: NodeType,
        symbol_name: Option<String>,
        parent_symbol: Option<String>,
        repository_id: String,
    ) -> Self {
        Self {
            id,
            file_path,
            content,
            start_line,
            end_line,
            language,
            node_type,
            symbol_name,
            parent_symbol,
            repository_id,
            doc: None,
            signature: None,
            visibility: None,
        }
    }

    pub fn with_symbol_name(mut self, name: impl Into<String>) -> Self {
        self.symbol_name = Some(name.into());
        self
    }

    pub fn with_parent_symbol(mut self, parent: impl Into<String>) -> Self {
        self.parent_symbol = Some(parent.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = Some(visibility.into());
        self
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn visibility(&self) -> Option<&str> {
        self.visibility.as_deref()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.symbol_name.as_deref()
    }

    pub fn parent_symbol(&self) -> Option<&str> {
        self.parent_symbol.as_deref()
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    /// Returns the number of lines in this chunk.
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.node_type, NodeType::Function)
    }

    pub fn is_type_definition(&self) -> bool {
        matches!(
            self.node_type,
            NodeType::Class
                | NodeType::Struct
                | NodeType::Enum
                | NodeType::Interface
                | NodeType::TypeDef
        )
    }

    pub fn preview(&self, max_lines: usize) -> String {
        self.content
            .lines()
            .take(max_lines)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn belongs_to_repository(&self, repository_id: &str) -> bool {
        self.repository_id == repository_id
    }

    pub fn qualified_name(&self) -> Option<String> {
        match (&self.parent_symbol, &self.symbol_name) {
            (Some(parent), Some(name)) => Some(format!("{}::{}", parent, name)),
            (None, Some(name)) => Some(name.clone()),
            _ => None,
        }
    }
}

/// Represents the type of code construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Function,
    Class,
    Struct,
    Enum,
    Trait,
    Impl,
    Module,
    Constant,
    TypeDef,
    Interface,
    Block,
    /// A heading-delimited (Markdown) or paragraph-delimited (plain text)
    /// span produced by the documentation plugin rather than a parser grammar.
    Section,
    /// Emitted by the lexical-mode fallback scanner when no tree-sitter
    /// grammar is available; carries a best-effort symbol name with no
    /// guarantee about the enclosing construct's real kind.
    Other,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Function => "function",
            NodeType::Class => "class",
            NodeType::Struct => "struct",
            NodeType::Enum => "enum",
            NodeType::Trait => "trait",
            NodeType::Impl => "impl",
            NodeType::Module => "module",
            NodeType::Constant => "constant",
            NodeType::TypeDef => "typedef",
            NodeType::Interface => "interface",
            NodeType::Block => "block",
            NodeType::Section => "section",
            NodeType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => NodeType::Function,
            "class" => NodeType::Class,
            "struct" => NodeType::Struct,
            "enum" => NodeType::Enum,
            "trait" => NodeType::Trait,
            "impl" => NodeType::Impl,
            "module" => NodeType::Module,
            "constant" => NodeType::Constant,
            "typedef" => NodeType::TypeDef,
            "interface" => NodeType::Interface,
            "section" => NodeType::Section,
            "other" => NodeType::Other,
            _ => NodeType::Block,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_chunk_creation() {
        let chunk = CodeChunk::new(
            "src/lib.rs".to_string(),
            "fn add(a: i32, b: i32) -> i32 { a + b }".to_string(),
            10,
            12,
            Language::Rust,
            NodeType::Function,
            "repo-123".to_string(),
        )
        .with_symbol_name("add");

        assert_eq!(chunk.file_path(), "src/lib.rs");
        assert_eq!(chunk.symbol_name(), Some("add"));
        assert_eq!(chunk.line_count(), 3);
        assert!(chunk.is_callable());
        assert!(!chunk.is_type_definition());
    }

    #[test]
    fn test_qualified_name() {
        let chunk = CodeChunk::new(
            "src/lib.rs".to_string(),
            "fn method() {}".to_string(),
            1,
            1,
            Language::Rust,
            NodeType::Function,
            "repo".to_string(),
        )
        .with_symbol_name("method")
        .with_parent_symbol("MyStruct");

        assert_eq!(chunk.qualified_name(), Some("MyStruct::method".to_string()));
    }

    #[test]
    fn test_chunk_id_is_deterministic() {
        let a = CodeChunk::new(
            "src/lib.rs".to_string(),
            "fn add() {}".to_string(),
            10,
            12,
            Language::Rust,
            NodeType::Function,
            "repo-123".to_string(),
        );
        let a_again = CodeChunk::new(
            "src/lib.rs".to_string(),
            "fn add() {}".to_string(),
            10,
            12,
            Language::Rust,
            NodeType::Function,
            "repo-123".to_string(),
        );
        assert_eq!(a.id(), a_again.id());

        let different_repo = CodeChunk::new(
            "src/lib.rs".to_string(),
            "fn add() {}".to_string(),
            10,
            12,
            Language::Rust,
            NodeType::Function,
            "repo-456".to_string(),
        );
        assert_ne!(a.id(), different_repo.id());
    }

    #[test]
    fn test_chunk_id_changes_with_content_even_at_same_start_line() {
        let before = CodeChunk::new(
            "src/lib.rs".to_string(),
            "fn add() {}".to_string(),
            10,
            12,
            Language::Rust,
            NodeType::Function,
            "repo-123".to_string(),
        );
        let edited_in_place = CodeChunk::new(
            "src/lib.rs".to_string(),
            "fn add() { /* reformatted */ }".to_string(),
            10,
            12,
            Language::Rust,
            NodeType::Function,
            "repo-123".to_string(),
        );
        assert_ne!(
            before.id(),
            edited_in_place.id(),
            "editing a function body without shifting its start line must still change the id"
        );
    }

    #[test]
    fn test_location_format() {
        let chunk = CodeChunk::new(
            "test.rs".to_string(),
            "code".to_string(),
            5,
            10,
            Language::Rust,
            NodeType::Function,
            "repo".to_string(),
        );

        assert_eq!(chunk.location(), "test.rs:5-10");
    }
}
