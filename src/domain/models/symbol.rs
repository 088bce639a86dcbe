use serde::{Deserialize, Serialize};

use super::{CodeChunk, Language, NodeType};

/// A named symbol extracted from a parsed file, persisted independently of
/// the chunk it was parsed from so lookups can rank on `kind`/`visibility`/
/// `doc`/`signature` without scanning chunk content, and so symbols can form
/// a parent/child forest (`parent_symbol_id`) instead of a flat list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    id: String,
    repository_id: String,
    file_path: String,
    name: String,
    qualified_name: Option<String>,
    kind: NodeType,
    language: Language,
    visibility: Option<String>,
    doc: Option<String>,
    signature: Option<String>,
    start_line: u32,
    end_line: u32,
    parent_symbol_id: Option<String>,
    parent_symbol_name: Option<String>,
}

impl Symbol {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        repository_id: String,
        file_path: String,
        name: String,
        kind: NodeType,
        language: Language,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            id,
            repository_id,
            file_path,
            name,
            qualified_name: None,
            kind,
            language,
            visibility: None,
            doc: None,
            signature: None,
            start_line,
            end_line,
            parent_symbol_id: None,
            parent_symbol_name: None,
        }
    }

    pub fn with_qualified_name(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = Some(qualified_name.into());
        self
    }

    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = Some(visibility.into());
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

    pub fn with_parent(mut self, parent_id: impl Into<String>, parent_name: impl Into<String>) -> Self {
        self.parent_symbol_id = Some(parent_id.into());
        self.parent_symbol_name = Some(parent_name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.qualified_name.as_deref()
    }

    pub fn kind(&self) -> NodeType {
        self.kind
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn visibility(&self) -> Option<&str> {
        self.visibility.as_deref()
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn parent_symbol_id(&self) -> Option<&str> {
        self.parent_symbol_id.as_deref()
    }

    pub fn parent_symbol_name(&self) -> Option<&str> {
        self.parent_symbol_name.as_deref()
    }

    /// Hydrate a displayable [`CodeChunk`] from this row, carrying `doc`,
    /// `signature`, and `visibility` along so callers reading symbol search
    /// results don't lose them the way a `chunks`-table scan would.
    pub fn into_chunk(self) -> CodeChunk {
        let content = self
            .signature
            .clone()
            .unwrap_or_else(|| self.qualified_name.clone().unwrap_or_else(|| self.name.clone()));

        let mut chunk = CodeChunk::new(
            self.file_path,
            content,
            self.start_line,
            self.end_line,
            self.language,
            self.kind,
            self.repository_id,
        )
        .with_symbol_name(self.name);

        if let Some(parent) = self.parent_symbol_name {
            chunk = chunk.with_parent_symbol(parent);
        }
        if let Some(doc) = self.doc {
            chunk = chunk.with_doc(doc);
        }
        if let Some(signature) = self.signature {
            chunk = chunk.with_signature(signature);
        }
        if let Some(visibility) = self.visibility {
            chunk = chunk.with_visibility(visibility);
        }
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_chunk_carries_doc_signature_visibility() {
        let symbol = Symbol::new(
            "id-1".to_string(),
            "repo".to_string(),
            "src/lib.rs".to_string(),
            "add".to_string(),
            NodeType::Function,
            Language::Rust,
            10,
            12,
        )
        .with_doc("adds two numbers")
        .with_signature("fn add(a: i32, b: i32) -> i32")
        .with_visibility("pub");

        let chunk = symbol.into_chunk();
        assert_eq!(chunk.doc(), Some("adds two numbers"));
        assert_eq!(chunk.signature(), Some("fn add(a: i32, b: i32) -> i32"));
        assert_eq!(chunk.visibility(), Some("pub"));
        assert_eq!(chunk.symbol_name(), Some("add"));
    }
}
