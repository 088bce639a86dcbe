use async_trait::async_trait;

use crate::domain::{CodeChunk, DomainError, Language, SymbolReference};

/// A single incremental source edit, mirroring `tree_sitter::InputEdit`'s
/// byte/point ranges without binding this trait to a tree-sitter type.
/// `start_line`/`old_end_line`/`new_end_line` are 1-based row numbers; column
/// is always treated as 0, which is sufficient for the line-granularity
/// edits the change pipeline reports (a whole-file rewrite between two
/// debounced filesystem events, not a keystroke-level diff).
#[derive(Debug, Clone, Copy)]
pub struct TextEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_line: u32,
    pub old_end_line: u32,
    pub new_end_line: u32,
}

/// Parses source code into semantic chunks.
#[async_trait]
pub trait ParserService: Send + Sync {
    /// Parse a file into semantic code chunks (functions, classes, etc.).
    async fn parse_file(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
        repository_id: &str,
    ) -> Result<Vec<CodeChunk>, DomainError>;

    /// Re-parse a file given the edits applied since the previous
    /// `parse_file`/`reparse_file` call for this `(repository_id, file_path)`,
    /// reusing the unchanged subtrees of the last parse where the
    /// implementation keeps a tree cache. `edits` must be in the order they
    /// were applied to the content, oldest first. The default falls back to
    /// a full reparse, so only implementations that actually cache a tree
    /// (currently `TreeSitterParser`) need to override this.
    async fn reparse_file(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
        repository_id: &str,
        edits: &[TextEdit],
    ) -> Result<Vec<CodeChunk>, DomainError> {
        let _ = edits;
        self.parse_file(content, file_path, language, repository_id).await
    }

    /// Extract symbol references (function calls, type references, etc.) from a file.
    async fn extract_references(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
        repository_id: &str,
    ) -> Result<Vec<SymbolReference>, DomainError>;

    fn supported_languages(&self) -> Vec<Language>;

    fn supports_language(&self, language: Language) -> bool {
        self.supported_languages().contains(&language)
    }
}
