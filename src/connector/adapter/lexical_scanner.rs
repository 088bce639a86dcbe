//! Degraded-mode fallback for files whose grammar failed to load or whose
//! parse tree-sitter rejected outright. Emits best-effort `NodeType::Other`
//! chunks from a declaration-shaped regex instead of refusing to index the
//! file at all — the store still gets trigram-searchable content and a
//! symbol name to rank against, just without a real AST behind it.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{CodeChunk, Language, NodeType};

/// Matches common declaration keywords across the language set this crate
/// indexes (C-like, scripting, and JVM families) followed by an identifier.
/// Deliberately permissive: a false-positive symbol is cheap (one extra
/// searchable chunk), a false negative silently drops a symbol.
fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:(?:pub|export|public|private|protected|static|async|final|override)\s+)*(?:fn|func|function|def|class|struct|enum|trait|interface|impl|module|namespace|type)\s+([A-Za-z_][A-Za-z0-9_]*)",
        )
        .expect("static lexical scanner pattern is valid")
    })
}

/// Minimum trimmed body length, matching the tree-sitter plugin's
/// noise filter so lexical-mode results aren't systematically noisier.
const MIN_BODY_LEN: usize = 10;

/// Number of lines captured after a matched declaration line to give the
/// chunk some body content beyond the signature itself.
const CONTEXT_LINES: usize = 15;

/// Scan `content` for declaration-shaped lines and emit one chunk per match.
/// Never fails — an empty `Vec` just means nothing looked like a
/// declaration, which degraded mode treats as "no symbols found" rather
/// than an error.
pub fn scan(content: &str, file_path: &str, language: Language, repository_id: &str) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let pattern = declaration_pattern();

    let mut chunks = Vec::new();
    for capture in pattern.captures_iter(content) {
        let Some(whole_match) = capture.get(0) else {
            continue;
        };
        let Some(name) = capture.get(1) else {
            continue;
        };

        let start_line = 1 + content[..whole_match.start()].matches('\n').count();
        let end_line = (start_line + CONTEXT_LINES).min(lines.len().max(start_line));

        let body = lines[start_line - 1..end_line].join("\n");
        if body.trim().len() < MIN_BODY_LEN {
            continue;
        }

        let chunk = CodeChunk::new(
            file_path.to_string(),
            body,
            start_line as u32,
            end_line as u32,
            language,
            NodeType::Other,
            repository_id.to_string(),
        )
        .with_symbol_name(name.as_str());

        chunks.push(chunk);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_rust_function() {
        let content = "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n";
        let chunks = scan(content, "lib.rs", Language::Rust, "repo");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].symbol_name(), Some("add"));
        assert_eq!(chunks[0].node_type(), NodeType::Other);
    }

    #[test]
    fn finds_python_class_and_def() {
        let content = "class Widget:\n    def render(self):\n        return self.value\n";
        let chunks = scan(content, "widget.py", Language::Python, "repo");
        let names: Vec<&str> = chunks.iter().filter_map(|c| c.symbol_name()).collect();
        assert!(names.contains(&"Widget"));
        assert!(names.contains(&"render"));
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(scan("", "empty.rs", Language::Rust, "repo").is_empty());
    }

    #[test]
    fn short_trailing_declaration_is_skipped() {
        // A declaration with no body to speak of falls under MIN_BODY_LEN.
        let content = "fn x(";
        assert!(scan(content, "broken.rs", Language::Rust, "repo").is_empty());
    }
}
