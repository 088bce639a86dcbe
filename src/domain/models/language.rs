use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Php,
    Cpp,
    C,
    Java,
    CSharp,
    Swift,
    Kotlin,
    Ruby,
    Dart,
    /// Markdown documentation, handled by the documentation plugin rather than tree-sitter.
    Markdown,
    /// Plain text, handled by the documentation plugin's paragraph splitter.
    PlainText,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyi" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "php" => Language::Php,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "c" | "h" => Language::C,
            "java" => Language::Java,
            "cs" => Language::CSharp,
            "swift" => Language::Swift,
            "kt" | "kts" => Language::Kotlin,
            "rb" => Language::Ruby,
            "dart" => Language::Dart,
            "md" | "markdown" => Language::Markdown,
            "txt" => Language::PlainText,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "rust" => Language::Rust,
            "python" => Language::Python,
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "go" => Language::Go,
            "php" => Language::Php,
            "cpp" | "c++" => Language::Cpp,
            "c" => Language::C,
            "java" => Language::Java,
            "csharp" | "c#" => Language::CSharp,
            "swift" => Language::Swift,
            "kotlin" => Language::Kotlin,
            "ruby" => Language::Ruby,
            "dart" => Language::Dart,
            "markdown" => Language::Markdown,
            "plaintext" => Language::PlainText,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Php => "php",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Ruby => "ruby",
            Language::Dart => "dart",
            Language::Markdown => "markdown",
            Language::PlainText => "plaintext",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    /// Languages handled by the documentation plugin instead of a tree-sitter grammar.
    pub fn is_documentation(&self) -> bool {
        matches!(self, Language::Markdown | Language::PlainText)
    }

    pub fn primary_extension(&self) -> &'static str {
        match self {
            Language::Rust => "rs",
            Language::Python => "py",
            Language::JavaScript => "js",
            Language::TypeScript => "ts",
            Language::Go => "go",
            Language::Php => "php",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Java => "java",
            Language::CSharp => "cs",
            Language::Swift => "swift",
            Language::Kotlin => "kt",
            Language::Ruby => "rb",
            Language::Dart => "dart",
            Language::Markdown => "md",
            Language::PlainText => "txt",
            Language::Unknown => "",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Rust => &["rs"],
            Language::Python => &["py", "pyi"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::TypeScript => &["ts", "tsx"],
            Language::Go => &["go"],
            Language::Php => &["php"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
            Language::C => &["c", "h"],
            Language::Java => &["java"],
            Language::CSharp => &["cs"],
            Language::Swift => &["swift"],
            Language::Kotlin => &["kt", "kts"],
            Language::Ruby => &["rb"],
            Language::Dart => &["dart"],
            Language::Markdown => &["md", "markdown"],
            Language::PlainText => &["txt"],
            Language::Unknown => &[],
        }
    }

    pub fn uses_braces(&self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::JavaScript
                | Language::TypeScript
                | Language::Go
                | Language::Php
                | Language::Cpp
                | Language::C
                | Language::Java
                | Language::CSharp
                | Language::Kotlin
                | Language::Dart
        )
    }

    pub fn is_statically_typed(&self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::TypeScript
                | Language::Go
                | Language::Php
                | Language::Cpp
                | Language::C
                | Language::Java
                | Language::CSharp
                | Language::Swift
                | Language::Kotlin
                | Language::Dart
        )
    }

    /// Languages with a tree-sitter grammar registered in the parser plugin.
    /// Excludes the documentation languages, which go through a different plugin.
    pub fn all_supported() -> Vec<Language> {
        vec![
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Go,
            Language::Php,
            Language::Cpp,
            Language::C,
            Language::Java,
            Language::CSharp,
            Language::Swift,
            Language::Kotlin,
            Language::Ruby,
            Language::Dart,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("js"), Language::JavaScript);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("php"), Language::Php);
        assert_eq!(Language::from_extension("cpp"), Language::Cpp);
        assert_eq!(Language::from_extension("cs"), Language::CSharp);
        assert_eq!(Language::from_extension("rb"), Language::Ruby);
        assert_eq!(Language::from_extension("txt"), Language::PlainText);
        assert_eq!(Language::from_extension("xyz"), Language::Unknown);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(
            Language::from_path(Path::new("src/main.rs")),
            Language::Rust
        );
        assert_eq!(
            Language::from_path(Path::new("script.py")),
            Language::Python
        );
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!(Language::parse("rust"), Language::Rust);
        assert_eq!(Language::parse("PYTHON"), Language::Python);
        assert_eq!(Language::parse("unknown_lang"), Language::Unknown);
    }

    #[test]
    fn test_is_known() {
        assert!(Language::Rust.is_known());
        assert!(Language::Python.is_known());
        assert!(!Language::Unknown.is_known());
    }

    #[test]
    fn test_is_documentation() {
        assert!(Language::Markdown.is_documentation());
        assert!(Language::PlainText.is_documentation());
        assert!(!Language::Rust.is_documentation());
    }

    #[test]
    fn test_extensions() {
        assert_eq!(
            Language::JavaScript.extensions(),
            &["js", "jsx", "mjs", "cjs"]
        );
        assert_eq!(Language::Rust.extensions(), &["rs"]);
    }

    #[test]
    fn test_all_supported() {
        let supported = Language::all_supported();
        assert!(supported.contains(&Language::Rust));
        assert!(supported.contains(&Language::Python));
        assert!(supported.contains(&Language::Php));
        assert!(supported.contains(&Language::Ruby));
        assert!(!supported.contains(&Language::Unknown));
    }
}
