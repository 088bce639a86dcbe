use serde::{Deserialize, Serialize};

/// One node of a per-file heading tree built by the documentation plugin
/// (spec §3 "Document section", §4.2 chunking for documentation). Markdown
/// sections nest by heading level; plain-text "sections" are paragraph
/// breaks and are always flat (`level == 0`, no parent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSection {
    file_path: String,
    heading_path: Vec<String>,
    level: u8,
    byte_range: (usize, usize),
    parent_index: Option<usize>,
}

impl DocumentSection {
    pub fn new(
        file_path: impl Into<String>,
        heading_path: Vec<String>,
        level: u8,
        byte_range: (usize, usize),
        parent_index: Option<usize>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            heading_path,
            level,
            byte_range,
            parent_index,
        }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn heading_path(&self) -> &[String] {
        &self.heading_path
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn byte_range(&self) -> (usize, usize) {
        self.byte_range
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent_index
    }

    /// The last path segment, i.e. the section's own heading text.
    pub fn title(&self) -> &str {
        self.heading_path.last().map(String::as_str).unwrap_or("")
    }

    /// `heading_path` joined with " > ", prepended to chunk text for
    /// documentation chunking so a leaf chunk keeps its ancestor context
    /// (spec §4.2 "heading path prepended to chunk text").
    pub fn breadcrumb(&self) -> String {
        self.heading_path.join(" > ")
    }

    pub fn is_leaf_of(&self, sections: &[DocumentSection], self_index: usize) -> bool {
        !sections
            .iter()
            .any(|s| s.parent_index == Some(self_index))
    }
}

/// Splits Markdown content into a section tree keyed by `#`-heading depth.
/// Headings inside fenced code blocks are ignored. Returns sections in
/// document order; `parent_index` always points to an earlier entry.
pub fn split_markdown_sections(file_path: &str, content: &str) -> Vec<DocumentSection> {
    let mut sections = Vec::new();
    // Stack of (level, index into `sections`) for the currently open ancestors.
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut in_fence = false;
    let mut offset = 0usize;
    let mut pending_start: Option<(usize, u8, Vec<String>, Option<usize>)> = None;

    let lines: Vec<&str> = content.split_inclusive('\n').collect();

    for line in &lines {
        let trimmed = line.trim_end_matches('\n');
        if trimmed.trim_start().starts_with("```") || trimmed.trim_start().starts_with("~~~") {
            in_fence = !in_fence;
        }

        if !in_fence {
            if let Some((level, title)) = parse_atx_heading(trimmed) {
                // Close out the previous section's byte range.
                if let Some((start, lvl, path, parent)) = pending_start.take() {
                    sections.push(DocumentSection::new(file_path, path, lvl, (start, offset), parent));
                }

                while let Some(&(top_level, _)) = stack.last() {
                    if top_level >= level {
                        stack.pop();
                    } else {
                        break;
                    }
                }

                let mut heading_path: Vec<String> = stack
                    .iter()
                    .filter_map(|&(_, idx)| sections.get(idx).map(|s| s.title().to_string()))
                    .collect();
                heading_path.push(title.clone());

                let parent = stack.last().map(|&(_, idx)| idx);
                pending_start = Some((offset, level, heading_path, parent));
                // Reserve the slot now so children can reference it by index
                // before the section's byte range is known.
                let reserved_index = sections.len();
                sections.push(DocumentSection::new(
                    file_path,
                    pending_start.as_ref().unwrap().2.clone(),
                    level,
                    (offset, offset),
                    parent,
                ));
                stack.push((level, reserved_index));
            }
        }

        offset += line.len();
    }

    if let Some((start, _, _, _)) = pending_start {
        if let Some(last) = sections.last_mut() {
            let (s, _) = last.byte_range();
            *last = DocumentSection::new(
                last.file_path().to_string(),
                last.heading_path().to_vec(),
                last.level(),
                (s.max(start), offset),
                last.parent_index(),
            );
        }
    } else if sections.is_empty() && !content.is_empty() {
        // No headings at all: treat the whole file as one untitled section.
        sections.push(DocumentSection::new(
            file_path,
            vec!["(untitled)".to_string()],
            0,
            (0, content.len()),
            None,
        ));
    }

    sections
}

fn parse_atx_heading(line: &str) -> Option<(u8, String)> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = trimmed[hashes..].trim();
    if rest.is_empty() && trimmed.len() == hashes {
        return None;
    }
    Some((hashes as u8, rest.trim_end_matches('#').trim().to_string()))
}

/// Splits plain text into paragraph "sections" (blank-line-delimited), each
/// a flat, untitled leaf — the plain-text analogue of Markdown headings
/// (spec §4.2 "documentation... one chunk per leaf section").
pub fn split_plaintext_sections(file_path: &str, content: &str) -> Vec<DocumentSection> {
    let mut sections = Vec::new();
    let mut start = 0usize;
    let mut para_start: Option<usize> = None;
    let mut offset = 0usize;
    let mut index = 0usize;

    for line in content.split_inclusive('\n') {
        let is_blank = line.trim().is_empty();
        if !is_blank && para_start.is_none() {
            para_start = Some(offset);
            start = offset;
        } else if is_blank {
            if let Some(s) = para_start.take() {
                index += 1;
                sections.push(DocumentSection::new(
                    file_path,
                    vec![format!("paragraph {}", index)],
                    0,
                    (s.max(start), offset),
                    None,
                ));
            }
        }
        offset += line.len();
    }

    if let Some(s) = para_start {
        index += 1;
        sections.push(DocumentSection::new(
            file_path,
            vec![format!("paragraph {}", index)],
            0,
            (s, offset),
            None,
        ));
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_sections_nest_by_heading_level() {
        let content = "# Title\nintro\n## Sub\nbody\n### Leaf\nmore\n";
        let sections = split_markdown_sections("doc.md", content);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading_path(), &["Title".to_string()]);
        assert_eq!(
            sections[2].heading_path(),
            &["Title".to_string(), "Sub".to_string(), "Leaf".to_string()]
        );
        assert_eq!(sections[2].parent_index(), Some(1));
        assert_eq!(sections[2].breadcrumb(), "Title > Sub > Leaf");
    }

    #[test]
    fn markdown_without_headings_is_one_untitled_section() {
        let sections = split_markdown_sections("doc.md", "just text\nmore text\n");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].level(), 0);
    }

    #[test]
    fn heading_inside_fence_is_ignored() {
        let content = "# Real\n```\n# not a heading\n```\nbody\n";
        let sections = split_markdown_sections("doc.md", content);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title(), "Real");
    }

    #[test]
    fn plaintext_splits_on_blank_lines() {
        let content = "first paragraph\nstill first\n\nsecond paragraph\n";
        let sections = split_plaintext_sections("notes.txt", content);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title(), "paragraph 1");
        assert_eq!(sections[1].title(), "paragraph 2");
    }
}
