use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::VectorRepository;
use crate::domain::{CodeChunk, DomainError, Embedding, SearchQuery, SearchResult};

/// Translates a shell-style glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

pub struct InMemoryVectorRepository {
    chunks: Arc<Mutex<HashMap<String, CodeChunk>>>,
    embeddings: Arc<Mutex<HashMap<String, Embedding>>>,
}

impl InMemoryVectorRepository {
    pub fn new() -> Self {
        Self {
            chunks: Arc::new(Mutex::new(HashMap::new())),
            embeddings: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryVectorRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRepository for InMemoryVectorRepository {
    async fn save_batch(
        &self,
        chunks: &[CodeChunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError> {
        let mut chunk_store = self.chunks.lock().await;
        let mut embedding_store = self.embeddings.lock().await;

        for chunk in chunks {
            chunk_store.insert(chunk.id().to_string(), chunk.clone());
        }

        for embedding in embeddings {
            embedding_store.insert(embedding.chunk_id().to_string(), embedding.clone());
        }

        debug!(
            "Saved {} chunks and {} embeddings to memory",
            chunks.len(),
            embeddings.len()
        );
        Ok(())
    }

    async fn delete(&self, chunk_id: &str) -> Result<(), DomainError> {
        let mut chunk_store = self.chunks.lock().await;
        let mut embedding_store = self.embeddings.lock().await;
        chunk_store.remove(chunk_id);
        embedding_store.remove(chunk_id);
        Ok(())
    }

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError> {
        let mut chunk_store = self.chunks.lock().await;
        let mut embedding_store = self.embeddings.lock().await;

        let ids: Vec<String> = chunk_store
            .values()
            .filter(|chunk| chunk.repository_id() == repository_id)
            .map(|chunk| chunk.id().to_string())
            .collect();

        for id in ids {
            chunk_store.remove(&id);
            embedding_store.remove(&id);
        }

        Ok(())
    }

    async fn delete_by_file_path(
        &self,
        repository_id: &str,
        file_path: &str,
    ) -> Result<u64, DomainError> {
        let mut chunk_store = self.chunks.lock().await;
        let mut embedding_store = self.embeddings.lock().await;

        let ids: Vec<String> = chunk_store
            .values()
            .filter(|chunk| {
                chunk.repository_id() == repository_id && chunk.file_path() == file_path
            })
            .map(|chunk| chunk.id().to_string())
            .collect();

        let count = ids.len() as u64;
        for id in ids {
            chunk_store.remove(&id);
            embedding_store.remove(&id);
        }

        Ok(count)
    }

    async fn search_text(
        &self,
        terms: &[&str],
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let options = query.content_options();
        let path_glob = options
            .path_glob
            .as_ref()
            .map(|g| regex::Regex::new(&glob_to_regex(g)))
            .transpose()
            .map_err(|e| DomainError::invalid_input(format!("Invalid path_glob: {}", e)))?;

        let matcher: Box<dyn Fn(&str) -> Option<f32>> = if options.regex {
            let pattern = terms.join(" ");
            let re = regex::RegexBuilder::new(&pattern)
                .case_insensitive(!options.case_sensitive)
                .build()
                .map_err(|e| DomainError::invalid_input(format!("Invalid regex: {}", e)))?;
            Box::new(move |haystack: &str| if re.is_match(haystack) { Some(1.0) } else { None })
        } else if options.whole_word {
            let patterns: Vec<regex::Regex> = terms
                .iter()
                .map(|t| {
                    regex::RegexBuilder::new(&format!(r"\b{}\b", regex::escape(t)))
                        .case_insensitive(!options.case_sensitive)
                        .build()
                })
                .collect::<Result<_, _>>()
                .map_err(|e| DomainError::invalid_input(format!("Invalid term: {}", e)))?;
            Box::new(move |haystack: &str| {
                let hits = patterns.iter().filter(|re| re.is_match(haystack)).count();
                if hits == 0 { None } else { Some(hits as f32 / patterns.len() as f32) }
            })
        } else {
            let case_sensitive = options.case_sensitive;
            let terms_owned: Vec<String> = terms
                .iter()
                .map(|t| if case_sensitive { t.to_string() } else { t.to_lowercase() })
                .collect();
            Box::new(move |haystack: &str| {
                let folded = if case_sensitive { haystack.to_string() } else { haystack.to_lowercase() };
                let hits = terms_owned.iter().filter(|t| folded.contains(t.as_str())).count();
                if hits == 0 { None } else { Some(hits as f32 / terms_owned.len() as f32) }
            })
        };

        let chunk_store = self.chunks.lock().await;

        let mut scored: Vec<(CodeChunk, f32)> = chunk_store
            .values()
            .filter_map(|chunk| {
                if let Some(repo_ids) = query.repository_ids() {
                    if !repo_ids.contains(&chunk.repository_id().to_string()) {
                        return None;
                    }
                }
                if let Some(languages) = query.languages() {
                    if !languages.iter().any(|l| l == chunk.language().as_str()) {
                        return None;
                    }
                }
                if let Some(ref re) = path_glob {
                    if !re.is_match(chunk.file_path()) {
                        return None;
                    }
                }

                let score = matcher(chunk.content())?;
                Some((chunk.clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .skip(options.offset)
            .take(query.limit())
            .map(|(chunk, score)| SearchResult::new(chunk, score))
            .collect())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let scored_ids: Vec<(String, f32)> = {
            let embeddings = self.embeddings.lock().await;
            let mut scored: Vec<(String, f32)> = embeddings
                .values()
                .map(|embedding| {
                    let score = cosine_similarity(query_embedding, embedding.vector());
                    (embedding.chunk_id().to_string(), score)
                })
                .collect();

            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored
        };

        let chunk_store = self.chunks.lock().await;
        let mut results = Vec::new();

        for (chunk_id, score) in scored_ids {
            if results.len() >= query.limit() {
                break;
            }

            if let Some(min_score) = query.min_score() {
                if score < min_score {
                    continue;
                }
            }

            let chunk = match chunk_store.get(&chunk_id) {
                Some(chunk) => chunk.clone(),
                None => continue,
            };

            if let Some(languages) = query.languages() {
                if !languages.iter().any(|l| l == chunk.language().as_str()) {
                    continue;
                }
            }

            if let Some(node_types) = query.node_types() {
                if !node_types.iter().any(|t| t == chunk.node_type().as_str()) {
                    continue;
                }
            }

            if let Some(repo_ids) = query.repository_ids() {
                if !repo_ids.contains(&chunk.repository_id().to_string()) {
                    continue;
                }
            }

            results.push(SearchResult::new(chunk, score));
        }

        Ok(results)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let chunks = self.chunks.lock().await;
        Ok(chunks.len() as u64)
    }

    async fn list_symbols(
        &self,
        repository_id: Option<&str>,
    ) -> Result<Vec<CodeChunk>, DomainError> {
        let chunks = self.chunks.lock().await;
        Ok(chunks
            .values()
            .filter(|chunk| chunk.symbol_name().is_some())
            .filter(|chunk| match repository_id {
                Some(r) => chunk.repository_id() == r,
                None => true,
            })
            .cloned()
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
