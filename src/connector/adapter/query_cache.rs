//! Three-tier query result cache (C7). L1 is an in-process LRU, L2 an
//! optional pluggable shared store (no default implementation ships, same
//! posture as the ANN vector store's pluggable backend), L3 an optional
//! on-disk fingerprint-addressed directory. All three are keyed by
//! `Fingerprint`, a hash of the normalized query plus the repository's
//! index generation at lookup time, so a generation bump invalidates stale
//! entries without an explicit sweep.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, Notify};

use crate::domain::{DomainError, SearchResult};

/// Opaque cache key: a hash of query text, options, repository id, and the
/// `index_generation` observed at lookup time. Two fingerprints only
/// collide if the underlying search would have produced the same answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build a fingerprint from the pieces that determine a query's answer.
    /// `index_generation` is folded in directly (not looked up lazily)
    /// so callers control exactly which generation snapshot they're caching
    /// against.
    pub fn new(repository_id: &str, normalized_query: &str, options_key: &str, index_generation: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(repository_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(normalized_query.as_bytes());
        hasher.update(b"\0");
        hasher.update(options_key.as_bytes());
        hasher.update(b"\0");
        hasher.update(index_generation.to_le_bytes());
        Fingerprint(format!("{:x}", hasher.finalize()))
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

/// An L2 backing store a real deployment can plug in (e.g. a shared
/// in-memory grid across coordinator processes). No implementation ships
/// here; `QueryCache` works fine with `l2: None`.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &Fingerprint) -> Option<Vec<SearchResult>>;
    async fn put(&self, key: &Fingerprint, value: &[SearchResult]);
    async fn invalidate(&self, key: &Fingerprint);
}

/// Cached answer for one fingerprint, tagged with the generation it was
/// computed against so a later eviction sweep (or a defensive re-check on
/// read) can tell a stale hit from a fresh one.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CachedEntry {
    index_generation: u64,
    results: Vec<SearchResult>,
}

/// Three-tier query cache with single-flight coalescing: concurrent lookups
/// for the same fingerprint share one computation instead of stampeding the
/// underlying search.
pub struct QueryCache {
    l1: Mutex<LruCache<Fingerprint, CachedEntry>>,
    l2: Option<Arc<dyn SharedCache>>,
    l3_dir: Option<PathBuf>,
    in_flight: DashMap<Fingerprint, Arc<Notify>>,
}

impl QueryCache {
    /// `l1_capacity` of zero is coerced to 1 (an LRU of size 0 is pointless
    /// and `LruCache::new` would panic on it).
    pub fn new(l1_capacity: usize, l2: Option<Arc<dyn SharedCache>>, l3_dir: Option<PathBuf>) -> Self {
        let capacity = NonZeroUsize::new(l1_capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            l1: Mutex::new(LruCache::new(capacity)),
            l2,
            l3_dir,
            in_flight: DashMap::new(),
        }
    }

    /// Look up `key`, falling back L1 -> L2 -> L3 in order and promoting a
    /// lower-tier hit back up to L1. Returns `None` on a full miss or when
    /// the cached entry's generation is stale relative to `index_generation`.
    pub async fn get(&self, key: &Fingerprint, index_generation: u64) -> Option<Vec<SearchResult>> {
        if let Some(entry) = self.l1.lock().await.get(key).cloned() {
            if entry.index_generation >= index_generation {
                return Some(entry.results);
            }
        }

        if let Some(l2) = &self.l2 {
            if let Some(results) = l2.get(key).await {
                self.promote_l1(key, index_generation, results.clone()).await;
                return Some(results);
            }
        }

        if let Some(results) = self.read_l3(key, index_generation).await {
            self.promote_l1(key, index_generation, results.clone()).await;
            return Some(results);
        }

        None
    }

    /// Store `results` for `key` at `index_generation` in every configured
    /// tier.
    pub async fn put(&self, key: &Fingerprint, index_generation: u64, results: Vec<SearchResult>) {
        self.promote_l1(key, index_generation, results.clone()).await;

        if let Some(l2) = &self.l2 {
            l2.put(key, &results).await;
        }

        if let Some(dir) = &self.l3_dir {
            let entry = CachedEntry {
                index_generation,
                results,
            };
            if let Err(e) = write_l3(dir, key, &entry).await {
                tracing::warn!("failed to write L3 cache entry for {}: {}", key.as_str(), e);
            }
        }
    }

    async fn promote_l1(&self, key: &Fingerprint, index_generation: u64, results: Vec<SearchResult>) {
        self.l1.lock().await.put(
            key.clone(),
            CachedEntry {
                index_generation,
                results,
            },
        );
    }

    async fn read_l3(&self, key: &Fingerprint, index_generation: u64) -> Option<Vec<SearchResult>> {
        let dir = self.l3_dir.as_ref()?;
        let path = l3_path(dir, key);
        let bytes = tokio::fs::read(&path).await.ok()?;
        let entry: CachedEntry = serde_json::from_slice(&bytes).ok()?;
        if entry.index_generation < index_generation {
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }
        Some(entry.results)
    }

    /// Drop every tier's entry for `key`, e.g. after an explicit reindex
    /// that the caller doesn't want to wait for a generation check to catch.
    pub async fn invalidate(&self, key: &Fingerprint) {
        self.l1.lock().await.pop(key);
        if let Some(l2) = &self.l2 {
            l2.invalidate(key).await;
        }
        if let Some(dir) = &self.l3_dir {
            let _ = tokio::fs::remove_file(l3_path(dir, key)).await;
        }
    }

    /// Run `build` to compute a value for `key`, ensuring only one caller
    /// across the process actually executes `build` for a given key at a
    /// time. Concurrent callers for the same key await the first builder's
    /// result instead of duplicating the work. Neither cache tier is
    /// consulted here; call `get` first and only call this on a miss.
    pub async fn single_flight<F, Fut>(
        &self,
        key: &Fingerprint,
        index_generation: u64,
        build: F,
    ) -> Result<Vec<SearchResult>, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<SearchResult>, DomainError>>,
    {
        loop {
            if let Some(cached) = self.get(key, index_generation).await {
                return Ok(cached);
            }

            let notify = match self.in_flight.entry(key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(entry) => {
                    let notify = entry.get().clone();
                    drop(entry);
                    notify.notified().await;
                    continue;
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    let notify = Arc::new(Notify::new());
                    entry.insert(notify.clone());
                    notify
                }
            };

            let result = build().await;
            self.in_flight.remove(key);
            notify.notify_waiters();

            let results = result?;
            self.put(key, index_generation, results.clone()).await;
            return Ok(results);
        }
    }
}

fn l3_path(dir: &Path, key: &Fingerprint) -> PathBuf {
    dir.join(format!("{}.json", key.as_str()))
}

async fn write_l3(dir: &Path, key: &Fingerprint, entry: &CachedEntry) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let bytes = serde_json::to_vec(entry).map_err(std::io::Error::other)?;
    tokio::fs::write(l3_path(dir, key), bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeChunk, Language, NodeType};

    fn sample_result(symbol: &str) -> SearchResult {
        let chunk = CodeChunk::new(
            "lib.rs".to_string(),
            "fn f() {}".to_string(),
            1,
            1,
            Language::Rust,
            NodeType::Function,
            "repo".to_string(),
        )
        .with_symbol_name(symbol);
        SearchResult::new(chunk, 1.0)
    }

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let a = Fingerprint::new("repo", "foo", "limit=10", 3);
        let b = Fingerprint::new("repo", "foo", "limit=10", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_generation() {
        let a = Fingerprint::new("repo", "foo", "limit=10", 3);
        let b = Fingerprint::new("repo", "foo", "limit=10", 4);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn l1_hit_roundtrip() {
        let cache = QueryCache::new(4, None, None);
        let key = Fingerprint::new("repo", "foo", "", 1);
        cache.put(&key, 1, vec![sample_result("foo")]).await;

        let hit = cache.get(&key, 1).await.unwrap();
        assert_eq!(hit.len(), 1);
    }

    #[tokio::test]
    async fn stale_generation_is_a_miss() {
        let cache = QueryCache::new(4, None, None);
        let key = Fingerprint::new("repo", "foo", "", 1);
        cache.put(&key, 1, vec![sample_result("foo")]).await;

        assert!(cache.get(&key, 2).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_clears_l1() {
        let cache = QueryCache::new(4, None, None);
        let key = Fingerprint::new("repo", "foo", "", 1);
        cache.put(&key, 1, vec![sample_result("foo")]).await;
        cache.invalidate(&key).await;

        assert!(cache.get(&key, 1).await.is_none());
    }

    #[tokio::test]
    async fn l3_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = QueryCache::new(4, None, Some(dir.path().to_path_buf()));
        let key = Fingerprint::new("repo", "foo", "", 1);
        cache.put(&key, 1, vec![sample_result("foo")]).await;

        // Fresh cache, same disk directory: L1 is empty, L3 should still hit.
        let cold = QueryCache::new(4, None, Some(dir.path().to_path_buf()));
        let hit = cold.get(&key, 1).await.unwrap();
        assert_eq!(hit.len(), 1);
    }

    #[tokio::test]
    async fn single_flight_runs_builder_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = Arc::new(QueryCache::new(4, None, None));
        let key = Fingerprint::new("repo", "foo", "", 1);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let key = key.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .single_flight(&key, 1, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(vec![sample_result("foo")])
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
