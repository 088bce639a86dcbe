//! Process-wide façade over the single shared [`Container`] (C8):
//! explicit start/shutdown lifecycle, the change pipeline (watcher,
//! debouncer, work queue, worker pool — C6), and the query cache (C7).
//! Generalizes the teacher's construct-only `Container` the way
//! `Container::new` already builds everything explicitly and hands back
//! owned `Arc`s — `Coordinator` just adds the parts that only make sense
//! once a process is actually running continuously instead of doing one
//! indexing pass and exiting.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::CallGraphQuery;
use crate::domain::{
    ContentSearchOptions, DomainError, Repository, SearchQuery, SearchResult,
    SemanticSearchResult, VectorStore,
};

use super::container::{Container, ContainerConfig};
use crate::connector::adapter::{
    build_ignore_matcher, ChangeKind, Debouncer, EnqueueOutcome, Fingerprint, IndexJob,
    JobPriority, QueryCache, RawEvent, RepoWatcher, WorkQueue,
};

/// Configured size of each query cache tier (spec §4.8 `cache_sizes`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheSizes {
    /// Max entries held in the in-process LRU (L1).
    pub l1_entries: usize,
    /// Whether an on-disk fingerprint cache (L3) is used, rooted at
    /// `<data_dir>/cache`.
    pub l3_enabled: bool,
}

impl Default for CacheSizes {
    fn default() -> Self {
        Self {
            l1_entries: 256,
            l3_enabled: false,
        }
    }
}

/// Process-wide configuration for [`Coordinator`]. Recognizes every option
/// named in spec §4.8; `deny_unknown_fields` on both this and
/// [`ContainerConfig`] rejects typos at load instead of silently ignoring
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CoordinatorConfig {
    pub store: ContainerConfig,
    /// Number of concurrent indexing workers draining the work queue.
    pub worker_count: usize,
    /// Debounce window (milliseconds) before a coalesced filesystem change
    /// becomes an `IndexJob`. Spec's suggested range is 300-800ms.
    pub debounce_ms: u64,
    /// Bound on the work queue; overflow evicts the lowest-priority job
    /// and flags its repository for a deferred rescan.
    pub queue_capacity: usize,
    /// Whether semantic (embedding-based) search is attempted at all. When
    /// false, `semantic_search` degrades to an error rather than silently
    /// returning keyword results under a misleading label.
    pub semantic_enabled: bool,
    /// Reserved: selects an embedding model/profile once more than one is
    /// supported. Recognized now so config files are forward-compatible.
    pub embedding_model_id: Option<String>,
    /// Reserved: target token budget per chunk for future chunk-splitting
    /// work; tree-sitter query patterns currently define chunk boundaries
    /// directly.
    pub chunk_token_budget: usize,
    /// Maximum number of symbol candidates considered before the
    /// edit-distance rerank in `fuzzy_symbol`.
    pub fuzzy_candidate_cap: usize,
    pub cache_sizes: CacheSizes,
    /// Extra ignore globs applied on top of `.gitignore` when watching a
    /// repository root.
    pub ignore_globs: Vec<String>,
    /// Whether files whose grammar fails to load or parse degrade to the
    /// lexical-mode scanner rather than being skipped outright.
    pub parser_fallback: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            store: ContainerConfig::default(),
            worker_count: 2,
            debounce_ms: 500,
            queue_capacity: 256,
            semantic_enabled: true,
            embedding_model_id: None,
            chunk_token_budget: 512,
            fuzzy_candidate_cap: 500,
            cache_sizes: CacheSizes::default(),
            ignore_globs: Vec::new(),
            parser_fallback: true,
        }
    }
}

impl CoordinatorConfig {
    /// Parse from TOML text (the on-disk format under `<index_root>/config`).
    pub fn from_toml_str(text: &str) -> Result<Self, DomainError> {
        toml::from_str(text).map_err(|e| DomainError::invalid_input(format!("bad config: {}", e)))
    }

    /// Load from `<index_root>/config`, falling back to defaults when the
    /// file doesn't exist, then apply `CODESEARCH_*` environment overrides.
    pub async fn load(index_root: &std::path::Path) -> Result<Self, DomainError> {
        let config_path = index_root.join("config");
        let mut config = match tokio::fs::read_to_string(&config_path).await {
            Ok(text) => Self::from_toml_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(DomainError::internal(format!("failed to read config: {}", e))),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CODESEARCH_WORKER_COUNT") {
            if let Ok(n) = v.parse() {
                self.worker_count = n;
            }
        }
        if let Ok(v) = std::env::var("CODESEARCH_DEBOUNCE_MS") {
            if let Ok(n) = v.parse() {
                self.debounce_ms = n;
            }
        }
        if let Ok(v) = std::env::var("CODESEARCH_SEMANTIC_ENABLED") {
            self.semantic_enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("CODESEARCH_DATA_DIR") {
            self.store.data_dir = v;
        }
    }
}

/// Everything the change pipeline needs to keep watching one registered
/// repository: the live watch handle and its event-forwarding task.
struct RepoWatch {
    _watcher: RepoWatcher,
    _forward_task: tokio::task::JoinHandle<()>,
}

/// Owns the shared [`Container`] plus the process-wide pipeline and cache
/// sitting above it. Construct with [`Coordinator::new`], call
/// [`Coordinator::start`] once, and [`Coordinator::shutdown`] before
/// dropping to let in-flight work finish cleanly.
pub struct Coordinator {
    config: CoordinatorConfig,
    container: Arc<Container>,
    cache: Arc<QueryCache>,
    work_queue: Arc<Mutex<WorkQueue>>,
    debouncer: Arc<Mutex<Debouncer>>,
    watches: DashMap<String, RepoWatch>,
    cancellation: CancellationToken,
    workers: Mutex<JoinSet<()>>,
    event_tx: mpsc::UnboundedSender<(String, RawEvent)>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<(String, RawEvent)>>>,
}

impl Coordinator {
    pub async fn new(config: CoordinatorConfig) -> Result<Self> {
        let container = Arc::new(Container::new(config.store.clone()).await?);

        let l3_dir = if config.cache_sizes.l3_enabled {
            Some(PathBuf::from(&config.store.data_dir).join("cache"))
        } else {
            None
        };
        let cache = Arc::new(QueryCache::new(config.cache_sizes.l1_entries, None, l3_dir));

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Self {
            work_queue: Arc::new(Mutex::new(WorkQueue::new(config.queue_capacity))),
            debouncer: Arc::new(Mutex::new(Debouncer::new(Duration::from_millis(
                config.debounce_ms,
            )))),
            config,
            container,
            cache,
            watches: DashMap::new(),
            cancellation: CancellationToken::new(),
            workers: Mutex::new(JoinSet::new()),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        })
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Start the pipeline: reconcile every already-registered repository,
    /// spawn its watcher, then spawn the debounce sweeper and the worker
    /// pool. Idempotent re-calls are not supported; call this once.
    pub async fn start(&self) -> Result<()> {
        info!("Coordinator starting ({} workers)", self.config.worker_count);

        let repositories = self.container.list_use_case().execute().await?;
        for repository in &repositories {
            if let Err(e) = self.reconcile_repository(repository).await {
                warn!("Reconcile failed for {}: {}", repository.name(), e);
            }
            if let Err(e) = self.watch_repository(repository).await {
                warn!("Failed to watch {}: {}", repository.path(), e);
            }
        }

        let event_rx = self.event_rx.lock().await.take();
        self.spawn_event_dispatcher(event_rx);
        self.spawn_debounce_sweeper();
        self.spawn_workers();

        Ok(())
    }

    /// Stop accepting new work and let in-flight work finish (capped by
    /// `timeout`), then close every watch handle.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        info!("Coordinator shutting down");
        self.cancellation.cancel();

        let mut workers = self.workers.lock().await;
        let _ = tokio::time::timeout(timeout, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        self.watches.clear();
        self.container.vector_repo().flush().await?;
        Ok(())
    }

    /// Crash-recovery reconciliation: enqueue a whole-repository job at
    /// `Background` priority rather than indexing inline, so a slow
    /// reconcile doesn't hold up `start()` and competes fairly with other
    /// background work already queued.
    async fn reconcile_repository(&self, repository: &Repository) -> Result<()> {
        debug!("Reconciling {}", repository.name());
        let job = IndexJob::new(
            repository.id().to_string(),
            PathBuf::from("."),
            ChangeKind::Modified,
            JobPriority::Background,
        );
        let mut queue = self.work_queue.lock().await;
        if queue.push(job) == EnqueueOutcome::RejectedLowPriority {
            warn!(
                "work queue full at startup, deferring reconcile for {}",
                repository.name()
            );
        }
        Ok(())
    }

    async fn watch_repository(&self, repository: &Repository) -> Result<()> {
        let root = PathBuf::from(repository.path());
        let ignore = Arc::new(
            build_ignore_matcher(&root, &self.config.ignore_globs)
                .map_err(|e| anyhow::anyhow!(e))?,
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = RepoWatcher::spawn(root, ignore, tx).map_err(|e| anyhow::anyhow!(e))?;

        let repository_id = repository.id().to_string();
        let forward = self.event_tx.clone();
        let _forward_task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if forward.send((repository_id.clone(), event)).is_err() {
                    return;
                }
            }
        });

        self.watches.insert(
            repository.id().to_string(),
            RepoWatch {
                _watcher: watcher,
                _forward_task,
            },
        );
        Ok(())
    }

    /// Forward raw watcher events into the debouncer.
    fn spawn_event_dispatcher(&self, event_rx: Option<mpsc::UnboundedReceiver<(String, RawEvent)>>) {
        let Some(mut rx) = event_rx else {
            return;
        };
        let debouncer = self.debouncer.clone();
        let cancellation = self.cancellation.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => return,
                    event = rx.recv() => {
                        let Some((repository_id, raw)) = event else { return };
                        let mut guard = debouncer.lock().await;
                        guard.record(tag_path(&repository_id, &raw.path), raw.kind, Instant::now());
                    }
                }
            }
        });
    }

    /// Every `debounce_ms`, drain settled debouncer entries into the work
    /// queue at `Foreground` priority: these are watcher-driven edits to
    /// files near the working set, one tier below a user-triggered
    /// `index_repository`/`reindex` call but above the `Background` tier
    /// reserved for startup crash-recovery reconciliation.
    fn spawn_debounce_sweeper(&self) {
        let debouncer = self.debouncer.clone();
        let work_queue = self.work_queue.clone();
        let cancellation = self.cancellation.clone();
        let interval = Duration::from_millis(self.config.debounce_ms.max(50));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }

                let ready = debouncer.lock().await.drain_ready(Instant::now());
                if ready.is_empty() {
                    continue;
                }

                let mut queue = work_queue.lock().await;
                for (tagged_path, kind) in ready {
                    let Some((repository_id, relative_path)) = untag_path(&tagged_path) else {
                        continue;
                    };
                    let job = IndexJob::new(repository_id, relative_path, kind, JobPriority::Foreground);
                    if queue.push(job) == EnqueueOutcome::RejectedLowPriority {
                        debug!("work queue full, dropped a foreground job");
                    }
                }
            }
        });
    }

    /// Spawn `worker_count` tasks pulling jobs off the work queue. Jobs are
    /// coalesced per repository: the whole repository is reconciled via
    /// its existing hash-diffing incremental index rather than indexing
    /// one file in isolation, since `IndexRepositoryUseCase` only exposes
    /// whole-repository passes.
    fn spawn_workers(&self) {
        let mut workers = self
            .workers
            .try_lock()
            .expect("start() is the only caller and runs before any concurrent access");
        for _ in 0..self.config.worker_count.max(1) {
            let work_queue = self.work_queue.clone();
            let container = self.container.clone();
            let cancellation = self.cancellation.clone();

            workers.spawn(async move {
                loop {
                    if cancellation.is_cancelled() {
                        return;
                    }

                    let job = {
                        let mut queue = work_queue.lock().await;
                        queue.pop()
                    };

                    let Some(job) = job else {
                        tokio::select! {
                            _ = cancellation.cancelled() => return,
                            _ = tokio::time::sleep(Duration::from_millis(200)) => continue,
                        }
                    };

                    // No explicit cache invalidation needed: every cache read
                    // compares against the repository's live `index_generation`,
                    // and a successful job just bumped it.
                    if let Err(e) = run_job(&container, &job).await {
                        error!("background reindex failed for {}: {}", job.repository_id, e);
                    }
                }
            });
        }
    }

    // ---- spec §6 request surface --------------------------------------

    pub async fn index_repository(
        &self,
        path: &str,
        name: Option<&str>,
        force: bool,
    ) -> Result<Repository, DomainError> {
        let repository = self
            .container
            .index_use_case()
            .execute(path, name, VectorStore::default(), None, force)
            .await?;

        if self.watches.get(repository.id()).is_none() {
            if let Err(e) = self.watch_repository(&repository).await {
                warn!("Failed to start watch for {}: {}", repository.path(), e);
            }
        }

        Ok(repository)
    }

    pub async fn deregister_repository(&self, repository_id: &str) -> Result<(), DomainError> {
        self.container.delete_use_case().execute(repository_id).await?;
        self.watches.remove(repository_id);
        Ok(())
    }

    /// Exact (then qualified-suffix, then substring) symbol name lookup,
    /// tiered per spec §4.7.
    pub async fn symbol_lookup(
        &self,
        name: &str,
        repository_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let generation = self.current_generation(repository_id).await?;
        let fingerprint = Fingerprint::new(repository_id.unwrap_or("*"), name, "symbol_lookup", generation);

        let symbol_repo = self.container.symbol_repo();
        let name_owned = name.to_string();
        self.cache
            .single_flight(&fingerprint, generation, || async move {
                let candidates = symbol_repo.find_by_name(&name_owned, repository_id, limit).await?;
                let ranked: Vec<SearchResult> = candidates
                    .into_iter()
                    .filter_map(|symbol| {
                        symbol_name_score(symbol.name(), &name_owned)
                            .map(|score| SearchResult::new(symbol.into_chunk(), score))
                    })
                    .collect();
                Ok(ranked)
            })
            .await
    }

    /// Keyword/full-text leg, independent of embeddings. `options` carries
    /// the case-sensitivity, whole-word, regex, path-glob, and pagination
    /// refinements spec'd for this search mode.
    pub async fn content_search(
        &self,
        query: &str,
        repository_id: Option<&str>,
        limit: usize,
        options: ContentSearchOptions,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let generation = self.current_generation(repository_id).await?;
        let fingerprint = Fingerprint::new(repository_id.unwrap_or("*"), query, &options.cache_key(), generation);

        let vector_repo = self.container.vector_repo();
        let query = query.to_string();
        let repository_id_owned = repository_id.map(String::from);
        self.cache
            .single_flight(&fingerprint, generation, || async move {
                let mut search_query = SearchQuery::new(&query)
                    .with_limit(limit)
                    .with_content_options(options);
                if let Some(id) = repository_id_owned {
                    search_query = search_query.with_repositories(vec![id]);
                }
                let terms: Vec<&str> = if search_query.content_options().regex {
                    vec![query.as_str()]
                } else {
                    query.split_whitespace().collect()
                };
                vector_repo.search_text(&terms, &search_query).await
            })
            .await
    }

    /// Symbol-name candidates filtered by edit distance, capped by
    /// `fuzzy_candidate_cap` before the rerank.
    pub async fn fuzzy_symbol(
        &self,
        name: &str,
        repository_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let generation = self.current_generation(repository_id).await?;
        let fingerprint = Fingerprint::new(repository_id.unwrap_or("*"), name, "fuzzy_symbol", generation);

        let symbol_repo = self.container.symbol_repo();
        let cap = self.config.fuzzy_candidate_cap;
        let name = name.to_string();
        self.cache
            .single_flight(&fingerprint, generation, || async move {
                // Prefilter with the FTS trigram index, ranked by relevance, THEN
                // cap to `fuzzy_candidate_cap` — capping before ranking could drop
                // the true closest match in a repository with more symbols than
                // the cap.
                let candidates = symbol_repo.fuzzy_candidates(&name, repository_id, cap).await?;

                let mut scored: Vec<(usize, SearchResult)> = candidates
                    .into_iter()
                    .filter_map(|symbol| {
                        let distance = levenshtein(symbol.name(), &name);
                        let max_len = symbol.name().len().max(name.len()).max(1);
                        if distance * 2 > max_len {
                            return None;
                        }
                        let score = 1.0 - (distance as f32 / max_len as f32);
                        Some((distance, SearchResult::new(symbol.into_chunk(), score)))
                    })
                    .collect();
                scored.sort_by_key(|(distance, _)| *distance);

                Ok(scored.into_iter().take(limit).map(|(_, r)| r).collect())
            })
            .await
    }

    /// Embedding-based semantic search. When `hybrid` is set, the use case
    /// also runs the keyword leg in parallel and RRF-fuses the two rankings
    /// (spec §6). When the embedding provider is unavailable, degrades to a
    /// plain content search and marks `fallback_used` rather than failing
    /// the whole request — the one case where this method doesn't error out
    /// on a disabled/unavailable provider.
    pub async fn semantic_search(
        &self,
        query: &str,
        repository_id: Option<&str>,
        limit: usize,
        hybrid: bool,
    ) -> Result<SemanticSearchResult, DomainError> {
        if !self.config.semantic_enabled {
            if hybrid {
                warn!("semantic search disabled by configuration, falling back to content search");
                let results = self
                    .content_search(query, repository_id, limit, ContentSearchOptions::default())
                    .await?;
                return Ok(SemanticSearchResult { results, fallback_used: true });
            }
            return Err(DomainError::provider_unavailable(
                "semantic search disabled by configuration",
            ));
        }

        let generation = self.current_generation(repository_id).await?;
        let options_key = if hybrid { "semantic_search:hybrid" } else { "semantic_search" };
        let fingerprint = Fingerprint::new(repository_id.unwrap_or("*"), query, options_key, generation);

        let search_use_case = self.container.search_use_case();
        let query_owned = query.to_string();
        let repository_id_owned = repository_id.map(String::from);
        let outcome = self
            .cache
            .single_flight(&fingerprint, generation, || async move {
                let mut search_query = SearchQuery::new(&query_owned).with_limit(limit).with_hybrid(hybrid);
                if let Some(id) = repository_id_owned {
                    search_query = search_query.with_repositories(vec![id]);
                }
                search_use_case.execute(search_query).await
            })
            .await;

        match outcome {
            Ok(results) => Ok(SemanticSearchResult { results, fallback_used: false }),
            Err(e) if e.is_provider_unavailable() => {
                warn!("embedding provider unavailable, falling back to content search: {}", e);
                let results = self
                    .content_search(query, repository_id, limit, ContentSearchOptions::default())
                    .await?;
                Ok(SemanticSearchResult { results, fallback_used: true })
            }
            Err(e) => Err(e),
        }
    }

    /// Callers and callees for a (possibly unqualified) symbol name,
    /// resolving unqualified short names against the cross-repo call graph
    /// before falling back to an exact match (spec's query-time resolution,
    /// `CallGraphUseCase::resolve_symbols`).
    pub async fn references(
        &self,
        qualified_name: &str,
        repository_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<crate::application::SymbolContext, DomainError> {
        let mut query = CallGraphQuery::new();
        if let Some(id) = repository_id {
            query = query.with_repository(id);
        }

        let call_graph = self.container.call_graph_use_case();
        let resolved = call_graph
            .resolve_symbols(qualified_name, &query, Some(1))
            .await?;
        let target = resolved.into_iter().next();
        let symbol = target.as_deref().unwrap_or(qualified_name);

        self.container
            .context_use_case()
            .get_context(symbol, repository_id, limit)
            .await
    }

    /// Repository status: single repo if `repository_id` is given, every
    /// registered repository otherwise.
    pub async fn get_status(&self, repository_id: Option<&str>) -> Result<Vec<Repository>, DomainError> {
        match repository_id {
            Some(id) => {
                let repo = self
                    .container
                    .list_use_case()
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| DomainError::not_found(format!("repository not found: {}", id)))?;
                Ok(vec![repo])
            }
            None => self.container.list_use_case().execute().await,
        }
    }

    /// Force a full or incremental reindex of one repository, bypassing
    /// the debounced change pipeline.
    pub async fn reindex(&self, repository_id: &str, force: bool) -> Result<Repository, DomainError> {
        let repo = self
            .container
            .list_use_case()
            .get_by_id(repository_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("repository not found: {}", repository_id)))?;

        let updated = self
            .container
            .index_use_case()
            .execute(
                repo.path(),
                Some(repo.name()),
                repo.store(),
                repo.namespace().map(String::from),
                force,
            )
            .await?;

        // Cache reads compare against the repository's `index_generation`,
        // which `execute` above just bumped, so the stale entries age out
        // on next read without an explicit purge here.
        Ok(updated)
    }

    async fn current_generation(&self, repository_id: Option<&str>) -> Result<u64, DomainError> {
        match repository_id {
            Some(id) => Ok(self
                .container
                .list_use_case()
                .get_by_id(id)
                .await?
                .map(|r| r.index_generation())
                .unwrap_or(0)),
            None => {
                let repos = self.container.list_use_case().execute().await?;
                Ok(repos.iter().map(|r| r.index_generation()).max().unwrap_or(0))
            }
        }
    }
}

async fn run_job(container: &Arc<Container>, job: &IndexJob) -> Result<(), DomainError> {
    let repo = container
        .list_use_case()
        .get_by_id(&job.repository_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("repository not found: {}", job.repository_id)))?;

    debug!(
        "reindexing {} after {:?} on {}",
        repo.name(),
        job.kind,
        job.relative_path.display()
    );

    container
        .index_use_case()
        .execute(repo.path(), Some(repo.name()), repo.store(), repo.namespace().map(String::from), false)
        .await?;
    Ok(())
}

/// Exact, qualified-suffix, then substring symbol match, returned as a
/// score so results sort by tier without a separate comparator type.
/// Re-scores a row already tiered by `SymbolRepository::find_by_name`'s SQL
/// (exact / qualified-suffix / substring) so results keep the same relative
/// ranking regardless of which store backs the repository.
fn symbol_name_score(symbol: &str, name: &str) -> Option<f32> {
    if symbol == name {
        Some(1.0)
    } else if symbol.ends_with(&format!("::{}", name))
        || symbol.ends_with(&format!("#{}", name))
        || symbol.ends_with(&format!(".{}", name))
    {
        Some(0.75)
    } else if symbol.contains(name) {
        Some(0.5)
    } else {
        None
    }
}

/// Classic Wagner-Fischer edit distance over `char`s.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}

/// The debouncer is keyed purely by `PathBuf`; fold the owning repository
/// id into the path so events from two repositories never collide, then
/// split it back apart when draining into the work queue.
fn tag_path(repository_id: &str, path: &std::path::Path) -> PathBuf {
    PathBuf::from(format!("{repository_id}\0{}", path.display()))
}

fn untag_path(tagged: &std::path::Path) -> Option<(String, PathBuf)> {
    let s = tagged.to_string_lossy();
    let (repository_id, relative) = s.split_once('\0')?;
    Some((repository_id.to_string(), PathBuf::from(relative)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_identical_is_zero() {
        assert_eq!(levenshtein("handler", "handler"), 0);
    }

    #[test]
    fn levenshtein_counts_substitution() {
        assert_eq!(levenshtein("handler", "handlers"), 1);
    }

    #[test]
    fn levenshtein_counts_transposition_as_two_edits() {
        assert_eq!(levenshtein("abc", "bac"), 2);
    }

    #[test]
    fn tag_roundtrip() {
        let tagged = tag_path("repo-1", std::path::Path::new("src/lib.rs"));
        let (id, path) = untag_path(&tagged).unwrap();
        assert_eq!(id, "repo-1");
        assert_eq!(path, PathBuf::from("src/lib.rs"));
    }

    #[test]
    fn cache_sizes_defaults_are_sane() {
        let sizes = CacheSizes::default();
        assert!(sizes.l1_entries > 0);
        assert!(!sizes.l3_enabled);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = CoordinatorConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = CoordinatorConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.worker_count, config.worker_count);
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let text = "worker_count = 4\nnonexistent_option = true\n";
        assert!(CoordinatorConfig::from_toml_str(text).is_err());
    }
}
