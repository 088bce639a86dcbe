//! Filesystem event source for the change pipeline (C6). Wraps
//! `notify::RecommendedWatcher` (OS-native backend; `notify` falls back to
//! polling on its own when the native backend isn't available) and
//! reuses the same `ignore`-crate glob matching `IndexRepositoryUseCase`
//! already applies to directory walks, now applied per-event instead of
//! per-walk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use super::debouncer::ChangeKind;
use crate::domain::DomainError;

/// One filtered, classified filesystem change ready for the debouncer.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Build a matcher honoring `.gitignore`/`.git/info/exclude` under `root`
/// plus any extra glob patterns from `CoordinatorConfig::ignore_globs`.
pub fn build_ignore_matcher(root: &Path, extra_globs: &[String]) -> Result<Gitignore, DomainError> {
    let mut builder = GitignoreBuilder::new(root);
    builder.add(root.join(".gitignore"));
    for glob in extra_globs {
        builder
            .add_line(None, glob)
            .map_err(|e| DomainError::invalid_input(format!("bad ignore glob '{}': {}", glob, e)))?;
    }
    builder
        .build()
        .map_err(|e| DomainError::internal(format!("failed to build ignore matcher: {}", e)))
}

/// Owns a live OS watch on one repository root. Dropping this stops the
/// watch (the underlying `notify::RecommendedWatcher` unwatches on drop).
pub struct RepoWatcher {
    _watcher: RecommendedWatcher,
}

impl RepoWatcher {
    /// Start watching `root` recursively, pushing filtered `RawEvent`s onto
    /// `tx`. The returned handle must be kept alive for the watch to stay
    /// active.
    pub fn spawn(
        root: PathBuf,
        ignore: Arc<Gitignore>,
        tx: mpsc::UnboundedSender<RawEvent>,
    ) -> Result<Self, DomainError> {
        let root_for_filter = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(e) => e,
                Err(e) => {
                    warn!("watch error under {}: {}", root_for_filter.display(), e);
                    return;
                }
            };
            for raw in classify(&event, &ignore) {
                if tx.send(raw).is_err() {
                    // Receiver dropped (coordinator shutting down); nothing to do.
                    return;
                }
            }
        })
        .map_err(|e| DomainError::internal(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| {
                DomainError::internal(format!("failed to watch {}: {}", root.display(), e))
            })?;

        Ok(Self { _watcher: watcher })
    }
}

/// Translate one `notify::Event` into zero or more filtered `RawEvent`s.
/// A rename event carries both the old and new path; each is classified
/// independently (old path -> Deleted, new path -> Created) so the
/// debouncer's delete-then-create merge rule applies uniformly.
fn keep(path: &Path, kind: ChangeKind, ignore: &Gitignore) -> bool {
    !ignore.matched(path, path.is_dir()).is_ignore() && (path.is_file() || kind == ChangeKind::Deleted)
}

fn classify(event: &Event, ignore: &Gitignore) -> Vec<RawEvent> {
    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
        if let [from, to] = event.paths.as_slice() {
            let mut out = Vec::new();
            if keep(from, ChangeKind::Deleted, ignore) {
                out.push(RawEvent {
                    path: from.clone(),
                    kind: ChangeKind::Deleted,
                });
            }
            if keep(to, ChangeKind::Created, ignore) {
                out.push(RawEvent {
                    path: to.clone(),
                    kind: ChangeKind::Created,
                });
            }
            return out;
        }
    }

    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|path| keep(path, kind, ignore))
        .map(|path| RawEvent {
            path: path.clone(),
            kind,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_ignore_matcher_accepts_extra_globs() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = build_ignore_matcher(dir.path(), &["*.log".to_string()]).unwrap();
        assert!(matcher
            .matched(dir.path().join("debug.log"), false)
            .is_ignore());
        assert!(!matcher
            .matched(dir.path().join("main.rs"), false)
            .is_ignore());
    }
}
