//! Path-keyed event coalescing for the change pipeline (C6). The watcher
//! emits raw filesystem events as fast as the OS reports them; the
//! debouncer absorbs bursts (editors that write-then-rename, `git checkout`
//! touching hundreds of files at once) into one `IndexJob`-worthy change
//! per path per window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// What kind of filesystem change a path saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// Collapse two events seen for the same path inside one debounce window
/// into the single kind that should drive re-indexing.
///
/// - create, then modify -> still a create (the file didn't exist before
///   the window opened).
/// - delete, then modify -> modify (a delete followed by writes means the
///   path exists again by the time the window closes).
/// - delete, then create -> modify, not create: from the store's point of
///   view the row already existed: row gets upserted either way.
/// - anything else -> the most recent event wins.
fn merge(previous: ChangeKind, next: ChangeKind) -> ChangeKind {
    use ChangeKind::*;
    match (previous, next) {
        (Created, Modified) => Created,
        (Deleted, Modified) => Modified,
        (Deleted, Created) => Modified,
        (_, latest) => latest,
    }
}

struct Pending {
    kind: ChangeKind,
    last_seen: Instant,
}

/// Coalesces per-path change events within a fixed window before they are
/// handed to the work queue as `IndexJob`s.
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record a raw event for `path`, merging it with whatever is already
    /// pending for that path.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind, now: Instant) {
        self.pending
            .entry(path)
            .and_modify(|p| {
                p.kind = merge(p.kind, kind);
                p.last_seen = now;
            })
            .or_insert(Pending {
                kind,
                last_seen: now,
            });
    }

    /// Remove and return every path whose window has elapsed as of `now`.
    /// Paths still inside their window are left pending.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<(PathBuf, ChangeKind)> {
        let window = self.window;
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.last_seen) >= window)
            .map(|(path, _)| path.clone())
            .collect();

        ready
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|p| (path, p.kind)))
            .collect()
    }

    /// True if no path currently has an un-elapsed pending change.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop any pending state for a path, e.g. after it has been enqueued
    /// out-of-band (force reindex).
    pub fn forget(&mut self, path: &Path) {
        self.pending.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_modify_stays_create() {
        assert_eq!(
            merge(ChangeKind::Created, ChangeKind::Modified),
            ChangeKind::Created
        );
    }

    #[test]
    fn delete_then_modify_becomes_modify() {
        assert_eq!(
            merge(ChangeKind::Deleted, ChangeKind::Modified),
            ChangeKind::Modified
        );
    }

    #[test]
    fn delete_then_create_becomes_modify() {
        assert_eq!(
            merge(ChangeKind::Deleted, ChangeKind::Created),
            ChangeKind::Modified
        );
    }

    #[test]
    fn unrelated_sequence_takes_latest() {
        assert_eq!(
            merge(ChangeKind::Modified, ChangeKind::Deleted),
            ChangeKind::Deleted
        );
    }

    #[test]
    fn drain_ready_respects_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        let t0 = Instant::now();
        debouncer.record(PathBuf::from("a.rs"), ChangeKind::Modified, t0);

        assert!(debouncer.drain_ready(t0).is_empty());

        let later = t0 + Duration::from_millis(600);
        let ready = debouncer.drain_ready(later);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, PathBuf::from("a.rs"));
        assert_eq!(ready[0].1, ChangeKind::Modified);
        assert!(debouncer.is_empty());
    }

    #[test]
    fn repeated_events_extend_the_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        let t0 = Instant::now();
        debouncer.record(PathBuf::from("a.rs"), ChangeKind::Created, t0);

        let t1 = t0 + Duration::from_millis(400);
        debouncer.record(PathBuf::from("a.rs"), ChangeKind::Modified, t1);

        // Window measured from t0 would have elapsed by t0+500ms, but the
        // second event reset last_seen to t1, so it should still be pending.
        assert!(debouncer.drain_ready(t0 + Duration::from_millis(500)).is_empty());

        let ready = debouncer.drain_ready(t1 + Duration::from_millis(500));
        assert_eq!(ready[0].1, ChangeKind::Created);
    }
}
