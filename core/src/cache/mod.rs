//! Forerunner cache: candidate lists prefetched per working directory
//!
//! An entry is written once and never changed. Small results stay in memory
//! and are piped to the worker; large ones are spilled to a temp file the
//! worker reads with `--input`. Either way the first lines are kept in
//! memory so the empty query is answered without touching the disk.

pub mod enumeration;

pub use enumeration::{find_git_root, is_git_repo, walk_files, Enumeration};

use crate::error::PrefetchError;
use crate::job::JobInput;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Where a cached candidate list lives
#[derive(Debug)]
enum CachedSource {
    InMemory(Arc<Vec<String>>),
    TempFile {
        /// Removed from disk when the entry is dropped
        path: TempPath,
        head: Vec<String>,
    },
}

/// A prefetched candidate list for one working directory
#[derive(Debug)]
pub struct CacheEntry {
    working_dir: PathBuf,
    total: usize,
    source: CachedSource,
    created_at: Instant,
}

impl CacheEntry {
    /// An entry held entirely in memory
    pub fn in_memory(working_dir: impl Into<PathBuf>, lines: Vec<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            total: lines.len(),
            source: CachedSource::InMemory(Arc::new(lines)),
            created_at: Instant::now(),
        }
    }

    /// Store `lines`, spilling them to a temp file past `threshold` lines.
    ///
    /// Blocking; writes to disk for large inputs.
    pub fn store(
        working_dir: impl Into<PathBuf>,
        lines: Vec<String>,
        threshold: usize,
        head_len: usize,
    ) -> std::io::Result<Self> {
        let working_dir = working_dir.into();
        if lines.len() <= threshold {
            return Ok(Self::in_memory(working_dir, lines));
        }

        let mut file = tempfile::Builder::new()
            .prefix("narrow-forerunner-")
            .suffix(".txt")
            .tempfile()?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            for line in &lines {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        let total = lines.len();
        let mut head = lines;
        head.truncate(head_len);

        Ok(Self {
            working_dir,
            total,
            source: CachedSource::TempFile {
                path: file.into_temp_path(),
                head,
            },
            created_at: Instant::now(),
        })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Number of cached candidates
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.source, CachedSource::InMemory(_))
    }

    /// The temp file backing this entry, if spilled
    pub fn tempfile(&self) -> Option<&Path> {
        match &self.source {
            CachedSource::TempFile { path, .. } => Some(&**path),
            CachedSource::InMemory(_) => None,
        }
    }

    /// The first `limit` cached lines
    pub fn head(&self, limit: usize) -> Vec<String> {
        let lines: &[String] = match &self.source {
            CachedSource::InMemory(lines) => lines,
            CachedSource::TempFile { head, .. } => head,
        };
        lines.iter().take(limit).cloned().collect()
    }

    /// How a worker filtering this entry gets its candidates
    pub fn job_input(&self) -> JobInput<'_> {
        match &self.source {
            CachedSource::InMemory(_) => JobInput::Stdin,
            CachedSource::TempFile { path, .. } => JobInput::TempFile(&**path),
        }
    }

    /// Lines piped to a worker filtering this entry
    pub fn stdin(&self) -> Option<Arc<Vec<String>>> {
        match &self.source {
            CachedSource::InMemory(lines) => Some(lines.clone()),
            CachedSource::TempFile { .. } => None,
        }
    }
}

/// Result of asking for a prefetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchStatus {
    /// A background enumeration was started
    Started,
    /// An enumeration for this directory is already running
    InFlight,
    /// An entry already exists
    Cached,
}

enum Slot {
    Pending { ticket: u64, task: AbortHandle },
    Ready(Arc<CacheEntry>),
}

/// Map of working directory to cache entry, shared by all jobs of a host.
///
/// Each directory holds at most one slot; a second prefetch of the same
/// directory is a no-op.
#[derive(Clone, Default)]
pub struct ForerunnerCache {
    slots: Arc<Mutex<HashMap<PathBuf, Slot>>>,
    tickets: Arc<AtomicU64>,
}

impl ForerunnerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ready entry for `dir`
    pub fn get(&self, dir: &Path) -> Option<Arc<CacheEntry>> {
        match self.slots.lock().get(dir) {
            Some(Slot::Ready(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Whether an enumeration for `dir` is running
    pub fn is_pending(&self, dir: &Path) -> bool {
        matches!(self.slots.lock().get(dir), Some(Slot::Pending { .. }))
    }

    /// Number of ready entries
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Put a ready entry in place, replacing whatever `dir` held
    pub fn insert(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        let previous = self
            .slots
            .lock()
            .insert(entry.working_dir().to_path_buf(), Slot::Ready(entry.clone()));
        if let Some(Slot::Pending { task, .. }) = previous {
            task.abort();
        }
        entry
    }

    /// Warm `dir` in the background unless it is cached or being cached.
    ///
    /// Results longer than `threshold` lines are spilled to a temp file,
    /// keeping `head_len` lines in memory. Failures leave no entry behind
    /// and are only logged.
    pub fn prefetch(
        &self,
        dir: PathBuf,
        enumeration: Enumeration,
        threshold: usize,
        head_len: usize,
    ) -> PrefetchStatus {
        let mut slots = self.slots.lock();
        match slots.get(&dir) {
            Some(Slot::Ready(_)) => return PrefetchStatus::Cached,
            Some(Slot::Pending { .. }) => return PrefetchStatus::InFlight,
            None => {}
        }

        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let cache = self.clone();
        let task_dir = dir.clone();
        let task = tokio::spawn(async move {
            let started = Instant::now();
            match load(&task_dir, &enumeration, threshold, head_len).await {
                Ok(entry) => {
                    debug!(
                        working_dir = %task_dir.display(),
                        total = entry.total(),
                        in_memory = entry.is_in_memory(),
                        elapsed = ?started.elapsed(),
                        "forerunner finished"
                    );
                    cache.complete(&task_dir, ticket, entry);
                }
                Err(err) => {
                    warn!(working_dir = %task_dir.display(), %err, "forerunner failed");
                    cache.abandon(&task_dir, ticket);
                }
            }
        });

        slots.insert(
            dir,
            Slot::Pending {
                ticket,
                task: task.abort_handle(),
            },
        );
        PrefetchStatus::Started
    }

    /// Drop the entry or running prefetch for `dir`
    pub fn invalidate(&self, dir: &Path) -> bool {
        match self.slots.lock().remove(dir) {
            Some(Slot::Pending { task, .. }) => {
                task.abort();
                true
            }
            Some(Slot::Ready(_)) => true,
            None => false,
        }
    }

    /// Drop every entry and abort every running prefetch
    pub fn clear(&self) {
        for (_, slot) in self.slots.lock().drain() {
            if let Slot::Pending { task, .. } = slot {
                task.abort();
            }
        }
    }

    fn complete(&self, dir: &Path, ticket: u64, entry: CacheEntry) {
        let mut slots = self.slots.lock();
        if matches!(slots.get(dir), Some(Slot::Pending { ticket: t, .. }) if *t == ticket) {
            slots.insert(dir.to_path_buf(), Slot::Ready(Arc::new(entry)));
        } else {
            debug!(working_dir = %dir.display(), "discarding superseded forerunner result");
        }
    }

    fn abandon(&self, dir: &Path, ticket: u64) {
        let mut slots = self.slots.lock();
        if matches!(slots.get(dir), Some(Slot::Pending { ticket: t, .. }) if *t == ticket) {
            slots.remove(dir);
        }
    }
}

/// Enumerate `dir` and build its entry
pub async fn load(
    dir: &Path,
    enumeration: &Enumeration,
    threshold: usize,
    head_len: usize,
) -> Result<CacheEntry, PrefetchError> {
    let lines = enumeration.run(dir).await?;
    let owned_dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        CacheEntry::store(owned_dir.clone(), lines, threshold, head_len)
            .map_err(|source| PrefetchError::Store { dir: owned_dir, source })
    })
    .await
    .map_err(|_| PrefetchError::Cancelled {
        dir: dir.to_path_buf(),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("file{i}.rs")).collect()
    }

    async fn wait_until_settled(cache: &ForerunnerCache, dir: &Path) {
        while cache.is_pending(dir) {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn test_small_result_stays_in_memory() {
        let entry = CacheEntry::store("/repo", lines(3), 10, 2).unwrap();

        assert!(entry.is_in_memory());
        assert_eq!(entry.total(), 3);
        assert_eq!(entry.head(2), vec!["file0.rs".to_string(), "file1.rs".to_string()]);
        assert_eq!(entry.job_input(), JobInput::Stdin);
        assert_eq!(entry.stdin().map(|l| l.len()), Some(3));
    }

    #[test]
    fn test_large_result_spills_to_tempfile() {
        let entry = CacheEntry::store("/repo", lines(50), 10, 5).unwrap();

        let path = entry.tempfile().unwrap().to_path_buf();
        assert!(!entry.is_in_memory());
        assert_eq!(entry.total(), 50);
        assert_eq!(entry.head(100).len(), 5);
        assert!(entry.stdin().is_none());
        assert_eq!(entry.job_input(), JobInput::TempFile(&path));

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 50);
        assert_eq!(written.lines().last(), Some("file49.rs"));

        drop(entry);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_prefetch_twice_keeps_one_entry() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "").unwrap();
        fs::write(dir.path().join("b.rs"), "").unwrap();
        let cache = ForerunnerCache::new();
        let first = cache.prefetch(dir.path().to_path_buf(), Enumeration::Walk, 10, 10);
        let second = cache.prefetch(dir.path().to_path_buf(), Enumeration::Walk, 10, 10);
        assert_eq!(first, PrefetchStatus::Started);
        assert_eq!(second, PrefetchStatus::InFlight);

        wait_until_settled(&cache, dir.path()).await;

        let entry = cache.get(dir.path()).unwrap();
        assert_eq!(entry.head(10), vec!["a.rs".to_string(), "b.rs".to_string()]);
        assert_eq!(cache.len(), 1);

        let third = cache.prefetch(dir.path().to_path_buf(), Enumeration::Walk, 10, 10);
        assert_eq!(third, PrefetchStatus::Cached);
        assert!(Arc::ptr_eq(&entry, &cache.get(dir.path()).unwrap()));
    }

    #[tokio::test]
    async fn test_failed_prefetch_leaves_no_entry() {
        let dir = tempdir().unwrap();
        let cache = ForerunnerCache::new();

        let status = cache.prefetch(
            dir.path().to_path_buf(),
            Enumeration::Shell("exit 3".to_string()),
            30_000,
            200,
        );
        assert_eq!(status, PrefetchStatus::Started);

        wait_until_settled(&cache, dir.path()).await;

        assert!(cache.get(dir.path()).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_discards_running_prefetch() {
        let dir = tempdir().unwrap();
        let cache = ForerunnerCache::new();

        cache.prefetch(
            dir.path().to_path_buf(),
            Enumeration::Shell("sleep 5; echo late".to_string()),
            30_000,
            200,
        );
        assert!(cache.is_pending(dir.path()));

        assert!(cache.invalidate(dir.path()));
        assert!(!cache.is_pending(dir.path()));
        assert!(cache.get(dir.path()).is_none());
        assert!(!cache.invalidate(dir.path()));
    }

    #[test]
    fn test_insert_replaces_and_clear_empties() {
        let cache = ForerunnerCache::new();
        cache.insert(CacheEntry::in_memory("/repo", lines(2)));
        cache.insert(CacheEntry::in_memory("/repo", lines(4)));
        cache.insert(CacheEntry::in_memory("/other", lines(1)));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(Path::new("/repo")).unwrap().total(), 4);

        cache.clear();
        assert!(cache.is_empty());
    }
}
