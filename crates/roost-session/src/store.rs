//! Durable key-value storage for the persisted session.
//!
//! Browsers have local storage; native shells have a data directory. The
//! session manager only needs three calls, so that is all
//! [`KeyValueStore`] asks for. Every call is a suspension point.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

/// A string-to-string durable store.
///
/// ## Why strings?
///
/// The store doesn't know what it keeps. The session manager serializes
/// its record to JSON before writing and decodes it after reading, so a
/// store never needs serde, and a record written by one build can be read
/// by the next as long as the JSON shape holds.
///
/// ## Trait bounds explained
///
/// - `Send + Sync + 'static` → the manager keeps its store behind an
///   `Arc` for its whole lifetime and may be used from any runtime thread.
/// - The returned futures are `Send` → a login or logout can be awaited
///   inside a spawned task.
/// - `io::Result` → both implementations here are backed by something that
///   fails with `io::Error` (the file system) or never fails (memory), and
///   the manager folds it into `SessionError::Storage`.
///
/// Implementations use plain `async fn` in the `impl` block; the desugared
/// `impl Future + Send` in the trait is only there so the `Send` bound is
/// part of the contract.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Reads a value. A missing key is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> impl Future<Output = io::Result<Option<String>>> + Send;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = io::Result<()>> + Send;

    /// Deletes a value. Deleting a missing key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = io::Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A store that lives as long as the process. Counts writes and removals
/// so tests can check side effects.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
    removals: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `remove` calls so far.
    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.lock().await.remove(key);
        self.removals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// One file per key under a directory: `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so
/// a crash mid-write leaves either the old value or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key {key:?}"),
            ));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> io::Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, value).await?;
        tokio::fs::rename(&staging, &path).await
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
