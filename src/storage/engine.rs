//! File-Backed Record Store
//!
//! This module implements the per-record operations of the session store.
//! Every session lives in its own file; there is no in-memory cache, so the
//! filesystem is the only source of truth.
//!
//! ## Read Path
//!
//! ```text
//! read file ──(fail)──> retry with backoff ──(exhausted)──> fallback session | error
//!     │
//!     ▼
//! decrypt? ──(fail)──> cipher error (file kept)
//!     │
//!     ▼
//! decode ──(fail)──> delete file, then decode error
//!     │
//!     ▼
//! expired? ──(yes)──> Ok(None)
//!     │
//!     ▼
//! Ok(Some(session))
//! ```
//!
//! ## Write Path
//!
//! Writes stamp `__lastAccess`, encode, optionally encrypt, and land on disk
//! through a temp file in the same directory followed by a rename. A concurrent
//! reader sees either the old file or the new one, never a partial write.
//!
//! ## Concurrency
//!
//! Operations on the same id are not serialized. Two writers race and the last
//! rename wins. `touch` reads then writes without holding anything in between,
//! so a `destroy` landing between the two steps is undone by the write.

use crate::config::ResolvedConfig;
use crate::error::{Result, StoreError};
use crate::session::Session;
use crate::storage::expiry::is_expired;
use bytes::Bytes;
use futures::future::join_all;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace, warn};

/// Distinguishes temp files of concurrent writes within one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Operation counters shared by all clones of a [`RecordStore`].
#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    corrupt: AtomicU64,
    reaped: AtomicU64,
}

/// A snapshot of store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total `get` calls
    pub reads: u64,
    /// Total successful writes
    pub writes: u64,
    /// Total session files removed by `destroy` or `clear`
    pub deletes: u64,
    /// Corrupt files removed on read
    pub corrupt: u64,
    /// Expired files removed by reaping
    pub reaped: u64,
}

/// The session-file storage engine.
///
/// Cheap to clone: clones share the resolved configuration and the counters.
///
/// # Example
///
/// ```no_run
/// use session_file_store::{RecordStore, Session, StoreConfig};
///
/// # async fn demo() -> session_file_store::Result<()> {
/// let store = RecordStore::new(StoreConfig::new().with_path("./sessions").resolve()?);
///
/// let mut session = Session::new().with("views", 1);
/// store.set("abc", &mut session).await?;
///
/// let loaded = store.get("abc").await?;
/// assert_eq!(loaded.and_then(|s| s.get("views").cloned()), Some(1.into()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RecordStore {
    config: Arc<ResolvedConfig>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("path", &self.config.path())
            .field("ttl", &self.config.ttl())
            .field("stats", &self.stats())
            .finish()
    }
}

impl RecordStore {
    /// Creates a store over an already resolved configuration.
    ///
    /// This does not touch the filesystem. See
    /// [`FileSessionStore::open`](crate::FileSessionStore::open) for the variant
    /// that creates the directory and starts background reaping.
    pub fn new(config: ResolvedConfig) -> Self {
        Self {
            config: Arc::new(config),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Path of the file backing session `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.config.layout().path_for(id)
    }

    /// Synchronously creates the storage directory if it is missing.
    pub fn ensure_dir(&self) -> Result<()> {
        let dir = self.config.path();
        std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))
    }

    /// Reads session `id`.
    ///
    /// Returns `Ok(None)` when the stored session has expired, `Ok(Some(_))`
    /// for a live session, and an error otherwise. A missing file exhausts the
    /// retries like any other read failure; when a fallback factory is
    /// configured its session is returned instead of that error.
    pub async fn get(&self, id: &str) -> Result<Option<Session>> {
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        let path = self.path_for(id);

        let raw = match self.read_with_retry(&path).await {
            Ok(raw) => raw,
            Err(err) => {
                if let Some(fallback) = self.config.fallback_session() {
                    debug!(id, error = %err, "Read failed, using fallback session");
                    let mut session = (**fallback)(id);
                    session.stamp_last_access();
                    return Ok(Some(session));
                }
                return Err(err);
            }
        };

        let plaintext = match self.config.cipher() {
            Some(cipher) => cipher.decrypt(&raw)?,
            None => raw,
        };

        let session = match self.config.codec().decode(&plaintext) {
            Ok(session) => session,
            Err(source) => {
                self.counters.corrupt.fetch_add(1, Ordering::Relaxed);
                warn!(path = %path.display(), error = %source, "Removing corrupt session file");
                remove_if_exists(&path)
                    .await
                    .map_err(|e| StoreError::io(&path, e))?;
                return Err(StoreError::Decode { path, source });
            }
        };

        if is_expired(Some(&session), self.config.ttl()) {
            Ok(None)
        } else {
            Ok(Some(session))
        }
    }

    /// Writes `session` under `id`.
    ///
    /// The caller's record is stamped with the current time before it is
    /// encoded, so after a successful call `session.last_access()` reflects
    /// what is on disk. Returns the stamped record.
    pub async fn set(&self, id: &str, session: &mut Session) -> Result<Session> {
        session.stamp_last_access();

        let encoded = self
            .config
            .codec()
            .encode(session)
            .map_err(StoreError::Encode)?;
        let payload = match self.config.cipher() {
            Some(cipher) => cipher.encrypt(&encoded)?,
            None => encoded,
        };

        let path = self.path_for(id);
        write_atomic(&path, &payload)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        trace!(id, bytes = payload.len(), "Session written");
        Ok(session.clone())
    }

    /// Refreshes session `id`, replacing only its cookie.
    ///
    /// Reads the stored record (read errors propagate), starts from an empty
    /// record if it has expired, overlays the caller's `cookie` and writes the
    /// result back. Returns the record as written.
    pub async fn touch(&self, id: &str, session: &Session) -> Result<Session> {
        let mut stored = self.get(id).await?.unwrap_or_default();

        if let Some(cookie) = session.cookie() {
            stored.set_cookie(cookie.clone());
        }

        self.set(id, &mut stored).await
    }

    /// Deletes session `id`. Deleting a missing session succeeds.
    pub async fn destroy(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        if remove_if_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?
        {
            self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Names of all session files in the storage directory, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let dir = self.config.path();
        let list_err = |source| StoreError::ListDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = fs::read_dir(dir).await.map_err(list_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            if let Some(name) = entry.file_name().to_str() {
                if self.config.layout().matches(name) {
                    files.push(name.to_string());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Number of session files in the storage directory.
    pub async fn length(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }

    /// Deletes every session file.
    ///
    /// All deletions are attempted even if some fail; the failures are returned
    /// together as [`StoreError::Aggregate`]. Files that vanish concurrently
    /// count as deleted.
    pub async fn clear(&self) -> Result<()> {
        let files = self.list().await?;
        let dir = self.config.path();

        let results = join_all(files.iter().map(|name| {
            let path = dir.join(name);
            async move { remove_if_exists(&path).await.map_err(|e| StoreError::io(&path, e)) }
        }))
        .await;

        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(true) => {
                    self.counters.deletes.fetch_add(1, Ordering::Relaxed);
                }
                Ok(false) => {}
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            debug!(removed = files.len(), "Cleared session directory");
            Ok(())
        } else {
            Err(StoreError::Aggregate(errors))
        }
    }

    /// Returns true if session `id` is missing or stale.
    pub async fn expired(&self, id: &str) -> Result<bool> {
        let session = self.get(id).await?;
        Ok(is_expired(session.as_ref(), self.config.ttl()))
    }

    /// Deletes session `id` if it has expired.
    ///
    /// Returns true if a file was removed. A live session is left alone: during
    /// a reap it means a writer refreshed the session after it was listed.
    pub async fn destroy_expired(&self, id: &str) -> Result<bool> {
        if !self.expired(id).await? {
            trace!(id, "Session still live, skipping");
            return Ok(false);
        }

        let path = self.path_for(id);
        let removed = remove_if_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        if removed {
            self.counters.reaped.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.counters.reads.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            corrupt: self.counters.corrupt.load(Ordering::Relaxed),
            reaped: self.counters.reaped.load(Ordering::Relaxed),
        }
    }

    async fn read_with_retry(&self, path: &Path) -> Result<Bytes> {
        let retry = self.config.retry();
        let mut attempt = 0;

        loop {
            match fs::read(path).await {
                Ok(data) => return Ok(Bytes::from(data)),
                Err(err) if attempt < retry.retries => {
                    if self.config.logging() {
                        info!(
                            path = %path.display(),
                            attempt,
                            error = %err,
                            "will retry, error on last attempt"
                        );
                    }
                    tokio::time::sleep(retry.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(StoreError::io(path, err)),
            }
        }
    }
}

/// Removes `path`, returning false if it did not exist.
async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Writes `data` to a sibling temp file, syncs it and renames it over `path`.
async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
}
