//! Host Framework Integration
//!
//! Session middleware depends on the [`SessionStore`] trait, not on a concrete
//! backend. [`FileSessionStore`] is the file-backed implementation: opening it
//! creates the storage directory and starts background reaping, and every
//! trait method delegates to the [`RecordStore`].

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::session::Session;
use crate::storage::{RecordStore, ReapScheduler, StoreStats};
use crate::worker::WorkerLauncher;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// The storage capability a session middleware needs.
///
/// `get` has three outcomes: an error, `Some(session)` for a usable session,
/// and `None` when the session is missing-but-tolerated or has expired. The
/// caller treats `None` as "no session".
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Session>>;

    /// Persists `session`, stamping its last access time in place, and returns
    /// the stamped record.
    async fn set(&self, id: &str, session: &mut Session) -> Result<Session>;

    /// Refreshes the stored session's cookie and last access time.
    async fn touch(&self, id: &str, session: &Session) -> Result<Session>;

    async fn destroy(&self, id: &str) -> Result<()>;

    async fn length(&self) -> Result<usize>;

    async fn clear(&self) -> Result<()>;

    /// Names of the stored session files.
    async fn list(&self) -> Result<Vec<String>>;

    /// Returns true if the session is missing or stale.
    async fn expired(&self, id: &str) -> Result<bool>;
}

/// A session store keeping one file per session.
#[derive(Debug)]
pub struct FileSessionStore {
    records: RecordStore,
    scheduler: Option<ReapScheduler>,
}

impl FileSessionStore {
    /// Resolves `config`, creates the storage directory and starts the reap
    /// scheduler.
    ///
    /// Directory creation is synchronous. When background reaping is enabled
    /// this must be called from within a Tokio runtime.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let records = RecordStore::new(config.resolve()?);
        records.ensure_dir()?;
        let scheduler = Self::schedule(&records, None)?;
        Ok(Self { records, scheduler })
    }

    /// Like [`open`](Self::open), but reap workers are started through `launcher`.
    pub fn open_with_launcher(
        config: StoreConfig,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Result<Self> {
        let records = RecordStore::new(config.resolve()?);
        records.ensure_dir()?;
        let scheduler = Self::schedule(&records, Some(launcher))?;
        Ok(Self { records, scheduler })
    }

    fn schedule(
        records: &RecordStore,
        launcher: Option<Arc<dyn WorkerLauncher>>,
    ) -> Result<Option<ReapScheduler>> {
        if records.config().reap_interval().is_none() {
            return Ok(None);
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(StoreError::Config(
                "background reaping requires a Tokio runtime".to_string(),
            ));
        }

        let scheduler = match launcher {
            Some(launcher) => ReapScheduler::start_with_launcher(records.clone(), launcher),
            None => ReapScheduler::start(records.clone()),
        };
        if scheduler.is_some() && records.config().logging() {
            info!(path = %records.config().path().display(), "Session file store opened");
        }
        Ok(scheduler)
    }

    /// The underlying record store.
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn stats(&self) -> StoreStats {
        self.records.stats()
    }

    /// Returns true while background reaping is active.
    pub fn is_reaping(&self) -> bool {
        self.scheduler.as_ref().is_some_and(ReapScheduler::is_running)
    }

    /// Stops background reaping. Safe to call repeatedly.
    pub fn stop_reaping(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop();
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>> {
        self.records.get(id).await
    }

    async fn set(&self, id: &str, session: &mut Session) -> Result<Session> {
        self.records.set(id, session).await
    }

    async fn touch(&self, id: &str, session: &Session) -> Result<Session> {
        self.records.touch(id, session).await
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.records.destroy(id).await
    }

    async fn length(&self) -> Result<usize> {
        self.records.length().await
    }

    async fn clear(&self) -> Result<()> {
        self.records.clear().await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.records.list().await
    }

    async fn expired(&self, id: &str) -> Result<bool> {
        self.records.expired(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_directory_and_schedules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sessions");

        let store = FileSessionStore::open(
            StoreConfig::new()
                .with_path(&path)
                .with_logging(false),
        )
        .unwrap();

        assert!(path.is_dir());
        assert!(store.is_reaping());
        assert_eq!(store.length().await.unwrap(), 0);

        store.stop_reaping();
        store.stop_reaping();
        assert!(!store.is_reaping());
    }

    #[tokio::test]
    async fn test_open_without_reaping() {
        let dir = TempDir::new().unwrap();
        let store =
            FileSessionStore::open(StoreConfig::new().with_path(dir.path()).without_reaping())
                .unwrap();
        assert!(!store.is_reaping());
    }

    #[test]
    fn test_open_outside_runtime_requires_disabled_reaping() {
        let dir = TempDir::new().unwrap();

        let result = FileSessionStore::open(StoreConfig::new().with_path(dir.path()));
        assert!(matches!(result, Err(StoreError::Config(_))));

        let store =
            FileSessionStore::open(StoreConfig::new().with_path(dir.path()).without_reaping());
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_trait_object_round_trip() {
        let dir = TempDir::new().unwrap();
        let store: Box<dyn SessionStore> = Box::new(
            FileSessionStore::open(
                StoreConfig::new()
                    .with_path(dir.path())
                    .without_reaping()
                    .with_logging(false),
            )
            .unwrap(),
        );

        let mut session = Session::new()
            .with("views", 1)
            .with("cookie", json!({ "originalMaxAge": 60000 }));
        store.set("abc", &mut session).await.unwrap();

        assert_eq!(store.get("abc").await.unwrap(), Some(session));
        assert!(!store.expired("abc").await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec!["abc.json"]);

        store.destroy("abc").await.unwrap();
        assert_eq!(store.length().await.unwrap(), 0);
    }
}
