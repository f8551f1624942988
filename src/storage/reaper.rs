//! Expired Session Reaper
//!
//! A reap pass lists the session directory and runs "read, and destroy if
//! expired" for every session file. Lazy expiry (a `get` returning `None`)
//! never deletes anything, so without reaping a session that is never
//! requested again would stay on disk forever.
//!
//! ## Bounded Concurrency
//!
//! ```text
//!  files ──> [ task queue ] ──> Semaphore(max_concurrent) ──> JoinSet
//!                                      │
//!                                      ▼
//!                         get ─> None? ─> destroy
//! ```
//!
//! Every task is spawned up front but waits for a permit before touching the
//! filesystem, so at most `reap_max_concurrent` files are in flight. A failing
//! task never cancels the others. The pass finishes once every spawned task
//! has been joined, and all per-item failures are returned together.

use crate::error::{Result, StoreError};
use crate::storage::engine::RecordStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Outcome of a successful reap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Session files examined
    pub scanned: usize,
    /// Expired files removed
    pub removed: usize,
    /// Live sessions left in place
    pub kept: usize,
}

/// Runs one reap pass over the store's directory.
///
/// Fails straight away if the directory cannot be listed. Otherwise every
/// session file is processed and, if any item failed, the failures are
/// returned as [`StoreError::Aggregate`].
pub async fn reap(store: &RecordStore) -> Result<ReapReport> {
    let files = store.list().await?;
    if files.is_empty() {
        return Ok(ReapReport::default());
    }

    if store.config().logging() {
        info!(files = files.len(), "Deleting expired sessions");
    }

    let layout = store.config().layout();
    let permits = Arc::new(Semaphore::new(store.config().reap_max_concurrent()));
    let mut tasks = JoinSet::new();

    for file in &files {
        let id = layout.id_for(file);
        if id.is_empty() {
            continue;
        }

        let store = store.clone();
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| StoreError::Config(e.to_string()))?;
            store.destroy_expired(&id).await
        });
    }

    let launched = tasks.len();
    let mut finished = 0;
    let mut report = ReapReport::default();
    let mut errors = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        finished += 1;
        match joined {
            Ok(Ok(true)) => report.removed += 1,
            Ok(Ok(false)) => report.kept += 1,
            Ok(Err(err)) => errors.push(err),
            Err(join_err) => errors.push(StoreError::Task(join_err)),
        }
    }
    debug_assert_eq!(launched, finished);
    report.scanned = finished;

    debug!(
        scanned = report.scanned,
        removed = report.removed,
        failed = errors.len(),
        "Reap pass finished"
    );

    if errors.is_empty() {
        Ok(report)
    } else {
        Err(StoreError::Aggregate(errors))
    }
}
