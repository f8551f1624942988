//! Storage Engine Module
//!
//! This module provides the core storage functionality of the session store:
//! per-record file operations, the expiry policy, the reaper and the
//! background scheduler that drives it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RecordStore                            │
//! │   get / set / touch / destroy / list / length / clear       │
//! │                         │                                   │
//! │          ┌──────────────┼──────────────┐                    │
//! │          ▼              ▼              ▼                    │
//! │     FileLayout     Codec/Cipher    is_expired               │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │          reap()           │
//!              │ (Semaphore-bounded tasks) │
//!              └─────────────┬─────────────┘
//!                            ▲
//!              ┌─────────────┴─────────────┐
//!              │      ReapScheduler        │
//!              │  (Background Tokio Task)  │──> reap worker process
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use session_file_store::storage::{reap, RecordStore};
//! use session_file_store::StoreConfig;
//!
//! # async fn demo() -> session_file_store::Result<()> {
//! let store = RecordStore::new(StoreConfig::new().with_ttl(60).resolve()?);
//! store.ensure_dir()?;
//!
//! let report = reap(&store).await?;
//! println!("removed {} expired sessions", report.removed);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod expiry;
pub mod reaper;
pub mod scheduler;

// Re-export commonly used types
pub use engine::{RecordStore, StoreStats};
pub use expiry::{effective_ttl_ms, is_expired, is_expired_at};
pub use reaper::{reap, ReapReport};
pub use scheduler::ReapScheduler;
