//! # session-file-store - A Persistent, File-Backed Session Store
//!
//! session-file-store keeps web sessions on disk, one file per session id,
//! with TTL based expiry and background reaping of stale files. It replaces an
//! in-memory session store with durable, crash-safe and optionally encrypted
//! storage.
//!
//! ## Features
//!
//! - **One File Per Session**: `<dir>/<id>.json`, no index, no database
//! - **Atomic Writes**: temp file + rename, readers never see partial files
//! - **Self-Healing Reads**: corrupt files are deleted when encountered
//! - **Retrying Reads**: transient read failures are retried with backoff
//! - **TTL Support**: store-level TTL with per-session cookie overrides
//! - **Background Reaping**: bounded-concurrency sweeps, in-process or in a
//!   separate worker process
//! - **At-Rest Encryption**: AES-256-GCM when a secret is configured
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          session-file-store                             │
//! │                                                                         │
//! │  ┌─────────────┐    ┌──────────────────┐    ┌──────────────────────┐    │
//! │  │ StoreConfig │───>│  ResolvedConfig  │───>│   FileSessionStore   │    │
//! │  │  (options)  │    │ layout + cipher  │    │ (SessionStore trait) │    │
//! │  └─────────────┘    └──────────────────┘    └──────────┬───────────┘    │
//! │                                                        │                │
//! │                                                        ▼                │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │   Codec /   │<───│                RecordStore                   │    │
//! │  │   Cipher    │    │  get · set · touch · destroy · list · clear  │    │
//! │  └─────────────┘    └──────────────────────────────────────────────┘    │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │     ReapScheduler ──> reap() | reap worker      │ │
//! │                     │            (Background Tokio Task)              │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use session_file_store::{FileSessionStore, Session, SessionStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> session_file_store::Result<()> {
//!     let store = FileSessionStore::open(
//!         StoreConfig::new()
//!             .with_path("./sessions")
//!             .with_ttl(3600)
//!             .with_reap_interval(600),
//!     )?;
//!
//!     let mut session = Session::new().with("views", 1);
//!     store.set("abc", &mut session).await?;
//!
//!     match store.get("abc").await? {
//!         Some(session) => println!("views = {:?}", session.get("views")),
//!         None => println!("session expired"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`config`]: store options, defaults and resolution
//! - [`codec`]: file layout, serialization and encryption
//! - [`storage`]: record store, expiry policy, reaper and scheduler
//! - [`worker`]: the out-of-process reap worker
//! - [`store`]: the [`SessionStore`] trait and its file-backed implementation

pub mod codec;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod store;
pub mod worker;

// Re-export commonly used types for convenience
pub use codec::{Cipher, CipherConfig, Codec, FileLayout, JsonCodec};
pub use config::{ResolvedConfig, RetryPolicy, StoreConfig};
pub use error::{Result, StoreError};
pub use session::Session;
pub use storage::{is_expired, reap, ReapReport, ReapScheduler, RecordStore, StoreStats};
pub use store::{FileSessionStore, SessionStore};
pub use worker::{ProcessLauncher, WorkerArgs, WorkerLauncher};

/// Version of session-file-store
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
