//! Store Configuration
//!
//! [`StoreConfig`] is what users build: every option has a documented default
//! and a `with_*` builder. [`StoreConfig::resolve`] validates it once and
//! produces a [`ResolvedConfig`] with the derived fields every other component
//! consumes:
//!
//! - the storage path, normalized for the host filesystem
//! - the [`FileLayout`] with its compiled file-matching pattern
//! - the cipher, present only when a secret was configured

use crate::codec::{Cipher, CipherConfig, Codec, FileLayout, JsonCodec};
use crate::error::{Result, StoreError};
use crate::session::Session;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default storage directory.
pub const DEFAULT_PATH: &str = "./sessions";

/// Default time-to-live in seconds.
pub const DEFAULT_TTL: u64 = 3600;

/// Default file extension.
pub const DEFAULT_FILE_EXTENSION: &str = ".json";

/// Default reap interval in seconds.
pub const DEFAULT_REAP_INTERVAL: u64 = 3600;

/// Default number of concurrent deletions during a reap.
pub const DEFAULT_REAP_MAX_CONCURRENT: usize = 10;

/// Name of the reap worker binary.
pub const WORKER_BINARY: &str = "session-reap-worker";

/// Produces a replacement session when a read fails terminally.
pub type FallbackSessionFn = Arc<dyn Fn(&str) -> Session + Send + Sync>;

/// Retry policy for session reads.
///
/// Attempt `n` (starting at 0) waits `min(min_timeout * factor^n, max_timeout)`
/// before the next try.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default: 5)
    pub retries: u32,
    /// Exponential growth factor (default: 1)
    pub factor: f64,
    /// Smallest delay between attempts (default: 50ms)
    pub min_timeout: Duration,
    /// Largest delay between attempts (default: 100ms)
    pub max_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            factor: 1.0,
            min_timeout: Duration::from_millis(50),
            max_timeout: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let scaled = self.min_timeout.as_nanos() as f64 * self.factor.powi(attempt as i32);
        if !scaled.is_finite() || scaled >= self.max_timeout.as_nanos() as f64 {
            return self.max_timeout;
        }
        Duration::from_nanos(scaled.max(0.0).round() as u64)
    }
}

/// User-facing store options.
#[derive(Clone)]
pub struct StoreConfig {
    /// Directory holding the session files (default: `./sessions`)
    pub path: PathBuf,
    /// Store-level time-to-live in seconds (default: 3600)
    pub ttl: u64,
    /// Suffix of every session file (default: `.json`)
    pub file_extension: String,
    /// Retry policy for reads
    pub retry: RetryPolicy,
    /// Seconds between reaps; `None` disables background reaping (default: 3600)
    pub reap_interval: Option<u64>,
    /// Maximum concurrent reap tasks (default: 10)
    pub reap_max_concurrent: usize,
    /// Reap in a separate worker process (default: false). Only available with
    /// the built-in codec and cipher, which the worker can rebuild.
    pub reap_async: bool,
    /// Reap in-process when the worker process fails (default: false)
    pub reap_sync_fallback: bool,
    /// Session serialization (default: JSON)
    pub codec: Arc<dyn Codec>,
    /// Enables at-rest encryption when set
    pub secret: Option<String>,
    /// Parameters of the default cipher
    pub crypto: CipherConfig,
    /// Replaces the default cipher when a secret is set
    pub cipher: Option<Arc<dyn Cipher>>,
    /// Substitute session for reads that fail terminally
    pub fallback_session: Option<FallbackSessionFn>,
    /// Emit operational log messages (default: true)
    pub logging: bool,
    /// Worker executable; defaults to `session-reap-worker` next to the current executable
    pub worker_program: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            ttl: DEFAULT_TTL,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            retry: RetryPolicy::default(),
            reap_interval: Some(DEFAULT_REAP_INTERVAL),
            reap_max_concurrent: DEFAULT_REAP_MAX_CONCURRENT,
            reap_async: false,
            reap_sync_fallback: false,
            codec: Arc::new(JsonCodec),
            secret: None,
            crypto: CipherConfig::default(),
            cipher: None,
            fallback_session: None,
            logging: true,
            worker_program: None,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("file_extension", &self.file_extension)
            .field("retry", &self.retry)
            .field("reap_interval", &self.reap_interval)
            .field("reap_max_concurrent", &self.reap_max_concurrent)
            .field("reap_async", &self.reap_async)
            .field("reap_sync_fallback", &self.reap_sync_fallback)
            .field("codec", &self.codec)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("fallback_session", &self.fallback_session.is_some())
            .field("logging", &self.logging)
            .field("worker_program", &self.worker_program)
            .finish_non_exhaustive()
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl = ttl_secs;
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the reap interval in seconds.
    pub fn with_reap_interval(mut self, secs: u64) -> Self {
        self.reap_interval = Some(secs);
        self
    }

    /// Disables background reaping.
    pub fn without_reaping(mut self) -> Self {
        self.reap_interval = None;
        self
    }

    pub fn with_reap_max_concurrent(mut self, max: usize) -> Self {
        self.reap_max_concurrent = max;
        self
    }

    pub fn with_reap_async(mut self, enabled: bool) -> Self {
        self.reap_async = enabled;
        self
    }

    pub fn with_reap_sync_fallback(mut self, enabled: bool) -> Self {
        self.reap_sync_fallback = enabled;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_crypto(mut self, crypto: CipherConfig) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn with_fallback_session<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&str) -> Session + Send + Sync + 'static,
    {
        self.fallback_session = Some(Arc::new(fallback));
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    /// Validates the options and derives the computed fields.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        if self.reap_max_concurrent == 0 {
            return Err(StoreError::Config(
                "reap_max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.reap_interval == Some(0) {
            return Err(StoreError::Config(
                "reap_interval must be positive; use without_reaping() to disable".to_string(),
            ));
        }

        if self.reap_async && !self.codec.is_builtin() {
            return Err(StoreError::Config(
                "reap_async requires the built-in JSON codec".to_string(),
            ));
        }
        if self.reap_async && self.secret.is_some() && self.cipher.is_some() {
            return Err(StoreError::Config(
                "reap_async requires the built-in cipher".to_string(),
            ));
        }

        let path = normalize_path(&self.path);
        let layout = FileLayout::new(path.clone(), self.file_extension.clone())
            .map_err(|e| StoreError::Config(format!("bad file extension: {}", e)))?;

        let cipher = match &self.secret {
            Some(secret) => Some(match &self.cipher {
                Some(cipher) => Arc::clone(cipher),
                None => Arc::new(self.crypto.build(secret)?) as Arc<dyn Cipher>,
            }),
            None => None,
        };

        Ok(ResolvedConfig {
            options: StoreConfig { path, ..self },
            layout,
            cipher,
        })
    }
}

/// Fully resolved configuration, immutable for the lifetime of a store.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    options: StoreConfig,
    layout: FileLayout,
    cipher: Option<Arc<dyn Cipher>>,
}

impl ResolvedConfig {
    /// The options this configuration was resolved from, with the normalized path.
    pub fn options(&self) -> &StoreConfig {
        &self.options
    }

    pub fn path(&self) -> &Path {
        &self.options.path
    }

    pub fn ttl(&self) -> u64 {
        self.options.ttl
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    pub fn codec(&self) -> &dyn Codec {
        self.options.codec.as_ref()
    }

    /// The cipher, present only when a secret is configured.
    pub fn cipher(&self) -> Option<&dyn Cipher> {
        self.cipher.as_deref()
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.options.retry
    }

    pub fn reap_interval(&self) -> Option<Duration> {
        self.options.reap_interval.map(Duration::from_secs)
    }

    pub fn reap_max_concurrent(&self) -> usize {
        self.options.reap_max_concurrent
    }

    pub fn reap_async(&self) -> bool {
        self.options.reap_async
    }

    pub fn reap_sync_fallback(&self) -> bool {
        self.options.reap_sync_fallback
    }

    pub fn fallback_session(&self) -> Option<&FallbackSessionFn> {
        self.options.fallback_session.as_ref()
    }

    pub fn logging(&self) -> bool {
        self.options.logging
    }

    /// The worker executable to launch for asynchronous reaps.
    pub fn worker_program(&self) -> PathBuf {
        if let Some(program) = &self.options.worker_program {
            return program.clone();
        }
        let name = format!("{}{}", WORKER_BINARY, std::env::consts::EXE_SUFFIX);
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

/// Lexically normalizes a path: drops `.` components and folds `..` into
/// the preceding component where possible.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}
