//! Out-of-Process Reap Worker
//!
//! Asynchronous reaping runs [`reap`](crate::storage::reap) in a separate
//! process so a large sweep never competes with request handling. The parent
//! describes its store in a [`WorkerArgs`]: path and TTL travel on the command
//! line, the file layout and cipher settings through the environment.
//!
//! ```text
//!   parent                                 worker
//!   ──────                                 ──────
//!   launch(args) ──spawn──> session-reap-worker <path> <ttl>
//!                           + SESSION_REAP_* environment
//!                                       │
//!                                       ├─ resolve config
//!                                       ├─ reap()
//!                                       ▼
//!   Ok / WorkerExit   <──exit status── exit 0 | exit 1 (no path)
//! ```
//!
//! The secret is passed through the environment of the child only, never on
//! its command line. Stores with a custom codec or cipher cannot be
//! described this way and refuse `reap_async` at resolve time.
//!
//! [`WorkerLauncher`] is the seam the scheduler depends on; [`ProcessLauncher`]
//! is the real implementation.

use crate::codec::{CipherConfig, KeyDerivation};
use crate::config::{ResolvedConfig, StoreConfig, DEFAULT_TTL};
use crate::error::{Result, StoreError};
use crate::storage::engine::RecordStore;
use crate::storage::reaper::reap;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Exit status of a worker run without a storage path.
pub const EXIT_INVALID_PATH: i32 = 1;

/// Session file suffix of the parent store.
pub const ENV_FILE_EXTENSION: &str = "SESSION_REAP_FILE_EXTENSION";

/// Secret of an encrypted parent store.
pub const ENV_SECRET: &str = "SESSION_REAP_SECRET";

/// Key derivation of an encrypted parent store (`sha256` or `sha512`).
pub const ENV_KEY_DERIVATION: &str = "SESSION_REAP_KEY_DERIVATION";

/// Reap concurrency of the parent store.
pub const ENV_MAX_CONCURRENT: &str = "SESSION_REAP_MAX_CONCURRENT";

/// Starts a reap pass outside the current process.
#[async_trait]
pub trait WorkerLauncher: Send + Sync + std::fmt::Debug {
    /// Runs a worker described by `args` and waits for it to exit.
    async fn launch(&self, args: &WorkerArgs) -> Result<()>;
}

/// Launches the `session-reap-worker` executable.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &WorkerArgs) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(args.path.as_deref().unwrap_or(Path::new("")))
            .arg(args.ttl.unwrap_or(DEFAULT_TTL).to_string());

        for key in [
            ENV_FILE_EXTENSION,
            ENV_SECRET,
            ENV_KEY_DERIVATION,
            ENV_MAX_CONCURRENT,
        ] {
            cmd.env_remove(key);
        }
        if let Some(extension) = &args.file_extension {
            cmd.env(ENV_FILE_EXTENSION, extension);
        }
        if let Some(secret) = &args.secret {
            cmd.env(ENV_SECRET, secret);
        }
        if let Some(kd) = args.key_derivation {
            cmd.env(ENV_KEY_DERIVATION, kd.as_str());
        }
        if let Some(max) = args.max_concurrent {
            cmd.env(ENV_MAX_CONCURRENT, max.to_string());
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, args: &WorkerArgs) -> Result<()> {
        debug!(program = %self.program.display(), ?args, "Spawning reap worker");

        let status = self
            .command(args)
            .status()
            .await
            .map_err(|source| StoreError::WorkerSpawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(StoreError::WorkerExit(status))
        }
    }
}

/// Everything a worker process needs to rebuild its parent's store.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WorkerArgs {
    /// Storage directory (argument 1)
    pub path: Option<PathBuf>,
    /// TTL in seconds (argument 2)
    pub ttl: Option<u64>,
    /// Session file suffix (`SESSION_REAP_FILE_EXTENSION`)
    pub file_extension: Option<String>,
    /// Encryption secret (`SESSION_REAP_SECRET`)
    pub secret: Option<String>,
    /// Cipher key derivation (`SESSION_REAP_KEY_DERIVATION`)
    pub key_derivation: Option<KeyDerivation>,
    /// Reap concurrency (`SESSION_REAP_MAX_CONCURRENT`)
    pub max_concurrent: Option<usize>,
}

impl fmt::Debug for WorkerArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerArgs")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("file_extension", &self.file_extension)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("key_derivation", &self.key_derivation)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

impl WorkerArgs {
    /// Describes the store behind `config`.
    pub fn for_store(config: &ResolvedConfig) -> Self {
        let options = config.options();
        let secret = options.secret.clone();
        Self {
            path: Some(config.path().to_path_buf()),
            ttl: Some(config.ttl()),
            file_extension: Some(config.layout().extension().to_string()),
            key_derivation: secret.as_ref().map(|_| options.crypto.key_derivation),
            secret,
            max_concurrent: Some(config.reap_max_concurrent()),
        }
    }

    /// Parses `<path> <ttl>` from arguments that exclude the program name.
    ///
    /// An empty path counts as missing. An unparsable TTL falls back to the
    /// default.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        let path = args
            .next()
            .map(|p| p.as_ref().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let ttl = args.next().and_then(|t| {
            let raw = t.as_ref().trim().to_string();
            match raw.parse::<u64>() {
                Ok(ttl) => Some(ttl),
                Err(_) => {
                    warn!(ttl = %raw, default = DEFAULT_TTL, "Ignoring invalid ttl argument");
                    None
                }
            }
        });
        Self {
            path,
            ttl,
            ..Self::default()
        }
    }

    /// Fills the store settings from environment variables read through
    /// `lookup`. Invalid values are logged and ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(extension) = lookup(ENV_FILE_EXTENSION) {
            self.file_extension = Some(extension);
        }
        if let Some(secret) = lookup(ENV_SECRET).filter(|s| !s.is_empty()) {
            self.secret = Some(secret);
        }
        if let Some(raw) = lookup(ENV_KEY_DERIVATION) {
            match raw.parse::<KeyDerivation>() {
                Ok(kd) => self.key_derivation = Some(kd),
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_KEY_DERIVATION),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT) {
            match raw.trim().parse::<usize>() {
                Ok(max) if max > 0 => self.max_concurrent = Some(max),
                _ => warn!(value = %raw, "Ignoring {}", ENV_MAX_CONCURRENT),
            }
        }
        self
    }

    /// Resolves the store configuration with these overrides.
    pub fn config(&self) -> StoreConfig {
        let mut config = StoreConfig::default().without_reaping();
        if let Some(path) = &self.path {
            config = config.with_path(path);
        }
        if let Some(ttl) = self.ttl {
            config = config.with_ttl(ttl);
        }
        if let Some(extension) = &self.file_extension {
            config = config.with_file_extension(extension.as_str());
        }
        if let Some(secret) = &self.secret {
            config = config.with_secret(secret.as_str());
        }
        if let Some(kd) = self.key_derivation {
            config = config.with_crypto(CipherConfig::default().with_key_derivation(kd));
        }
        if let Some(max) = self.max_concurrent {
            config = config.with_reap_max_concurrent(max);
        }
        config
    }
}

/// Runs the worker and returns its process exit code.
///
/// Item failures during the reap are logged; they do not change the exit code.
pub async fn run(args: WorkerArgs) -> i32 {
    if args.path.is_none() {
        error!("Reap worker started with invalid path");
        return EXIT_INVALID_PATH;
    }

    let config = match args.config().resolve() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Reap worker configuration failed");
            return EXIT_INVALID_PATH;
        }
    };

    let store = RecordStore::new(config);
    info!(path = %store.config().path().display(), "Deleting expired sessions");

    match reap(&store).await {
        Ok(report) => {
            info!(
                scanned = report.scanned,
                removed = report.removed,
                "Reap worker finished"
            );
        }
        Err(err) => {
            for item in err.errors() {
                warn!(error = %item, "Reap worker item failed");
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write_stale(store: &RecordStore, id: &str) -> PathBuf {
        let path = store.path_for(id);
        let mut stale = Session::new().with("views", 1);
        stale.set_last_access(0);
        let mut raw = store.config().codec().encode(&stale).unwrap();
        if let Some(cipher) = store.config().cipher() {
            raw = cipher.encrypt(&raw).unwrap();
        }
        std::fs::write(&path, raw).unwrap();
        path
    }

    #[test]
    fn test_parse_args() {
        let args = WorkerArgs::parse(["/tmp/sessions", "60"]);
        assert_eq!(args.path, Some(PathBuf::from("/tmp/sessions")));
        assert_eq!(args.ttl, Some(60));

        let args = WorkerArgs::parse(["/tmp/sessions", "soon"]);
        assert_eq!(args.ttl, None);

        let args = WorkerArgs::parse(Vec::<String>::new());
        assert_eq!(args, WorkerArgs::default());

        let args = WorkerArgs::parse([""]);
        assert_eq!(args.path, None);
    }

    #[test]
    fn test_config_overrides() {
        let args = WorkerArgs::parse(["/tmp/sessions", "60"]);
        let config = args.config().resolve().unwrap();
        assert_eq!(config.path(), Path::new("/tmp/sessions"));
        assert_eq!(config.ttl(), 60);
        assert_eq!(config.reap_interval(), None);
    }

    #[tokio::test]
    async fn test_run_without_path_exits_one() {
        assert_eq!(run(WorkerArgs::default()).await, EXIT_INVALID_PATH);
    }

    #[tokio::test]
    async fn test_run_reaps_stale_sessions() {
        let dir = TempDir::new().unwrap();
        let mut stale = Session::new();
        stale.set_last_access(0);
        std::fs::write(
            dir.path().join("old.json"),
            serde_json::to_vec(&stale).unwrap(),
        )
        .unwrap();

        let args = WorkerArgs {
            path: Some(dir.path().to_path_buf()),
            ttl: Some(1),
            ..WorkerArgs::default()
        };
        assert_eq!(run(args).await, 0);
        assert!(!dir.path().join("old.json").exists());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_FILE_EXTENSION, ".sess"),
            (ENV_SECRET, "keyboard cat"),
            (ENV_KEY_DERIVATION, "sha256"),
            (ENV_MAX_CONCURRENT, "3"),
        ]
        .into_iter()
        .collect();

        let args = WorkerArgs::parse(["/tmp/sessions", "60"])
            .with_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(args.file_extension.as_deref(), Some(".sess"));
        assert_eq!(args.secret.as_deref(), Some("keyboard cat"));
        assert_eq!(args.key_derivation, Some(KeyDerivation::Sha256));
        assert_eq!(args.max_concurrent, Some(3));
        assert!(!format!("{:?}", args).contains("keyboard cat"));

        let config = args.config().resolve().unwrap();
        assert!(config.layout().matches("abc.sess"));
        assert!(config.cipher().is_some());
        assert_eq!(config.reap_max_concurrent(), 3);
    }

    #[test]
    fn test_invalid_env_is_ignored() {
        let args = WorkerArgs::parse(["/tmp/sessions"]).with_env(|key| match key {
            ENV_KEY_DERIVATION => Some("md5".to_string()),
            ENV_MAX_CONCURRENT => Some("0".to_string()),
            ENV_SECRET => Some(String::new()),
            _ => None,
        });
        assert_eq!(args.key_derivation, None);
        assert_eq!(args.max_concurrent, None);
        assert_eq!(args.secret, None);
    }

    #[test]
    fn test_for_store_describes_parent() {
        let config = StoreConfig::new()
            .with_path("/tmp/sessions")
            .with_ttl(90)
            .with_file_extension(".sess")
            .with_secret("s3cret")
            .with_reap_max_concurrent(4)
            .resolve()
            .unwrap();

        let args = WorkerArgs::for_store(&config);
        assert_eq!(args.path, Some(PathBuf::from("/tmp/sessions")));
        assert_eq!(args.ttl, Some(90));
        assert_eq!(args.file_extension.as_deref(), Some(".sess"));
        assert_eq!(args.secret.as_deref(), Some("s3cret"));
        assert_eq!(args.key_derivation, Some(KeyDerivation::default()));
        assert_eq!(args.max_concurrent, Some(4));

        let plain = WorkerArgs::for_store(&StoreConfig::new().resolve().unwrap());
        assert_eq!(plain.secret, None);
        assert_eq!(plain.key_derivation, None);
    }

    #[tokio::test]
    async fn test_run_on_encrypted_store_keeps_live_sessions() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(
            StoreConfig::new()
                .with_path(dir.path())
                .with_ttl(3600)
                .with_secret("keyboard cat")
                .with_crypto(CipherConfig::default().with_key_derivation(KeyDerivation::Sha256))
                .without_reaping()
                .with_logging(false)
                .resolve()
                .unwrap(),
        );

        store
            .set("live", &mut Session::new().with("views", 1))
            .await
            .unwrap();
        let stale = write_stale(&store, "stale");

        assert_eq!(run(WorkerArgs::for_store(store.config())).await, 0);
        assert!(store.path_for("live").exists());
        assert!(!stale.exists());

        let loaded = store.get("live").await.unwrap().unwrap();
        assert_eq!(loaded.get("views"), Some(&serde_json::json!(1)));
    }

    #[tokio::test]
    async fn test_run_with_custom_extension() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(
            StoreConfig::new()
                .with_path(dir.path())
                .with_ttl(1)
                .with_file_extension(".sess")
                .without_reaping()
                .with_logging(false)
                .resolve()
                .unwrap(),
        );
        let stale = write_stale(&store, "old");
        assert!(stale.ends_with("old.sess"));

        assert_eq!(run(WorkerArgs::for_store(store.config())).await, 0);
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_launch_missing_program_fails_to_spawn() {
        let launcher = ProcessLauncher::new("/nonexistent/session-reap-worker");
        let args = WorkerArgs {
            path: Some(PathBuf::from("/tmp")),
            ttl: Some(1),
            ..WorkerArgs::default()
        };
        let err = launcher.launch(&args).await.unwrap_err();
        assert!(matches!(err, StoreError::WorkerSpawn { .. }));
    }
}
