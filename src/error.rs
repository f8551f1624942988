//! Error types for session store operations.

use crate::codec::{CipherError, CodecError};
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur while reading, writing or reaping session files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A filesystem operation on a single session file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The storage directory could not be listed.
    #[error("failed to list session directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file content could not be decoded. The file has already been removed.
    #[error("corrupt session file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The session could not be encoded.
    #[error("failed to encode session: {0}")]
    Encode(#[source] CodecError),

    /// Encryption or decryption failed. Usually a configuration problem.
    #[error("cipher failure: {0}")]
    Cipher(#[from] CipherError),

    /// One or more items of a bulk operation failed.
    #[error("{} session operation(s) failed", .0.len())]
    Aggregate(Vec<StoreError>),

    /// The reap worker process could not be started.
    #[error("failed to spawn reap worker {program}: {source}")]
    WorkerSpawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The reap worker process ran but did not exit cleanly.
    #[error("reap worker exited with {0}")]
    WorkerExit(ExitStatus),

    /// A reap task panicked or was cancelled.
    #[error("reap task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The configuration could not be resolved.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error means the session file does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::Io { source, .. } | StoreError::ListDir { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    /// Returns true if this error came from an undecodable session file.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Decode { .. })
    }

    /// The individual failures of a bulk operation, or this error alone.
    pub fn errors(&self) -> &[StoreError] {
        match self {
            StoreError::Aggregate(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = StoreError::io("/tmp/x.json", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());

        let err = StoreError::io(
            "/tmp/x.json",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_aggregate_message_and_errors() {
        let err = StoreError::Aggregate(vec![
            StoreError::Config("a".into()),
            StoreError::Config("b".into()),
        ]);
        assert_eq!(err.to_string(), "2 session operation(s) failed");
        assert_eq!(err.errors().len(), 2);

        let single = StoreError::Config("c".into());
        assert_eq!(single.errors().len(), 1);
    }
}
