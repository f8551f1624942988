//! Session serialization.

use crate::session::Session;
use bytes::Bytes;
use thiserror::Error;

/// Errors produced while encoding or decoding a session.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed session payload: {0}")]
    Malformed(String),

    #[error("session payload is empty")]
    Empty,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A pluggable encode/decode pair for session records.
///
/// Implementations must be total: any failure is reported as a [`CodecError`],
/// never a panic. A decode failure marks the file as corrupt.
pub trait Codec: Send + Sync + std::fmt::Debug {
    fn encode(&self, session: &Session) -> Result<Bytes, CodecError>;

    fn decode(&self, raw: &[u8]) -> Result<Session, CodecError>;

    /// True for the built-in JSON format, the only one a reap worker process
    /// can reconstruct from its command line.
    fn is_builtin(&self) -> bool {
        false
    }
}

/// The default codec: compact UTF-8 JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, session: &Session) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(session)?))
    }

    fn decode(&self, raw: &[u8]) -> Result<Session, CodecError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(CodecError::Empty);
        }
        Ok(serde_json::from_slice(raw)?)
    }

    fn is_builtin(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_encode_decode() {
        let session = Session::new()
            .with("views", 3)
            .with("cookie", json!({ "originalMaxAge": 1000 }));

        let raw = JsonCodec.encode(&session).unwrap();
        assert_eq!(JsonCodec.decode(&raw).unwrap(), session);
    }

    #[test]
    fn test_decode_rejects_empty_file() {
        assert!(matches!(JsonCodec.decode(b""), Err(CodecError::Empty)));
        assert!(matches!(JsonCodec.decode(b" \n"), Err(CodecError::Empty)));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(JsonCodec.decode(b"[1,2]"), Err(CodecError::Json(_))));
        assert!(matches!(JsonCodec.decode(b"{\"a\":"), Err(CodecError::Json(_))));
    }
}
