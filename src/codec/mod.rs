//! Record Codec & Path Mapping
//!
//! Everything that turns a [`Session`](crate::Session) into bytes on disk and
//! back again:
//!
//! - `layout`: session id ↔ file path mapping
//! - `json`: the [`Codec`] trait and the default JSON codec
//! - `cipher`: the [`Cipher`] trait and the default AES-256-GCM cipher
//!
//! ## Pipeline
//!
//! ```text
//!   write:  Session ──encode──> bytes ──encrypt?──> file
//!   read:   file ──decrypt?──> bytes ──decode──> Session
//! ```
//!
//! When no secret is configured the encrypt/decrypt steps are skipped entirely.

pub mod cipher;
pub mod json;
pub mod layout;

pub use cipher::{AesGcmCipher, Cipher, CipherConfig, CipherError, KeyDerivation};
pub use json::{Codec, CodecError, JsonCodec};
pub use layout::FileLayout;
