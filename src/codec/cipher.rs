//! At-rest encryption for session files.
//!
//! The default [`AesGcmCipher`] derives a 256-bit key from the configured
//! secret and writes each file as hex text:
//!
//! ```text
//! hex( nonce[12] ‖ ciphertext ‖ tag[16] )
//! ```
//!
//! A fresh random nonce is drawn for every write.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use bytes::Bytes;
use sha2::{Digest, Sha256, Sha512};
use std::str::FromStr;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Errors raised by a cipher. These indicate misconfiguration or tampering and
/// are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid key material")]
    InvalidKey,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed (wrong secret or tampered file)")]
    Decrypt,

    #[error("ciphertext is not valid hex: {0}")]
    Encoding(String),

    #[error("ciphertext too short: {0} bytes")]
    Truncated(usize),
}

/// A pluggable at-rest encryption capability.
pub trait Cipher: Send + Sync + std::fmt::Debug {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Bytes, CipherError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Bytes, CipherError>;
}

/// How the cipher key is derived from the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyDerivation {
    /// SHA-256 of the secret.
    Sha256,
    /// First 32 bytes of SHA-512 of the secret.
    #[default]
    Sha512,
}

impl KeyDerivation {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyDerivation::Sha256 => "sha256",
            KeyDerivation::Sha512 => "sha512",
        }
    }
}

impl FromStr for KeyDerivation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(KeyDerivation::Sha256),
            "sha512" => Ok(KeyDerivation::Sha512),
            other => Err(format!("unknown key derivation '{}'", other)),
        }
    }
}

/// Cipher construction parameters.
#[derive(Debug, Clone, Default)]
pub struct CipherConfig {
    pub key_derivation: KeyDerivation,
}

impl CipherConfig {
    pub fn with_key_derivation(mut self, key_derivation: KeyDerivation) -> Self {
        self.key_derivation = key_derivation;
        self
    }

    /// Builds the default AES-256-GCM cipher for `secret`.
    pub fn build(&self, secret: &str) -> Result<AesGcmCipher, CipherError> {
        AesGcmCipher::new(secret, self.key_derivation)
    }
}

/// AES-256-GCM with a hex-encoded on-disk representation.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl AesGcmCipher {
    pub fn new(secret: &str, key_derivation: KeyDerivation) -> Result<Self, CipherError> {
        let key: Vec<u8> = match key_derivation {
            KeyDerivation::Sha256 => Sha256::digest(secret.as_bytes()).to_vec(),
            KeyDerivation::Sha512 => Sha512::digest(secret.as_bytes())[..32].to_vec(),
        };
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CipherError::InvalidKey)?;
        Ok(Self { cipher })
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Bytes, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CipherError::Encrypt)?;

        let mut raw = Vec::with_capacity(NONCE_LEN + sealed.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&sealed);
        Ok(Bytes::from(hex::encode(raw)))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Bytes, CipherError> {
        let text = std::str::from_utf8(ciphertext)
            .map_err(|e| CipherError::Encoding(e.to_string()))?;
        let raw = hex::decode(text.trim()).map_err(|e| CipherError::Encoding(e.to_string()))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Truncated(raw.len()));
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Decrypt)?;
        Ok(Bytes::from(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = CipherConfig::default().build("keyboard cat").unwrap();
        let sealed = cipher.encrypt(b"{\"views\":1}").unwrap();

        assert!(sealed.iter().all(u8::is_ascii_hexdigit));
        assert_eq!(&cipher.decrypt(&sealed).unwrap()[..], b"{\"views\":1}");
    }

    #[test]
    fn test_nonce_is_fresh_per_write() {
        let cipher = CipherConfig::default().build("secret").unwrap();
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let writer = CipherConfig::default().build("one").unwrap();
        let reader = CipherConfig::default().build("two").unwrap();
        let sealed = writer.encrypt(b"payload").unwrap();
        assert_eq!(reader.decrypt(&sealed), Err(CipherError::Decrypt));
    }

    #[test]
    fn test_key_derivations_differ() {
        let a = AesGcmCipher::new("secret", KeyDerivation::Sha256).unwrap();
        let b = AesGcmCipher::new("secret", KeyDerivation::Sha512).unwrap();
        let sealed = a.encrypt(b"payload").unwrap();
        assert!(b.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_default_key_derivation_is_sha512() {
        let default = CipherConfig::default().build("secret").unwrap();
        let sha512 = AesGcmCipher::new("secret", KeyDerivation::Sha512).unwrap();
        let sealed = default.encrypt(b"payload").unwrap();
        assert_eq!(&sha512.decrypt(&sealed).unwrap()[..], b"payload");
    }

    #[test]
    fn test_key_derivation_names() {
        for kd in [KeyDerivation::Sha256, KeyDerivation::Sha512] {
            assert_eq!(kd.as_str().parse::<KeyDerivation>(), Ok(kd));
        }
        assert_eq!("SHA256".parse::<KeyDerivation>(), Ok(KeyDerivation::Sha256));
        assert!("md5".parse::<KeyDerivation>().is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        let cipher = CipherConfig::default().build("secret").unwrap();
        assert!(matches!(
            cipher.decrypt(b"not hex at all"),
            Err(CipherError::Encoding(_))
        ));
        assert_eq!(cipher.decrypt(b"abcd"), Err(CipherError::Truncated(2)));
    }
}
