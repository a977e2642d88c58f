//! Data protector: authenticated sealing of cookie-resident secrets
//!
//! The relay only requires that seal/open round-trip and that tampering is
//! detectable; [`AesGcmProtector`] provides that with AES-256-GCM and a
//! random 12-byte nonce per seal. The sealed envelope is serialized with
//! serde_json; cookie-value base64 encoding happens in the hooks.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for protector operations
#[derive(Debug, Error)]
pub enum ProtectError {
    /// Key material was not usable
    #[error("invalid protector key: {0}")]
    InvalidKey(String),

    /// Sealing failed
    #[error("seal failed: {0}")]
    Seal(String),

    /// Opening failed (missing envelope fields, or tampering detected)
    #[error("open failed: {0}")]
    Open(String),
}

/// Symmetric authenticated encryption capability.
///
/// Implementations must detect tampering on `open`; an AEAD scheme
/// satisfies this.
pub trait DataProtector: Send + Sync {
    /// Seal plaintext into an opaque byte envelope.
    ///
    /// # Errors
    /// Returns an error if encryption fails.
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, ProtectError>;

    /// Open a sealed envelope back into plaintext.
    ///
    /// # Errors
    /// Returns an error if the envelope is malformed or fails
    /// authentication.
    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, ProtectError>;
}

/// Sealed envelope layout: nonce alongside ciphertext+tag.
#[derive(Debug, Serialize, Deserialize)]
struct SealedPayload {
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// AES-256-GCM [`DataProtector`].
pub struct AesGcmProtector {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmProtector").field("key", &"[REDACTED]").finish()
    }
}

impl AesGcmProtector {
    /// Create a protector from a raw 32-byte key.
    ///
    /// # Errors
    /// Returns [`ProtectError::InvalidKey`] for any other key length.
    pub fn new(key: &[u8]) -> Result<Self, ProtectError> {
        if key.len() != 32 {
            return Err(ProtectError::InvalidKey("key must be exactly 32 bytes".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| ProtectError::InvalidKey(format!("cipher construction failed: {e}")))?;

        Ok(Self { cipher })
    }

    /// Generate a random 32-byte key.
    #[must_use]
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn generate_nonce() -> [u8; 12] {
        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}

impl DataProtector for AesGcmProtector {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, ProtectError> {
        let nonce_bytes = Self::generate_nonce();
        let ciphertext = self
            .cipher
            .encrypt(&Nonce::from(nonce_bytes), plaintext)
            .map_err(|e| ProtectError::Seal(format!("encryption failed: {e}")))?;

        let payload = SealedPayload { nonce: nonce_bytes.to_vec(), ciphertext };
        serde_json::to_vec(&payload).map_err(|e| ProtectError::Seal(e.to_string()))
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, ProtectError> {
        let payload: SealedPayload = serde_json::from_slice(sealed)
            .map_err(|e| ProtectError::Open(format!("malformed envelope: {e}")))?;

        let nonce: [u8; 12] = payload
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| ProtectError::Open("nonce must be exactly 12 bytes".to_string()))?;

        self.cipher
            .decrypt(&Nonce::from(nonce), payload.ciphertext.as_ref())
            .map_err(|e| ProtectError::Open(format!("decryption failed: {e}")))
    }
}
