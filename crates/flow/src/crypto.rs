//! PKCE crypto utility (RFC 7636)
//!
//! Random material generation and S256 challenge derivation behind
//! injectable capability traits:
//! - [`RandomSource`]: fills buffers with random bytes, labeled secure or not
//! - [`Hasher`]: produces SHA-256 digests when a primitive is available
//! - [`CryptoUtils`]: bundles both for the request builder and redirect
//!   handler
//!
//! `state` values and code verifiers are encoded into a fixed alphanumeric
//! charset (not base64); only the derived challenge is base64url encoded.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

/// Charset used to encode random bytes into `state` and verifier strings.
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Number of random bytes behind a generated `state` or request handle.
pub const STATE_SIZE: usize = 10;

/// Number of random bytes behind a generated code verifier.
///
/// One byte maps to one charset character, so the verifier lands exactly on
/// the RFC 7636 upper bound of 128 characters.
pub const VERIFIER_SIZE: usize = 128;

/// Minimum code verifier length accepted by [`CryptoUtils::derive_challenge`].
pub const MIN_VERIFIER_LEN: usize = 43;

/// Maximum code verifier length accepted by [`CryptoUtils::derive_challenge`].
pub const MAX_VERIFIER_LEN: usize = 128;

/// Error type for PKCE crypto operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Code verifier length outside the RFC 7636 bounds
    #[error("code verifier length {len} outside allowed range [{MIN_VERIFIER_LEN}, {MAX_VERIFIER_LEN}]")]
    InvalidVerifierLength { len: usize },

    /// No SHA-256 primitive available
    #[error("no SHA-256 primitive available")]
    Unavailable,
}

/// Source of random bytes for state, handle, and verifier generation.
///
/// Injected rather than read from ambient platform randomness so tests can
/// substitute deterministic sources.
pub trait RandomSource: Send + Sync {
    /// Fill the buffer with random bytes.
    fn fill(&self, buf: &mut [u8]);

    /// Whether this source is cryptographically secure.
    ///
    /// Callers refuse to emit PKCE material from a non-secure source.
    fn is_secure(&self) -> bool;
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }

    fn is_secure(&self) -> bool {
        true
    }
}

/// Fallback random source for environments without a secure generator.
///
/// Reports itself as non-secure; the request builder will skip PKCE setup
/// when handed one of these.
#[derive(Debug, Clone, Copy)]
pub struct FallbackRandom;

impl FallbackRandom {
    /// Create a fallback source, logging the degraded mode.
    #[must_use]
    pub fn new() -> Self {
        warn!("no secure random source available, falling back to a non-cryptographic generator");
        Self
    }
}

impl Default for FallbackRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for FallbackRandom {
    fn fill(&self, buf: &mut [u8]) {
        rand::thread_rng().fill_bytes(buf);
    }

    fn is_secure(&self) -> bool {
        false
    }
}

/// SHA-256 capability.
///
/// Returns `None` when no digest primitive is available, which callers
/// surface as [`CryptoError::Unavailable`].
pub trait Hasher: Send + Sync {
    /// Compute the SHA-256 digest of `data`, if a primitive is available.
    fn sha256(&self, data: &[u8]) -> Option<[u8; 32]>;
}

/// [`Hasher`] backed by the `sha2` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha2Hasher;

impl Hasher for Sha2Hasher {
    fn sha256(&self, data: &[u8]) -> Option<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Some(hasher.finalize().into())
    }
}

/// Bundled random + hashing capabilities for the authorization flow.
#[derive(Clone)]
pub struct CryptoUtils {
    random: Arc<dyn RandomSource>,
    hasher: Arc<dyn Hasher>,
}

impl std::fmt::Debug for CryptoUtils {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoUtils").field("secure", &self.random.is_secure()).finish()
    }
}

impl Default for CryptoUtils {
    fn default() -> Self {
        Self { random: Arc::new(OsRandom), hasher: Arc::new(Sha2Hasher) }
    }
}

impl CryptoUtils {
    /// Create a utility from explicit capabilities.
    #[must_use]
    pub fn new(random: Arc<dyn RandomSource>, hasher: Arc<dyn Hasher>) -> Self {
        Self { random, hasher }
    }

    /// Whether the underlying random source is cryptographically secure.
    #[must_use]
    pub fn random_is_secure(&self) -> bool {
        self.random.is_secure()
    }

    /// Generate `size` random characters from the alphanumeric charset.
    ///
    /// Each random byte maps to one output character, so the result is
    /// exactly `size` characters long. Used for `state` values (10 bytes),
    /// request handles (10 bytes), and code verifiers (128 bytes).
    #[must_use]
    pub fn generate_random(&self, size: usize) -> String {
        let mut buf = vec![0u8; size];
        self.random.fill(&mut buf);
        buf.iter().map(|b| CHARSET[*b as usize % CHARSET.len()] as char).collect()
    }

    /// Derive the S256 code challenge for a verifier.
    ///
    /// Computes SHA-256 over the ASCII bytes of the verifier and returns the
    /// URL-safe, unpadded base64 encoding. The challenge method is always
    /// "S256"; "plain" is never offered.
    ///
    /// # Errors
    /// Returns [`CryptoError::InvalidVerifierLength`] if the verifier is
    /// outside [43, 128] characters, or [`CryptoError::Unavailable`] if no
    /// SHA-256 primitive exists.
    pub fn derive_challenge(&self, verifier: &str) -> Result<String, CryptoError> {
        let len = verifier.len();
        if !(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&len) {
            return Err(CryptoError::InvalidVerifierLength { len });
        }

        let digest = self.hasher.sha256(verifier.as_bytes()).ok_or(CryptoError::Unavailable)?;
        Ok(URL_SAFE_NO_PAD.encode(digest))
    }
}
