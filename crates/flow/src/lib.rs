//! Browser-side OAuth 2.0 authorization-code requester with PKCE.
//!
//! This crate implements the client half of the relayed authorization flow:
//!
//! - [`crypto`]: random `state`/`code_verifier` generation and S256 challenge
//!   derivation behind injectable capability traits
//! - [`request`]: the authorization request model and its PKCE setup
//! - [`config`]: authorization-server endpoint configuration
//! - [`storage`]: the pluggable key/value store for pending requests
//! - [`redirect`]: the redirect request handler (persist, navigate, complete)
//! - [`token`]: token request/response models and expiry evaluation
//!
//! The server half lives in `tokenveil-relay`; the two communicate only
//! through the HTTP protocol and cookies, never through in-process calls.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod config;
pub mod crypto;
pub mod redirect;
pub mod request;
pub mod storage;
pub mod token;

// Re-export commonly used types for convenience
// ------------------------------
pub use config::ServiceConfiguration;
pub use crypto::{CryptoError, CryptoUtils, FallbackRandom, Hasher, OsRandom, RandomSource, Sha2Hasher};
pub use redirect::{AuthorizationFlowResult, RedirectError, RedirectRequestHandler};
pub use request::{AuthorizationError, AuthorizationRequest, AuthorizationResponse};
pub use storage::{InMemoryStorage, StorageBackend, StorageError};
pub use token::{GrantType, TokenRequest, TokenResponse};
