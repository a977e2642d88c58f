//! Server-side token confidentiality relay.
//!
//! Prevents access tokens, refresh tokens, and authorization codes issued
//! to the first-party browser client from ever becoming visible to
//! browser-executing script: issued secrets are swapped for an opaque
//! redaction marker and shuttled through encrypted, attribute-hardened
//! cookies instead.
//!
//! - [`cookie`]: cookie naming (secure-prefix policy), attributes, and the
//!   explicit cookie-jar capability
//! - [`protect`]: the authenticated sealing capability and its AES-256-GCM
//!   implementation
//! - [`hooks`]: the four pipeline interception points plus the logout hook
//!
//! The browser half lives in `tokenveil-flow`; the two communicate only
//! through the HTTP protocol and cookies, never through in-process calls.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cookie;
pub mod hooks;
pub mod protect;

// Re-export commonly used types for convenience
// ------------------------------
pub use cookie::{
    cookie_name_for, CookieAttributes, CookieJar, SameSite, TokenKind, ACCESS_TOKEN_COOKIE,
    PKCE_CODE_COOKIE, REDACTED_VALUE, REFRESH_TOKEN_COOKIE, SECURE_COOKIE_PREFIX,
};
pub use hooks::{InboundTokenFields, IssuedTokenFields, RelaySettings, TokenRelay};
pub use protect::{AesGcmProtector, DataProtector, ProtectError};
