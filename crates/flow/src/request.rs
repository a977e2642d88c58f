//! Authorization request and response models (RFC 6749 §4.1)
//!
//! The request carries the public protocol fields plus two string maps:
//! - `extras`: additional parameters transmitted to the authorization
//!   endpoint (`code_challenge`, `code_challenge_method`, audience, ...)
//! - `internal`: values that must never reach the wire (`code_verifier`)
//!
//! The split exists so the verifier cannot leak through serialization by
//! accident: [`AuthorizationRequest::to_json`] emits public fields and
//! extras only, while the full struct (including `internal`) round-trips
//! through the storage backend across the redirect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::crypto::{CryptoUtils, STATE_SIZE, VERIFIER_SIZE};

/// Well-known extras key carrying the PKCE challenge.
pub const CODE_CHALLENGE: &str = "code_challenge";

/// Well-known extras key carrying the PKCE challenge method.
pub const CODE_CHALLENGE_METHOD: &str = "code_challenge_method";

/// Well-known internal key carrying the PKCE verifier.
pub const CODE_VERIFIER: &str = "code_verifier";

/// The only challenge method ever offered; "plain" is not supported.
const CHALLENGE_METHOD_S256: &str = "S256";

/// OAuth 2.0 authorization request
///
/// Serialization note: the derived `Serialize` impl covers persistence
/// across the redirect and includes `internal`; wire transmission goes
/// through [`Self::to_json`] / [`Self::to_query_params`], which do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// OAuth client id
    pub client_id: String,

    /// Redirect URI the authorization server sends the user back to
    pub redirect_uri: String,

    /// Requested scopes (space-separated)
    pub scope: String,

    /// Response type, "code" unless overridden
    pub response_type: String,

    /// CSRF correlation value, generated when absent
    pub state: String,

    /// Additional parameters for the authorization endpoint
    #[serde(default)]
    pub extras: BTreeMap<String, String>,

    /// Values held back from the wire (code verifier)
    #[serde(default)]
    internal: BTreeMap<String, String>,

    /// Whether PKCE setup is requested for this request
    #[serde(default)]
    use_pkce: bool,
}

impl AuthorizationRequest {
    /// Create a request with `response_type` "code" and a generated `state`.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
        use_pkce: bool,
        crypto: &CryptoUtils,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            response_type: "code".to_string(),
            state: crypto.generate_random(STATE_SIZE),
            extras: BTreeMap::new(),
            internal: BTreeMap::new(),
            use_pkce,
        }
    }

    /// Create a request with a caller-supplied `state`.
    #[must_use]
    pub fn with_state(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
        state: impl Into<String>,
        use_pkce: bool,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            response_type: "code".to_string(),
            state: state.into(),
            extras: BTreeMap::new(),
            internal: BTreeMap::new(),
            use_pkce,
        }
    }

    /// The PKCE code verifier, if one has been set up.
    #[must_use]
    pub fn code_verifier(&self) -> Option<&str> {
        self.internal.get(CODE_VERIFIER).map(String::as_str)
    }

    /// The PKCE code challenge, if one has been set up.
    #[must_use]
    pub fn code_challenge(&self) -> Option<&str> {
        self.extras.get(CODE_CHALLENGE).map(String::as_str)
    }

    /// The PKCE challenge method ("S256"), if one has been set up.
    #[must_use]
    pub fn code_challenge_method(&self) -> Option<&str> {
        self.extras.get(CODE_CHALLENGE_METHOD).map(String::as_str)
    }

    /// Generate the code verifier and challenge when PKCE is requested.
    ///
    /// Idempotent. PKCE is a hardening layer, not a protocol requirement
    /// for this client, so failures degrade rather than abort: a crypto
    /// error or a non-secure random source logs a warning and leaves the
    /// request without PKCE extras.
    pub fn setup_code_verifier(&mut self, crypto: &CryptoUtils) {
        if !self.use_pkce || self.internal.contains_key(CODE_VERIFIER) {
            return;
        }

        if !crypto.random_is_secure() {
            warn!("random source is not cryptographically secure, skipping PKCE setup");
            return;
        }

        let verifier = crypto.generate_random(VERIFIER_SIZE);
        match crypto.derive_challenge(&verifier) {
            Ok(challenge) => {
                self.internal.insert(CODE_VERIFIER.to_string(), verifier);
                self.extras.insert(CODE_CHALLENGE.to_string(), challenge);
                self.extras
                    .insert(CODE_CHALLENGE_METHOD.to_string(), CHALLENGE_METHOD_S256.to_string());
            }
            Err(err) => {
                warn!(error = %err, "challenge derivation failed, proceeding without PKCE");
            }
        }
    }

    /// Public JSON representation of the request.
    ///
    /// Ensures PKCE setup has run first, so the challenge is present before
    /// serialization. The code verifier is never part of the output.
    pub fn to_json(&mut self, crypto: &CryptoUtils) -> serde_json::Value {
        self.setup_code_verifier(crypto);

        json!({
            "response_type": self.response_type,
            "client_id": self.client_id,
            "redirect_uri": self.redirect_uri,
            "scope": self.scope,
            "state": self.state,
            "extras": self.extras,
        })
    }

    /// Reconstruct a request from its public JSON representation.
    ///
    /// # Errors
    /// Returns a deserialization error if required fields are missing.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Flatten into query parameters for the authorization endpoint.
    ///
    /// Well-known fields first, then extras; the verifier stays behind.
    #[must_use]
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("response_type".to_string(), self.response_type.clone()),
            ("client_id".to_string(), self.client_id.clone()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ("scope".to_string(), self.scope.clone()),
            ("state".to_string(), self.state.clone()),
        ];
        params.extend(self.extras.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

/// Successful authorization response: the code and echoed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: String,
}

/// Authorization error response (RFC 6749 §4.1.2.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl std::fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {desc}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}
