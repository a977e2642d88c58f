//! Token request and response models (RFC 6749 §4.1.3, §6)
//!
//! The request flattens into a transport-ready form map; the response
//! evaluates its own expiry with a caller-chosen safety buffer.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Grant type presented at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Exchange an authorization code for tokens
    AuthorizationCode,
    /// Exchange a refresh token for a new access token
    RefreshToken,
}

impl GrantType {
    /// Wire value of this grant type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Token endpoint request.
///
/// Exactly one of `code` / `refresh_token` is meaningful per grant type;
/// [`Self::to_string_map`] only emits the one matching `grant_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub grant_type: GrantType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub redirect_uri: String,
    pub client_id: String,
    /// Additional parameters (carries `code_verifier` when exchanging a code)
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl TokenRequest {
    /// Build an authorization-code exchange request.
    #[must_use]
    pub fn for_code_exchange(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        code: impl Into<String>,
        code_verifier: Option<&str>,
    ) -> Self {
        let mut extras = BTreeMap::new();
        if let Some(verifier) = code_verifier {
            extras.insert("code_verifier".to_string(), verifier.to_string());
        }

        Self {
            grant_type: GrantType::AuthorizationCode,
            code: Some(code.into()),
            refresh_token: None,
            redirect_uri: redirect_uri.into(),
            client_id: client_id.into(),
            extras,
        }
    }

    /// Build a refresh-token request.
    #[must_use]
    pub fn for_refresh(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GrantType::RefreshToken,
            code: None,
            refresh_token: Some(refresh_token.into()),
            redirect_uri: redirect_uri.into(),
            client_id: client_id.into(),
            extras: BTreeMap::new(),
        }
    }

    /// Flatten into a form string map for transport.
    ///
    /// Extras are merged first; the well-known fields win over same-named
    /// extras.
    #[must_use]
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        let mut map = self.extras.clone();

        map.insert("grant_type".to_string(), self.grant_type.as_str().to_string());
        map.insert("client_id".to_string(), self.client_id.clone());
        map.insert("redirect_uri".to_string(), self.redirect_uri.clone());

        match self.grant_type {
            GrantType::AuthorizationCode => {
                if let Some(code) = &self.code {
                    map.insert("code".to_string(), code.clone());
                }
            }
            GrantType::RefreshToken => {
                if let Some(token) = &self.refresh_token {
                    map.insert("refresh_token".to_string(), token.clone());
                }
            }
        }

        map
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

fn now_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Token endpoint response (RFC 6749 §5.1).
///
/// `issued_at` defaults to the moment of deserialization so expiry can be
/// evaluated later without re-parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token lifetime in seconds; absent means non-expiring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Epoch seconds at which the token was issued
    #[serde(default = "now_seconds")]
    pub issued_at: i64,
}

impl TokenResponse {
    /// Whether the access token is still valid, with a safety buffer in
    /// seconds.
    ///
    /// Pure function: a response without `expires_in` never expires;
    /// otherwise valid while `now < issued_at + expires_in + buffer`.
    #[must_use]
    pub fn is_valid(&self, buffer: i64) -> bool {
        match self.expires_in {
            None => true,
            Some(expires_in) => {
                Utc::now().timestamp() < self.issued_at + expires_in as i64 + buffer
            }
        }
    }
}
