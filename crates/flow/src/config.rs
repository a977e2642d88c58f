//! Authorization-server endpoint configuration
//!
//! Persisted alongside the pending request across the redirect, so the
//! completion path can rebuild the token endpoint without re-discovery.

use serde::{Deserialize, Serialize};

use crate::request::AuthorizationRequest;

/// Endpoints of the authorization server this client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Authorization endpoint URL
    pub authorization_endpoint: String,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// Revocation endpoint URL, if the server offers one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,

    /// End-session endpoint URL, if the server offers one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

impl ServiceConfiguration {
    /// Create a configuration from the two mandatory endpoints.
    #[must_use]
    pub fn new(
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            revocation_endpoint: None,
            end_session_endpoint: None,
        }
    }

    /// Build the full authorization-redirect URL for a request.
    ///
    /// The caller is responsible for running PKCE setup first; the redirect
    /// handler does this before any persistence or URL assembly.
    #[must_use]
    pub fn authorization_request_url(&self, request: &AuthorizationRequest) -> String {
        let query = request
            .to_query_params()
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{query}", self.authorization_endpoint)
    }
}
