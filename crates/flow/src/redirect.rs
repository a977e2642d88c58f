//! Redirect request handler
//!
//! Drives the browser side of the authorization-code flow:
//! 1. [`RedirectRequestHandler::perform_authorization_request`] persists the
//!    pending request under a fresh random handle, then hands back the URL
//!    to navigate to. Every storage write completes before the URL is
//!    returned.
//! 2. [`RedirectRequestHandler::complete_authorization_request`] recovers
//!    the pending request on return, validates the CSRF `state`, and yields
//!    a response or error. Storage is cleared exactly once on a match and
//!    retained on a mismatch.
//!
//! There is no explicit cancel; abandoning the flow leaves orphaned storage
//! entries keyed by unguessable, never-reused handles.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::ServiceConfiguration;
use crate::crypto::{CryptoUtils, STATE_SIZE};
use crate::request::{AuthorizationError, AuthorizationRequest, AuthorizationResponse};
use crate::storage::{StorageBackend, StorageError};

/// Well-known storage key holding the handle of the pending request.
pub const CURRENT_REQUEST_KEY: &str = "tokenveil_current_authorization_request";

fn request_key(handle: &str) -> String {
    format!("{handle}_authorization_request")
}

fn config_key(handle: &str) -> String {
    format!("{handle}_authorization_service_configuration")
}

/// Error type for redirect handler operations
#[derive(Debug, Error)]
pub enum RedirectError {
    /// Storage backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Pending request or configuration could not be (de)serialized
    #[error("pending request serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The assembled redirect URL was not a valid URL
    #[error("invalid redirect URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Outcome of a completed authorization request.
///
/// Exactly one of `response` / `error` is set.
#[derive(Debug, Clone)]
pub struct AuthorizationFlowResult {
    /// The originating request, restored from storage (verifier included)
    pub request: AuthorizationRequest,
    /// Successful response, if the server returned a code
    pub response: Option<AuthorizationResponse>,
    /// Error response, if the server returned one
    pub error: Option<AuthorizationError>,
}

/// Browser-side state machine for the authorization redirect.
pub struct RedirectRequestHandler {
    storage: Arc<dyn StorageBackend>,
    crypto: CryptoUtils,
}

impl RedirectRequestHandler {
    /// Create a handler over a storage backend with default crypto.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage, crypto: CryptoUtils::default() }
    }

    /// Create a handler with explicit crypto capabilities.
    #[must_use]
    pub fn with_crypto(storage: Arc<dyn StorageBackend>, crypto: CryptoUtils) -> Self {
        Self { storage, crypto }
    }

    /// Persist the pending request and return the URL to redirect to.
    ///
    /// Generates a fresh random handle, runs PKCE setup on the request, and
    /// awaits all three storage writes (handle pointer, request,
    /// configuration) before returning. The ordering guarantee means a
    /// crash before navigation can never leave the browser redirected
    /// without a recoverable pending request.
    ///
    /// # Errors
    /// Returns an error if storage writes or serialization fail.
    pub async fn perform_authorization_request(
        &self,
        config: &ServiceConfiguration,
        mut request: AuthorizationRequest,
    ) -> Result<Url, RedirectError> {
        request.setup_code_verifier(&self.crypto);

        let handle = self.crypto.generate_random(STATE_SIZE);

        self.storage.set(CURRENT_REQUEST_KEY, &handle).await?;
        self.storage.set(&request_key(&handle), &serde_json::to_string(&request)?).await?;
        self.storage.set(&config_key(&handle), &serde_json::to_string(config)?).await?;

        debug!(handle = %handle, state = %request.state, "pending authorization request persisted");

        let url = Url::parse(&config.authorization_request_url(&request))?;
        Ok(url)
    }

    /// Complete a pending request from the redirect-return URL.
    ///
    /// Returns `Ok(None)` when there is nothing to deliver: no pending
    /// request, a missing pending record, or a `state` mismatch. On a
    /// mismatch the persisted entries are retained, in case a legitimate
    /// concurrent request is still in flight.
    ///
    /// # Errors
    /// Returns an error only for storage or deserialization failures.
    pub async fn complete_authorization_request(
        &self,
        return_url: &Url,
    ) -> Result<Option<AuthorizationFlowResult>, RedirectError> {
        let Some(handle) = self.storage.get(CURRENT_REQUEST_KEY).await? else {
            return Ok(None);
        };

        let Some(raw_request) = self.storage.get(&request_key(&handle)).await? else {
            warn!(handle = %handle, "pending request record missing, nothing to complete");
            return Ok(None);
        };
        let request: AuthorizationRequest = serde_json::from_str(&raw_request)?;

        let params = response_params(return_url);

        let returned_state = params.get("state").map(String::as_str).unwrap_or_default();
        if returned_state != request.state {
            warn!(
                expected = %request.state,
                received = %returned_state,
                "state mismatch on redirect return, possible CSRF; keeping pending request"
            );
            return Ok(None);
        }

        let (response, error) = if let Some(error_code) = params.get("error") {
            let error = AuthorizationError {
                error: error_code.clone(),
                error_description: params.get("error_description").cloned(),
                error_uri: params.get("error_uri").cloned(),
                state: params.get("state").cloned(),
            };
            (None, Some(error))
        } else if let Some(code) = params.get("code") {
            let response =
                AuthorizationResponse { code: code.clone(), state: returned_state.to_string() };
            (Some(response), None)
        } else {
            warn!(handle = %handle, "redirect return carries neither code nor error");
            return Ok(None);
        };

        // Matched: clear the three persisted keys exactly once
        self.storage.remove(CURRENT_REQUEST_KEY).await?;
        self.storage.remove(&request_key(&handle)).await?;
        self.storage.remove(&config_key(&handle)).await?;

        debug!(handle = %handle, success = response.is_some(), "authorization request completed");

        Ok(Some(AuthorizationFlowResult { request, response, error }))
    }
}

/// Extract the response parameters from a redirect-return URL.
///
/// The query string is consulted first; when it carries none of the
/// protocol parameters, the URL fragment is parsed instead (covers
/// fragment-style response modes).
fn response_params(url: &Url) -> HashMap<String, String> {
    let query: HashMap<String, String> =
        url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

    let interesting = ["state", "code", "error"];
    if interesting.iter().any(|key| query.contains_key(*key)) {
        return query;
    }

    url.fragment()
        .map(|fragment| {
            url::form_urlencoded::parse(fragment.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}
