//! Token confidentiality relay hooks
//!
//! Five interception points in the issuance pipeline, stateless across
//! requests except via cookies:
//!
//! 1. [`TokenRelay::apply_token_response`]: redact issued access/refresh
//!    tokens into sealed cookies
//! 2. [`TokenRelay::apply_authorization_response`]: redact the issued
//!    authorization code into a sealed cookie
//! 3. [`TokenRelay::extract_token_request`]: substitute real values back
//!    into an inbound token request; the code cookie is one-shot
//! 4. [`TokenRelay::process_authentication`]: restore the access token for
//!    bearer validation without consuming its cookie
//! 5. [`TokenRelay::logout`]: delete the token cookies
//!
//! The relay protects exactly one first-party client id; every other client
//! passes through unmodified. Failures never propagate into the pipeline:
//! a missing, mismatched, or tampered cookie degrades to "value absent",
//! which forces re-authentication rather than trusting client input.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cookie::{cookie_name_for, CookieAttributes, CookieJar, TokenKind, REDACTED_VALUE};
use crate::protect::DataProtector;

/// Deployment settings the relay consults for cookie naming.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelaySettings {
    /// Global "force HTTPS" deployment switch; when set, cookies always use
    /// the secure-prefixed name regardless of the current request scheme.
    #[serde(default)]
    pub force_https: bool,
}

/// Mutable view of the sensitive fields in an outgoing token response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IssuedTokenFields {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Mutable view of the sensitive fields in an inbound token request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InboundTokenFields {
    pub code: Option<String>,
    pub refresh_token: Option<String>,
}

/// The server-side token confidentiality relay.
///
/// Holds no per-request state; safe to share across concurrent requests.
pub struct TokenRelay {
    client_id: String,
    settings: RelaySettings,
    protector: Arc<dyn DataProtector>,
}

impl std::fmt::Debug for TokenRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRelay")
            .field("client_id", &self.client_id)
            .field("force_https", &self.settings.force_https)
            .finish()
    }
}

impl TokenRelay {
    /// Create a relay for the given first-party client id.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        settings: RelaySettings,
        protector: Arc<dyn DataProtector>,
    ) -> Self {
        Self { client_id: client_id.into(), settings, protector }
    }

    /// The one client id this relay activates for.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn is_first_party(&self, client_id: Option<&str>) -> bool {
        client_id == Some(self.client_id.as_str())
    }

    fn cookie_name(&self, kind: TokenKind, is_https: bool) -> String {
        cookie_name_for(kind.base_cookie_name(), self.settings.force_https, is_https)
    }

    /// Seal `value` into the cookie for `kind` and replace the field with
    /// the redaction marker.
    ///
    /// If sealing fails the cookie write is skipped but the field is still
    /// redacted: the client ends up without credentials, which fails closed.
    fn redact_into_cookie(&self, kind: TokenKind, value: &str, jar: &mut dyn CookieJar) {
        let secure = self.settings.force_https || jar.is_https();
        let name = self.cookie_name(kind, jar.is_https());

        match self.protector.seal(value.as_bytes()) {
            Ok(sealed) => {
                jar.append(&name, &BASE64.encode(sealed), CookieAttributes::for_token(secure));
                debug!(kind = ?kind, cookie = %name, "secret sealed into cookie and redacted");
            }
            Err(err) => {
                warn!(kind = ?kind, error = %err, "sealing failed, credential dropped");
            }
        }
    }

    /// Read and unseal the cookie for `kind`. Any failure (missing cookie,
    /// bad base64, tampering) yields `None`.
    fn open_from_cookie(&self, kind: TokenKind, jar: &dyn CookieJar) -> Option<String> {
        let name = self.cookie_name(kind, jar.is_https());
        let raw = jar.request_cookie(&name)?;

        let sealed = match BASE64.decode(raw.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(kind = ?kind, cookie = %name, error = %err, "cookie value is not valid base64");
                return None;
            }
        };

        match self.protector.open(&sealed) {
            Ok(plaintext) => String::from_utf8(plaintext).ok(),
            Err(err) => {
                debug!(kind = ?kind, cookie = %name, error = %err, "cookie failed to unseal");
                None
            }
        }
    }

    /// Substitute a redacted inbound field with the real value from its
    /// cookie; discard anything the client supplied that is not the marker.
    fn restore_inbound_field(
        &self,
        kind: TokenKind,
        field: &mut Option<String>,
        jar: &mut dyn CookieJar,
        consume_cookie: bool,
    ) {
        match field.as_deref() {
            None => {}
            Some(REDACTED_VALUE) => {
                let restored = self.open_from_cookie(kind, jar);
                if restored.is_some() && consume_cookie {
                    let name = self.cookie_name(kind, jar.is_https());
                    jar.delete(&name);
                }
                if restored.is_none() {
                    debug!(kind = ?kind, "no cookie to restore redacted value from, treating as absent");
                }
                *field = restored;
            }
            Some(_) => {
                // Willing to lose the value, never to honor a forged one
                warn!(kind = ?kind, "non-redacted inbound value discarded");
                *field = None;
            }
        }
    }

    /// Response-shaping hook for token grants.
    ///
    /// For the first-party client, seals each issued token into its cookie
    /// and replaces the response field with the redaction marker. Other
    /// clients pass through untouched.
    pub fn apply_token_response(
        &self,
        client_id: Option<&str>,
        fields: &mut IssuedTokenFields,
        jar: Option<&mut dyn CookieJar>,
    ) {
        let Some(jar) = jar else { return };
        if !self.is_first_party(client_id) {
            return;
        }

        if let Some(access_token) = fields.access_token.take() {
            self.redact_into_cookie(TokenKind::Access, &access_token, jar);
            fields.access_token = Some(REDACTED_VALUE.to_string());
        }

        if let Some(refresh_token) = fields.refresh_token.take() {
            self.redact_into_cookie(TokenKind::Refresh, &refresh_token, jar);
            fields.refresh_token = Some(REDACTED_VALUE.to_string());
        }
    }

    /// Response-shaping hook for authorization grants.
    ///
    /// Seals the authorization code for the first-party client and replaces
    /// it with the redaction marker before it reaches the redirect.
    pub fn apply_authorization_response(
        &self,
        client_id: Option<&str>,
        code: &mut Option<String>,
        jar: Option<&mut dyn CookieJar>,
    ) {
        let Some(jar) = jar else { return };
        if !self.is_first_party(client_id) {
            return;
        }

        if let Some(value) = code.take() {
            self.redact_into_cookie(TokenKind::PkceCode, &value, jar);
            *code = Some(REDACTED_VALUE.to_string());
        }
    }

    /// Request-extraction hook for inbound token requests.
    ///
    /// Substitutes redacted fields with the real values from their cookies.
    /// The authorization-code cookie is deleted after a successful read
    /// (codes are single-use by protocol definition); the refresh-token
    /// cookie is kept for reuse. Inbound values that are present but not
    /// the marker are discarded.
    pub fn extract_token_request(
        &self,
        client_id: Option<&str>,
        fields: &mut InboundTokenFields,
        jar: Option<&mut dyn CookieJar>,
    ) {
        let Some(jar) = jar else { return };
        if !self.is_first_party(client_id) {
            return;
        }

        self.restore_inbound_field(TokenKind::PkceCode, &mut fields.code, jar, true);
        self.restore_inbound_field(TokenKind::Refresh, &mut fields.refresh_token, jar, false);
    }

    /// Authentication-processing hook for bearer validation.
    ///
    /// A presented marker is resolved from the access-token cookie, which
    /// stays in place (re-readable until logout or expiry). Real tokens
    /// from non-relayed callers pass through as-is.
    pub fn process_authentication(
        &self,
        access_token: &mut Option<String>,
        jar: Option<&mut dyn CookieJar>,
    ) {
        let Some(jar) = jar else { return };

        if access_token.as_deref() != Some(REDACTED_VALUE) {
            return;
        }

        *access_token = self.open_from_cookie(TokenKind::Access, jar);
        if access_token.is_none() {
            debug!("redacted bearer presented without a restorable cookie, not authenticated");
        }
    }

    /// Logout hook: delete the access- and refresh-token cookies.
    ///
    /// Idempotent when the cookies are already gone; a missing HTTP context
    /// (`None` jar) is a no-op.
    pub fn logout(&self, jar: Option<&mut dyn CookieJar>) {
        let Some(jar) = jar else { return };

        let is_https = jar.is_https();
        jar.delete(&self.cookie_name(TokenKind::Access, is_https));
        jar.delete(&self.cookie_name(TokenKind::Refresh, is_https));

        debug!("token cookies deleted on logout");
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for hooks.
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::protect::ProtectError;

    const CLIENT_ID: &str = "backoffice";

    /// Protector that appends a trailing sentinel byte, mirroring how the
    /// hooks compose sealing with base64 without real cryptography.
    struct SentinelProtector;

    impl DataProtector for SentinelProtector {
        fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, ProtectError> {
            let mut out = plaintext.to_vec();
            out.push(0xEE);
            Ok(out)
        }

        fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, ProtectError> {
            match sealed.split_last() {
                Some((0xEE, rest)) => Ok(rest.to_vec()),
                _ => Err(ProtectError::Open("bad sentinel".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct MockCookieJar {
        https: bool,
        request_cookies: HashMap<String, String>,
        response_cookies: HashMap<String, (String, CookieAttributes)>,
        deleted: HashSet<String>,
    }

    impl MockCookieJar {
        fn with_request_cookie(https: bool, name: &str, value: &str) -> Self {
            let mut jar = Self { https, ..Self::default() };
            jar.request_cookies.insert(name.to_string(), value.to_string());
            jar
        }
    }

    impl CookieJar for MockCookieJar {
        fn request_cookie(&self, name: &str) -> Option<String> {
            self.request_cookies.get(name).cloned()
        }

        fn append(&mut self, name: &str, value: &str, attributes: CookieAttributes) {
            self.response_cookies
                .insert(name.to_string(), (value.to_string(), attributes));
        }

        fn delete(&mut self, name: &str) {
            self.deleted.insert(name.to_string());
        }

        fn is_https(&self) -> bool {
            self.https
        }
    }

    fn relay(force_https: bool) -> TokenRelay {
        TokenRelay::new(
            CLIENT_ID,
            RelaySettings { force_https },
            Arc::new(SentinelProtector),
        )
    }

    fn sealed_cookie_value(plaintext: &str) -> String {
        let mut bytes = plaintext.as_bytes().to_vec();
        bytes.push(0xEE);
        BASE64.encode(bytes)
    }

    #[test]
    fn token_response_other_client_passes_through() {
        let mut jar = MockCookieJar::default();
        let mut fields = IssuedTokenFields {
            access_token: Some("AT1".to_string()),
            refresh_token: Some("RT1".to_string()),
        };

        relay(false).apply_token_response(Some("other-client"), &mut fields, Some(&mut jar));

        assert_eq!(fields.access_token.as_deref(), Some("AT1"));
        assert_eq!(fields.refresh_token.as_deref(), Some("RT1"));
        assert!(jar.response_cookies.is_empty());
    }

    #[test]
    fn token_response_first_party_redacts_both_tokens() {
        let mut jar = MockCookieJar::default();
        let mut fields = IssuedTokenFields {
            access_token: Some("AT1".to_string()),
            refresh_token: Some("RT1".to_string()),
        };

        relay(false).apply_token_response(Some(CLIENT_ID), &mut fields, Some(&mut jar));

        assert_eq!(fields.access_token.as_deref(), Some(REDACTED_VALUE));
        assert_eq!(fields.refresh_token.as_deref(), Some(REDACTED_VALUE));

        // Cookies unseal back to the original values
        let (access_value, access_attrs) = &jar.response_cookies["tvAccessToken"];
        assert_eq!(access_value, &sealed_cookie_value("AT1"));
        assert!(access_attrs.http_only);
        assert_eq!(jar.response_cookies["tvRefreshToken"].0, sealed_cookie_value("RT1"));
    }

    #[test]
    fn token_response_redacts_single_present_field() {
        let mut jar = MockCookieJar::default();
        let mut fields =
            IssuedTokenFields { access_token: Some("AT1".to_string()), refresh_token: None };

        relay(false).apply_token_response(Some(CLIENT_ID), &mut fields, Some(&mut jar));

        assert_eq!(fields.access_token.as_deref(), Some(REDACTED_VALUE));
        assert!(fields.refresh_token.is_none());
        assert!(jar.response_cookies.contains_key("tvAccessToken"));
        assert!(!jar.response_cookies.contains_key("tvRefreshToken"));
    }

    #[test]
    fn cookie_prefix_follows_https_policy_on_issue() {
        for (force_https, is_https, expect_prefix) in [
            (true, false, true),
            (true, true, true),
            (false, true, true),
            (false, false, false),
        ] {
            let mut jar = MockCookieJar { https: is_https, ..MockCookieJar::default() };
            let mut fields =
                IssuedTokenFields { access_token: Some("AT1".to_string()), refresh_token: None };

            relay(force_https).apply_token_response(Some(CLIENT_ID), &mut fields, Some(&mut jar));

            let expected =
                if expect_prefix { "__Host-tvAccessToken" } else { "tvAccessToken" };
            assert!(
                jar.response_cookies.contains_key(expected),
                "expected cookie {expected} for force_https={force_https} is_https={is_https}"
            );
            assert_eq!(jar.response_cookies.len(), 1);
        }
    }

    #[test]
    fn authorization_response_redacts_code_for_first_party_only() {
        let mut jar = MockCookieJar::default();
        let mut code = Some("PKCE1".to_string());
        relay(false).apply_authorization_response(Some(CLIENT_ID), &mut code, Some(&mut jar));

        assert_eq!(code.as_deref(), Some(REDACTED_VALUE));
        assert_eq!(jar.response_cookies["tvPkceCode"].0, sealed_cookie_value("PKCE1"));

        let mut other_jar = MockCookieJar::default();
        let mut other_code = Some("PKCE2".to_string());
        relay(false).apply_authorization_response(
            Some("other-client"),
            &mut other_code,
            Some(&mut other_jar),
        );

        assert_eq!(other_code.as_deref(), Some("PKCE2"));
        assert!(other_jar.response_cookies.is_empty());
    }

    #[test]
    fn extract_restores_code_and_consumes_cookie() {
        let mut jar = MockCookieJar::with_request_cookie(
            false,
            "tvPkceCode",
            &sealed_cookie_value("REAL_CODE"),
        );
        let mut fields =
            InboundTokenFields { code: Some(REDACTED_VALUE.to_string()), refresh_token: None };

        relay(false).extract_token_request(Some(CLIENT_ID), &mut fields, Some(&mut jar));

        assert_eq!(fields.code.as_deref(), Some("REAL_CODE"));
        assert!(jar.deleted.contains("tvPkceCode"));
    }

    #[test]
    fn extract_restores_refresh_token_without_consuming_cookie() {
        let mut jar = MockCookieJar::with_request_cookie(
            false,
            "tvRefreshToken",
            &sealed_cookie_value("REAL_RT"),
        );
        let mut fields = InboundTokenFields {
            code: None,
            refresh_token: Some(REDACTED_VALUE.to_string()),
        };

        relay(false).extract_token_request(Some(CLIENT_ID), &mut fields, Some(&mut jar));

        assert_eq!(fields.refresh_token.as_deref(), Some("REAL_RT"));
        assert!(jar.deleted.is_empty());
    }

    #[test]
    fn extract_discards_non_redacted_values_regardless_of_cookies() {
        let mut jar = MockCookieJar::with_request_cookie(
            false,
            "tvPkceCode",
            &sealed_cookie_value("REAL_CODE"),
        );
        let mut fields = InboundTokenFields {
            code: Some("attacker-supplied".to_string()),
            refresh_token: Some("also-forged".to_string()),
        };

        relay(false).extract_token_request(Some(CLIENT_ID), &mut fields, Some(&mut jar));

        assert!(fields.code.is_none());
        assert!(fields.refresh_token.is_none());
        assert!(jar.deleted.is_empty());
    }

    #[test]
    fn extract_leaves_other_clients_untouched() {
        let mut jar = MockCookieJar::default();
        let mut fields = InboundTokenFields {
            code: Some(REDACTED_VALUE.to_string()),
            refresh_token: Some(REDACTED_VALUE.to_string()),
        };

        relay(false).extract_token_request(Some("other-client"), &mut fields, Some(&mut jar));

        assert_eq!(fields.code.as_deref(), Some(REDACTED_VALUE));
        assert_eq!(fields.refresh_token.as_deref(), Some(REDACTED_VALUE));
    }

    #[test]
    fn extract_with_missing_cookie_fails_closed() {
        let mut jar = MockCookieJar::default();
        let mut fields =
            InboundTokenFields { code: Some(REDACTED_VALUE.to_string()), refresh_token: None };

        relay(false).extract_token_request(Some(CLIENT_ID), &mut fields, Some(&mut jar));

        assert!(fields.code.is_none());
        assert!(jar.deleted.is_empty());
    }

    #[test]
    fn extract_reads_prefixed_cookie_under_https_policy() {
        let mut jar = MockCookieJar::with_request_cookie(
            true,
            "__Host-tvPkceCode",
            &sealed_cookie_value("REAL_CODE"),
        );
        let mut fields =
            InboundTokenFields { code: Some(REDACTED_VALUE.to_string()), refresh_token: None };

        relay(false).extract_token_request(Some(CLIENT_ID), &mut fields, Some(&mut jar));

        assert_eq!(fields.code.as_deref(), Some("REAL_CODE"));
        assert!(jar.deleted.contains("__Host-tvPkceCode"));
        assert!(!jar.deleted.contains("tvPkceCode"));
    }

    #[test]
    fn authentication_passes_real_tokens_through() {
        let mut jar = MockCookieJar::default();
        let mut token = Some("actual-access-token".to_string());

        relay(false).process_authentication(&mut token, Some(&mut jar));

        assert_eq!(token.as_deref(), Some("actual-access-token"));
    }

    #[test]
    fn authentication_restores_marker_from_cookie_without_deleting() {
        let mut jar = MockCookieJar::with_request_cookie(
            false,
            "tvAccessToken",
            &sealed_cookie_value("AT1"),
        );
        let mut token = Some(REDACTED_VALUE.to_string());

        relay(false).process_authentication(&mut token, Some(&mut jar));

        assert_eq!(token.as_deref(), Some("AT1"));
        assert!(jar.deleted.is_empty());
    }

    #[test]
    fn authentication_with_tampered_cookie_fails_closed() {
        let mut jar =
            MockCookieJar::with_request_cookie(false, "tvAccessToken", "AAAA_not_sealed");
        let mut token = Some(REDACTED_VALUE.to_string());

        relay(false).process_authentication(&mut token, Some(&mut jar));

        assert!(token.is_none());
    }

    #[test]
    fn logout_deletes_both_token_cookies() {
        let mut jar = MockCookieJar::default();

        relay(false).logout(Some(&mut jar));

        assert!(jar.deleted.contains("tvAccessToken"));
        assert!(jar.deleted.contains("tvRefreshToken"));
        // The code cookie is one-shot and not part of logout
        assert!(!jar.deleted.contains("tvPkceCode"));
    }

    #[test]
    fn logout_respects_https_policy_for_cookie_names() {
        for (force_https, is_https, expect_prefix) in [
            (true, false, true),
            (true, true, true),
            (false, true, true),
            (false, false, false),
        ] {
            let mut jar = MockCookieJar { https: is_https, ..MockCookieJar::default() };
            relay(force_https).logout(Some(&mut jar));

            let expected_access =
                if expect_prefix { "__Host-tvAccessToken" } else { "tvAccessToken" };
            let expected_refresh =
                if expect_prefix { "__Host-tvRefreshToken" } else { "tvRefreshToken" };
            assert!(jar.deleted.contains(expected_access));
            assert!(jar.deleted.contains(expected_refresh));
            assert_eq!(jar.deleted.len(), 2);
        }
    }

    #[test]
    fn hooks_without_http_context_are_no_ops() {
        let relay = relay(true);

        let mut fields = IssuedTokenFields {
            access_token: Some("AT1".to_string()),
            refresh_token: Some("RT1".to_string()),
        };
        relay.apply_token_response(Some(CLIENT_ID), &mut fields, None);
        assert_eq!(fields.access_token.as_deref(), Some("AT1"));

        let mut code = Some("C1".to_string());
        relay.apply_authorization_response(Some(CLIENT_ID), &mut code, None);
        assert_eq!(code.as_deref(), Some("C1"));

        let mut inbound =
            InboundTokenFields { code: Some(REDACTED_VALUE.to_string()), refresh_token: None };
        relay.extract_token_request(Some(CLIENT_ID), &mut inbound, None);
        assert_eq!(inbound.code.as_deref(), Some(REDACTED_VALUE));

        let mut token = Some(REDACTED_VALUE.to_string());
        relay.process_authentication(&mut token, None);
        assert_eq!(token.as_deref(), Some(REDACTED_VALUE));

        relay.logout(None);
    }
}
