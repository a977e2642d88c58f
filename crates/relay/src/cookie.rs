//! Cookie naming, attributes, and the cookie-jar capability
//!
//! The relay never touches an ambient HTTP context; every hook receives an
//! explicit [`CookieJar`] for the current request/response pair. Cookie
//! names are computed by the same pure function at write and read time,
//! because HTTPS-ness can differ between the issuance request and a later
//! resource request behind a TLS-terminating proxy.

/// Opaque marker substituted for any secret exposed to the browser.
///
/// Kept deliberately outside the base64/JWT alphabets so the issuance
/// pipeline can never produce it as a real value.
pub const REDACTED_VALUE: &str = "[redacted]";

/// Prefix applied to cookie names on HTTPS deployments (`__Host-` binds the
/// cookie to the host, Secure, and Path=/).
pub const SECURE_COOKIE_PREFIX: &str = "__Host-";

/// Base name of the access-token cookie.
pub const ACCESS_TOKEN_COOKIE: &str = "tvAccessToken";

/// Base name of the refresh-token cookie.
pub const REFRESH_TOKEN_COOKIE: &str = "tvRefreshToken";

/// Base name of the PKCE authorization-code cookie.
pub const PKCE_CODE_COOKIE: &str = "tvPkceCode";

/// Logical kind of a relayed secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bearer access token
    Access,
    /// Refresh token (multi-use until rotated or expired)
    Refresh,
    /// One-shot authorization code
    PkceCode,
}

impl TokenKind {
    /// Base cookie name for this kind, before any secure prefixing.
    #[must_use]
    pub fn base_cookie_name(self) -> &'static str {
        match self {
            Self::Access => ACCESS_TOKEN_COOKIE,
            Self::Refresh => REFRESH_TOKEN_COOKIE,
            Self::PkceCode => PKCE_CODE_COOKIE,
        }
    }
}

/// Compute the cookie name for the current deployment and request.
///
/// The secure-prefixed variant applies whenever the deployment forces HTTPS
/// OR the current request already is HTTPS. Must be applied identically at
/// write time and read time; a mismatch surfaces as "cookie not found" and
/// is handled fail-closed by the callers.
#[must_use]
pub fn cookie_name_for(base: &str, force_https: bool, is_current_request_https: bool) -> String {
    if force_https || is_current_request_https {
        format!("{SECURE_COOKIE_PREFIX}{base}")
    } else {
        base.to_string()
    }
}

/// SameSite attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Attributes attached to a written cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl CookieAttributes {
    /// Attributes for relay token cookies: HttpOnly, SameSite=Strict,
    /// Path=/, Secure when the secure-prefixed name is in use.
    #[must_use]
    pub fn for_token(secure: bool) -> Self {
        Self { http_only: true, secure, same_site: SameSite::Strict, path: "/".to_string() }
    }
}

/// Cookie surface of the current request/response pair.
///
/// A narrow capability instead of an HTTP framework type, so the relay is
/// testable without a server and portable across pipelines.
pub trait CookieJar {
    /// Value of an incoming request cookie, if present.
    fn request_cookie(&self, name: &str) -> Option<String>;

    /// Queue an outgoing Set-Cookie for the response.
    fn append(&mut self, name: &str, value: &str, attributes: CookieAttributes);

    /// Queue deletion of a cookie (expired Set-Cookie) on the response.
    fn delete(&mut self, name: &str);

    /// Whether the current request arrived over HTTPS.
    fn is_https(&self) -> bool;
}

#[cfg(test)]
mod tests {
    //! Unit tests for cookie.
    use super::*;

    #[test]
    fn secure_prefix_truth_table() {
        // Prefixed whenever either flag is set
        assert_eq!(cookie_name_for("tvAccessToken", true, false), "__Host-tvAccessToken");
        assert_eq!(cookie_name_for("tvAccessToken", false, true), "__Host-tvAccessToken");
        assert_eq!(cookie_name_for("tvAccessToken", true, true), "__Host-tvAccessToken");

        // Plain only when both are off
        assert_eq!(cookie_name_for("tvAccessToken", false, false), "tvAccessToken");
    }

    #[test]
    fn kinds_map_to_distinct_base_names() {
        let names = [
            TokenKind::Access.base_cookie_name(),
            TokenKind::Refresh.base_cookie_name(),
            TokenKind::PkceCode.base_cookie_name(),
        ];

        assert_eq!(names, ["tvAccessToken", "tvRefreshToken", "tvPkceCode"]);
    }

    #[test]
    fn token_attributes_are_host_locked() {
        let attributes = CookieAttributes::for_token(true);

        assert!(attributes.http_only);
        assert!(attributes.secure);
        assert_eq!(attributes.same_site, SameSite::Strict);
        assert_eq!(attributes.path, "/");
    }

    #[test]
    fn marker_avoids_token_alphabets() {
        // Square brackets cannot appear in base64 or JWT payloads
        assert!(REDACTED_VALUE.starts_with('['));
        assert!(REDACTED_VALUE.ends_with(']'));
    }
}
