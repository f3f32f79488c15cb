//! Decides which cart a request addresses.
//!
//! Priority, first match wins:
//!
//! 1. a valid bearer token: the user's own cart,
//! 2. an explicit key from the `X-Cart-Key` header or `cart_key` query,
//! 3. a valid signed guest cookie,
//! 4. a freshly generated guest key.

use axum::http::HeaderMap;

use super::auth::bearer_token;
use super::cookie::extract_cookie_value;
use super::{CookieSettings, SessionCookie, Signer, TokenAuthenticator};
use crate::domain::{CartKey, ExpiryPolicy};
use crate::error::CartError;

/// Header carrying an explicit cart key, echoed on every response.
pub const CART_KEY_HEADER: &str = "x-cart-key";

/// Identity-bearing parts of an HTTP request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Raw bearer token.
    pub bearer: Option<String>,
    /// `X-Cart-Key` header value.
    pub header_key: Option<String>,
    /// `cart_key` query parameter.
    pub query_key: Option<String>,
    /// Raw session cookie value.
    pub cookie: Option<String>,
}

impl RequestContext {
    /// Collects the identity inputs from request headers and the optional
    /// `cart_key` query parameter.
    #[must_use]
    pub fn from_parts(headers: &HeaderMap, query_key: Option<&str>, cookie_name: &str) -> Self {
        Self {
            bearer: bearer_token(headers).map(str::to_string),
            header_key: headers
                .get(CART_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            query_key: query_key.map(str::to_string),
            cookie: extract_cookie_value(headers, cookie_name).map(str::to_string),
        }
    }

    fn explicit_key(&self) -> Option<&str> {
        [self.header_key.as_deref(), self.query_key.as_deref()]
            .into_iter()
            .flatten()
            .find(|key| !key.trim().is_empty())
    }
}

/// How the cart key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Bearer token.
    Authenticated,
    /// Header or query parameter.
    Explicit,
    /// Signed guest cookie.
    Cookie,
    /// Newly generated guest key.
    Generated,
}

/// What to do with the session cookie on the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieIntent {
    /// Leave it alone.
    None,
    /// Set (or refresh) it for the resolved key.
    Issue,
    /// Delete it.
    Clear,
}

/// Outcome of identity resolution, computed once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Cart addressed by the request.
    pub key: CartKey,
    /// Where the key came from.
    pub source: IdentitySource,
    /// Authenticated user, if any.
    pub user_id: Option<u64>,
    /// Cookie action for the response.
    pub cookie: CookieIntent,
    /// Guest cart to merge into the user's cart.
    pub migrate_from: Option<CartKey>,
}

/// Resolves cart identity from a [`RequestContext`].
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    signer: Signer,
    auth: TokenAuthenticator,
    cookie: CookieSettings,
    policy: ExpiryPolicy,
}

impl IdentityResolver {
    /// Creates a resolver. The same secret signs cookies and tokens.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>, cookie: CookieSettings, policy: ExpiryPolicy) -> Self {
        let signer = Signer::new(secret);
        Self {
            auth: TokenAuthenticator::new(signer.clone()),
            signer,
            cookie,
            policy,
        }
    }

    /// Token authenticator sharing this resolver's secret.
    #[must_use]
    pub fn authenticator(&self) -> &TokenAuthenticator {
        &self.auth
    }

    /// Name of the session cookie.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie.name
    }

    /// Resolves the request's cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidInput`] if an explicit key is malformed.
    /// Bad tokens and cookies are ignored rather than reported, as are
    /// explicit keys naming a user cart when no valid token is presented.
    pub fn resolve(&self, ctx: &RequestContext, now: i64) -> Result<Resolution, CartError> {
        let guest = ctx
            .cookie
            .as_deref()
            .and_then(|raw| SessionCookie::decode(raw, &self.signer, now));

        if let Some(user_id) = ctx
            .bearer
            .as_deref()
            .and_then(|token| self.auth.authenticate(token))
        {
            let key = CartKey::for_user(user_id);
            let (cookie, migrate_from) = match guest {
                Some(guest) if guest.key != key => (CookieIntent::Clear, Some(guest.key)),
                Some(_) => (CookieIntent::Clear, None),
                None => (CookieIntent::None, None),
            };
            return Ok(Resolution {
                key,
                source: IdentitySource::Authenticated,
                user_id: Some(user_id),
                cookie,
                migrate_from,
            });
        }

        if let Some(raw) = ctx.explicit_key() {
            let key = CartKey::parse(raw)?;
            if key.is_user_key() {
                // User carts are reachable only with that user's token.
                tracing::warn!(
                    key = %key,
                    "ignoring explicit user cart key without a bearer token"
                );
            } else {
                return Ok(Resolution {
                    key,
                    source: IdentitySource::Explicit,
                    user_id: None,
                    cookie: CookieIntent::None,
                    migrate_from: None,
                });
            }
        }

        if let Some(guest) = guest {
            let cookie = if guest.needs_renewal(now) {
                CookieIntent::Issue
            } else {
                CookieIntent::None
            };
            return Ok(Resolution {
                key: guest.key,
                source: IdentitySource::Cookie,
                user_id: None,
                cookie,
                migrate_from: None,
            });
        }

        Ok(Resolution {
            key: CartKey::generate(),
            source: IdentitySource::Generated,
            user_id: None,
            cookie: CookieIntent::Issue,
            migrate_from: None,
        })
    }

    /// `Set-Cookie` value binding `key` to the client until a full TTL from
    /// `now`.
    #[must_use]
    pub fn issue_cookie_header(&self, key: &CartKey, now: i64) -> String {
        let (expires_at, expiring_at) = self.policy.deadlines(now);
        let cookie = SessionCookie {
            key: key.clone(),
            expires_at,
            expiring_at,
        };
        self.cookie.issue_header(&cookie, &self.signer, now)
    }

    /// `Set-Cookie` value deleting the session cookie.
    #[must_use]
    pub fn clear_cookie_header(&self) -> String {
        self.cookie.clear_header()
    }

    /// Signed cookie value for `key`, as a client would send it back.
    #[must_use]
    pub fn cookie_value(&self, key: &CartKey, now: i64) -> String {
        let (expires_at, expiring_at) = self.policy.deadlines(now);
        SessionCookie {
            key: key.clone(),
            expires_at,
            expiring_at,
        }
        .encode(&self.signer)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(
            "secret",
            CookieSettings {
                name: "cart_session".to_string(),
                secure: false,
            },
            ExpiryPolicy::new(1_000, 0.2),
        )
    }

    fn key(raw: &str) -> CartKey {
        let Ok(key) = CartKey::parse(raw) else {
            panic!("valid key {raw}");
        };
        key
    }

    #[test]
    fn no_inputs_generate_a_guest_key_and_issue_cookie() {
        let Ok(resolution) = resolver().resolve(&RequestContext::default(), 0) else {
            panic!("resolution failed");
        };
        assert_eq!(resolution.source, IdentitySource::Generated);
        assert_eq!(resolution.cookie, CookieIntent::Issue);
        assert_eq!(resolution.key.as_str().len(), 32);
    }

    #[test]
    fn cookie_resolution_is_repeatable() {
        let r = resolver();
        let ctx = RequestContext {
            cookie: Some(r.cookie_value(&key("guest1"), 0)),
            ..RequestContext::default()
        };
        let (Ok(first), Ok(second)) = (r.resolve(&ctx, 10), r.resolve(&ctx, 10)) else {
            panic!("resolution failed");
        };
        assert_eq!(first, second);
        assert_eq!(first.key, key("guest1"));
        assert_eq!(first.cookie, CookieIntent::None);
    }

    #[test]
    fn cookie_in_renewal_window_is_reissued() {
        let r = resolver();
        let ctx = RequestContext {
            cookie: Some(r.cookie_value(&key("guest1"), 0)),
            ..RequestContext::default()
        };
        let Ok(resolution) = r.resolve(&ctx, 900) else {
            panic!("resolution failed");
        };
        assert_eq!(resolution.cookie, CookieIntent::Issue);
    }

    #[test]
    fn header_beats_query_and_cookie() {
        let r = resolver();
        let ctx = RequestContext {
            header_key: Some("from-header".to_string()),
            query_key: Some("from-query".to_string()),
            cookie: Some(r.cookie_value(&key("guest1"), 0)),
            ..RequestContext::default()
        };
        let Ok(resolution) = r.resolve(&ctx, 0) else {
            panic!("resolution failed");
        };
        assert_eq!(resolution.key, key("from-header"));
        assert_eq!(resolution.source, IdentitySource::Explicit);
        assert_eq!(resolution.cookie, CookieIntent::None);
    }

    #[test]
    fn malformed_explicit_key_is_rejected() {
        let ctx = RequestContext {
            query_key: Some("x".repeat(65)),
            ..RequestContext::default()
        };
        let Err(err) = resolver().resolve(&ctx, 0) else {
            panic!("overlong key must be rejected");
        };
        assert_eq!(err.error_code(), "cart_invalid_key");
    }

    #[test]
    fn numeric_explicit_key_needs_a_token() {
        let r = resolver();
        let ctx = RequestContext {
            header_key: Some("7".to_string()),
            cookie: Some(r.cookie_value(&key("guest1"), 0)),
            ..RequestContext::default()
        };
        let Ok(resolution) = r.resolve(&ctx, 0) else {
            panic!("resolution failed");
        };
        assert_eq!(resolution.key, key("guest1"));
        assert_eq!(resolution.source, IdentitySource::Cookie);

        let bare = RequestContext {
            query_key: Some("7".to_string()),
            ..RequestContext::default()
        };
        let Ok(resolution) = r.resolve(&bare, 0) else {
            panic!("resolution failed");
        };
        assert_eq!(resolution.source, IdentitySource::Generated);
        assert_ne!(resolution.key, CartKey::for_user(7));
    }

    #[test]
    fn authenticated_user_migrates_guest_cookie() {
        let r = resolver();
        let ctx = RequestContext {
            bearer: Some(r.authenticator().issue(7)),
            header_key: Some("ignored".to_string()),
            cookie: Some(r.cookie_value(&key("guest1"), 0)),
            ..RequestContext::default()
        };
        let Ok(resolution) = r.resolve(&ctx, 0) else {
            panic!("resolution failed");
        };
        assert_eq!(resolution.key, CartKey::for_user(7));
        assert_eq!(resolution.user_id, Some(7));
        assert_eq!(resolution.migrate_from, Some(key("guest1")));
        assert_eq!(resolution.cookie, CookieIntent::Clear);
    }

    #[test]
    fn invalid_token_falls_through_to_cookie() {
        let r = resolver();
        let ctx = RequestContext {
            bearer: Some("7.forged".to_string()),
            cookie: Some(r.cookie_value(&key("guest1"), 0)),
            ..RequestContext::default()
        };
        let Ok(resolution) = r.resolve(&ctx, 0) else {
            panic!("resolution failed");
        };
        assert_eq!(resolution.source, IdentitySource::Cookie);
        assert_eq!(resolution.user_id, None);
    }
}
