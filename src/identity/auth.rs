//! Bearer token authentication.
//!
//! Tokens have the form `{user_id}.{signature}` where the signature is the
//! base64url HMAC of the decimal user id. An invalid token authenticates
//! nobody; it is never an error.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use super::Signer;

/// Issues and checks bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    signer: Signer,
}

impl TokenAuthenticator {
    /// Creates an authenticator sharing `signer`'s secret.
    #[must_use]
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    /// Token for `user_id`.
    #[must_use]
    pub fn issue(&self, user_id: u64) -> String {
        let subject = user_id.to_string();
        let signature = self.signer.sign(&subject);
        format!("{subject}.{signature}")
    }

    /// Returns the user id a token authenticates.
    #[must_use]
    pub fn authenticate(&self, token: &str) -> Option<u64> {
        let (subject, signature) = token.trim().split_once('.')?;
        let user_id: u64 = subject.parse().ok()?;
        if user_id == 0 || !self.signer.verify(subject, signature) {
            return None;
        }
        Some(user_id)
    }
}

/// Extracts the token from an `Authorization: Bearer ...` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}
