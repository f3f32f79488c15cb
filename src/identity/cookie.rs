//! Signed guest session cookie.
//!
//! Value layout: `{cart_key}||{expires_at}||{expiring_at}||{signature}`,
//! where the signature covers `{cart_key}|{expires_at}`.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

use super::Signer;
use crate::domain::CartKey;

const SEPARATOR: &str = "||";

/// Decoded contents of a guest session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Guest cart key.
    pub key: CartKey,
    /// Cookie expiry (epoch seconds).
    pub expires_at: i64,
    /// Start of the cookie's renewal window (epoch seconds).
    pub expiring_at: i64,
}

impl SessionCookie {
    /// Serializes and signs the cookie value.
    #[must_use]
    pub fn encode(&self, signer: &Signer) -> String {
        let signature = signer.sign(&Self::signed_part(&self.key, self.expires_at));
        format!(
            "{key}{SEPARATOR}{expires}{SEPARATOR}{expiring}{SEPARATOR}{signature}",
            key = self.key,
            expires = self.expires_at,
            expiring = self.expiring_at,
        )
    }

    /// Parses and verifies a cookie value. Malformed, forged or expired
    /// values yield `None`.
    #[must_use]
    pub fn decode(raw: &str, signer: &Signer, now: i64) -> Option<Self> {
        let raw = raw.replace("%7C", "|").replace("%7c", "|");
        let mut parts = raw.split(SEPARATOR);
        let key = parts.next()?;
        let expires_at: i64 = parts.next()?.parse().ok()?;
        let expiring_at: i64 = parts.next()?.parse().ok()?;
        let signature = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let key = CartKey::parse(key).ok()?;
        if !signer.verify(&Self::signed_part(&key, expires_at), signature) {
            return None;
        }
        if expires_at < now {
            return None;
        }
        Some(Self {
            key,
            expires_at,
            expiring_at,
        })
    }

    /// Returns `true` when `now` falls in the renewal window.
    #[must_use]
    pub const fn needs_renewal(&self, now: i64) -> bool {
        now >= self.expiring_at
    }

    fn signed_part(key: &CartKey, expires_at: i64) -> String {
        format!("{key}|{expires_at}")
    }
}

/// Name and attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Cookie name.
    pub name: String,
    /// Adds the `Secure` attribute.
    pub secure: bool,
}

impl CookieSettings {
    /// `Set-Cookie` value issuing `cookie`.
    #[must_use]
    pub fn issue_header(&self, cookie: &SessionCookie, signer: &Signer, now: i64) -> String {
        let max_age = (cookie.expires_at - now).max(0);
        self.header(&cookie.encode(signer), max_age)
    }

    /// `Set-Cookie` value deleting the cookie.
    #[must_use]
    pub fn clear_header(&self) -> String {
        self.header("", 0)
    }

    fn header(&self, value: &str, max_age: i64) -> String {
        let mut header = format!(
            "{}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax",
            self.name
        );
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// Finds the value of cookie `name` in the request's `Cookie` headers.
#[must_use]
pub fn extract_cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(cookie_name, _)| *cookie_name == name)
        .map(|(_, value)| value.trim_matches('"'))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn cookie(expires_at: i64) -> SessionCookie {
        let Ok(key) = CartKey::parse("guest1") else {
            panic!("valid key");
        };
        SessionCookie {
            key,
            expires_at,
            expiring_at: expires_at - 10,
        }
    }

    #[test]
    fn encoded_cookie_decodes() {
        let signer = Signer::new("secret");
        let raw = cookie(1_000).encode(&signer);
        assert_eq!(SessionCookie::decode(&raw, &signer, 500), Some(cookie(1_000)));
    }

    #[test]
    fn tampered_expired_or_malformed_cookie_is_ignored() {
        let signer = Signer::new("secret");
        let raw = cookie(1_000).encode(&signer);

        let tampered = raw.replacen("1000", "9000", 1);
        assert_eq!(SessionCookie::decode(&tampered, &signer, 500), None);
        assert_eq!(SessionCookie::decode(&raw, &signer, 1_001), None);
        assert_eq!(SessionCookie::decode("guest1||1000", &signer, 500), None);
        assert_eq!(SessionCookie::decode(&raw, &Signer::new("other"), 500), None);
    }

    #[test]
    fn percent_encoded_separators_are_accepted() {
        let signer = Signer::new("secret");
        let raw = cookie(1_000).encode(&signer).replace('|', "%7C");
        assert!(SessionCookie::decode(&raw, &signer, 500).is_some());
    }

    #[test]
    fn extracts_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; cart_session=abc||1||0||sig"),
        );
        assert_eq!(
            extract_cookie_value(&headers, "cart_session"),
            Some("abc||1||0||sig")
        );
        assert_eq!(extract_cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn headers_carry_attributes() {
        let settings = CookieSettings {
            name: "cart_session".to_string(),
            secure: true,
        };
        let issued = settings.issue_header(&cookie(1_000), &Signer::new("s"), 400);
        assert!(issued.starts_with("cart_session=guest1||1000||990||"));
        assert!(issued.contains("Max-Age=600"));
        assert!(issued.ends_with("; Secure"));
        assert!(settings.clear_header().contains("Max-Age=0"));
    }
}
