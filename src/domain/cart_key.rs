//! Type-safe cart identity.
//!
//! [`CartKey`] is a newtype around the string that names one shopper's
//! cart: a stringified user id, a generated guest key, or a key the client
//! presented explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CartError;

/// Unique identifier for a cart.
///
/// Used as the unique key in the cart store, the cache key, and the value
/// embedded in the guest session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartKey(String);

impl CartKey {
    /// Longest key accepted from a client.
    pub const MAX_LEN: usize = 64;

    /// Generates a new random guest key (32 lowercase hex characters from a
    /// v4 UUID).
    ///
    /// Never produces an all-digit key, so a guest key cannot collide with a
    /// user key.
    #[must_use]
    pub fn generate() -> Self {
        loop {
            let key = Self(uuid::Uuid::new_v4().simple().to_string());
            if !key.is_user_key() {
                return key;
            }
        }
    }

    /// Key of the cart owned by an authenticated user.
    #[must_use]
    pub fn for_user(user_id: u64) -> Self {
        Self(user_id.to_string())
    }

    /// Whether this key names an authenticated user's cart.
    #[must_use]
    pub fn is_user_key(&self) -> bool {
        self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// Validates a client-presented key.
    ///
    /// Surrounding whitespace is trimmed, so `" abc "` and `"abc"` address
    /// the same cart. After trimming the key is taken verbatim: it must be
    /// non-empty, at most [`Self::MAX_LEN`] bytes, printable ASCII and free
    /// of `|` (the cookie field separator). Keys failing those rules are
    /// rejected with 400 rather than rewritten, since a rewritten key could
    /// silently point at somebody else's cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidInput`] when the key is malformed.
    pub fn parse(raw: &str) -> Result<Self, CartError> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(CartError::invalid(
                "cart_invalid_key",
                "Cart key must not be empty.",
            ));
        }
        if key.len() > Self::MAX_LEN {
            return Err(CartError::invalid(
                "cart_invalid_key",
                format!("Cart key must be at most {} characters.", Self::MAX_LEN),
            ));
        }
        if !key.chars().all(|c| c.is_ascii_graphic() && c != '|') {
            return Err(CartError::invalid(
                "cart_invalid_key",
                "Cart key contains unsupported characters.",
            ));
        }
        Ok(Self(key.to_string()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CartKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
