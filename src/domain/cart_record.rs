//! Persisted cart record with expiry bookkeeping.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CartKey, CartState};

/// Expiry policy applied to cart records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Lifetime of a cart from its last renewal, in seconds.
    pub ttl_secs: i64,
    /// Length of the window before expiry in which a request renews the
    /// cart, in seconds.
    pub renewal_window_secs: i64,
}

impl ExpiryPolicy {
    /// Builds a policy from a TTL and the fraction of it that forms the
    /// renewal window. The ratio is clamped to `0.0..=1.0`.
    #[must_use]
    pub fn new(ttl_secs: i64, renewal_ratio: f64) -> Self {
        let ttl_secs = ttl_secs.max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let renewal_window_secs = (ttl_secs as f64 * renewal_ratio.clamp(0.0, 1.0)).round() as i64;
        Self {
            ttl_secs,
            renewal_window_secs,
        }
    }

    /// `(expires_at, expiring_at)` for a cart renewed at `now`.
    #[must_use]
    pub const fn deadlines(&self, now: i64) -> (i64, i64) {
        let expires_at = now + self.ttl_secs;
        (expires_at, expires_at - self.renewal_window_secs)
    }
}

/// A row of the cart store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartRecord {
    /// Surrogate row id, assigned by the store on first insert.
    pub id: Option<i64>,
    /// Unique cart identity.
    pub cart_key: CartKey,
    /// Owning user for authenticated carts.
    pub owner_user_id: Option<i64>,
    /// External customer reference, if the platform links one.
    pub customer_ref: Option<String>,
    /// Serialized cart contents.
    pub state: CartState,
    /// Creation time (epoch seconds).
    pub created_at: i64,
    /// Time after which the record is treated as absent (epoch seconds).
    pub expires_at: i64,
    /// Start of the renewal window (epoch seconds).
    pub expiring_at: i64,
    /// Provenance tag, informational only.
    pub source: String,
    /// Digest of lines and totals as of the last save.
    pub content_hash: String,
}

impl CartRecord {
    /// Creates a fresh record for `cart_key` at `now`.
    #[must_use]
    pub fn new(
        cart_key: CartKey,
        state: CartState,
        now: i64,
        policy: ExpiryPolicy,
        source: impl Into<String>,
    ) -> Self {
        let (expires_at, expiring_at) = policy.deadlines(now);
        let content_hash = state.content_hash();
        Self {
            id: None,
            cart_key,
            owner_user_id: None,
            customer_ref: None,
            state,
            created_at: now,
            expires_at,
            expiring_at,
            source: source.into(),
            content_hash,
        }
    }

    /// Records the authenticated owner of the cart.
    #[must_use]
    pub fn with_owner(mut self, user_id: Option<u64>) -> Self {
        self.owner_user_id = user_id.and_then(|id| i64::try_from(id).ok());
        self
    }

    /// Returns `true` once `expires_at` has passed.
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }

    /// Returns `true` when `now` is inside the renewal window.
    #[must_use]
    pub const fn needs_renewal(&self, now: i64) -> bool {
        now >= self.expiring_at
    }

    /// Extends the expiry by a full TTL from `now`.
    pub fn renew(&mut self, now: i64, policy: ExpiryPolicy) {
        let (expires_at, expiring_at) = policy.deadlines(now);
        self.expires_at = expires_at;
        self.expiring_at = expiring_at;
    }

    /// Recomputes `content_hash` from the current state.
    pub fn seal(&mut self) {
        self.content_hash = self.state.content_hash();
    }

    /// Time left before expiry, `None` if already expired.
    #[must_use]
    pub fn remaining_ttl(&self, now: i64) -> Option<Duration> {
        let remaining = self.expires_at - now;
        u64::try_from(remaining)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ExpiryPolicy {
        ExpiryPolicy::new(1_000, 0.15)
    }

    #[test]
    fn deadlines_follow_ttl_and_window() {
        let p = policy();
        assert_eq!(p.renewal_window_secs, 150);
        assert_eq!(p.deadlines(100), (1_100, 950));
    }

    #[test]
    fn owner_is_only_set_explicitly() {
        let explicit = CartRecord::new(
            CartKey::for_user(17),
            CartState::default(),
            0,
            policy(),
            "api",
        );
        assert_eq!(explicit.owner_user_id, None);

        let owned = explicit.with_owner(Some(17));
        assert_eq!(owned.owner_user_id, Some(17));
    }

    #[test]
    fn expiry_and_renewal_window() {
        let mut record = CartRecord::new(
            CartKey::generate(),
            CartState::default(),
            0,
            policy(),
            "api",
        );
        assert!(!record.needs_renewal(900));
        assert!(record.needs_renewal(950));
        assert!(!record.is_expired(1_000));
        assert!(record.is_expired(1_001));
        assert_eq!(record.remaining_ttl(1_000), None);
        assert_eq!(record.remaining_ttl(400), Some(Duration::from_secs(600)));

        record.renew(960, policy());
        assert_eq!(record.expires_at, 1_960);
        assert!(!record.needs_renewal(961));
    }
}
