//! Opens and finishes cart sessions against the store.

use std::sync::Arc;

use crate::domain::{CartKey, CartRecord, CartState, ExpiryPolicy};
use crate::error::CartError;
use crate::identity::{CookieIntent, IdentityResolver, RequestContext};
use crate::persistence::CachedCartStore;
use crate::validation::Extensions;

use super::CartSession;

/// What a finished session hands back to the HTTP layer.
#[derive(Debug, Clone)]
pub struct SessionReceipt {
    /// Resolved cart key, echoed in `X-Cart-Key`.
    pub key: CartKey,
    /// Cart contents after the request.
    pub state: CartState,
    /// `Set-Cookie` value, if the cookie must change.
    pub cookie: Option<String>,
    /// Whether a record exists for the cart after the request.
    pub stored: bool,
}

/// Loads, renews, migrates and saves carts.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: CachedCartStore,
    resolver: Arc<IdentityResolver>,
    policy: ExpiryPolicy,
    source: String,
    extensions: Extensions,
}

impl SessionManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(
        store: CachedCartStore,
        resolver: Arc<IdentityResolver>,
        policy: ExpiryPolicy,
        source: impl Into<String>,
        extensions: Extensions,
    ) -> Self {
        Self {
            store,
            resolver,
            policy,
            source: source.into(),
            extensions,
        }
    }

    /// Identity resolver.
    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &CachedCartStore {
        &self.store
    }

    /// Resolves the request's cart and loads it.
    ///
    /// A record inside its renewal window is extended by a full TTL. When an
    /// authenticated request carries a guest cookie for another cart, the
    /// guest cart is merged in; its record is deleted once the merged cart
    /// is saved. Merged lines are not validated here, see
    /// [`CartSession::was_migrated`].
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidInput`] for a malformed explicit key, or
    /// [`CartError::StorageFailure`] if the store fails.
    pub async fn open(&self, ctx: &RequestContext, now: i64) -> Result<CartSession, CartError> {
        let resolution = self.resolver.resolve(ctx, now)?;
        let record = self.store.get(&resolution.key, now).await?;
        let migrate_from = resolution.migrate_from.clone();
        let mut session = CartSession::new(resolution, record);

        if let Some(guest_key) = migrate_from {
            if let Some(guest) = self.store.get(&guest_key, now).await? {
                tracing::info!(
                    from = %guest_key,
                    to = %session.key(),
                    lines = guest.state.items.len(),
                    "merging guest cart into user cart"
                );
                session.state_mut().absorb(guest.state);
                session.migrated = true;
            }
            session.pending_delete = Some(guest_key);
        }

        if let Some(record) = &mut session.record
            && record.needs_renewal(now)
        {
            record.renew(now, self.policy);
            session.renewed = true;
            session.dirty = true;
            tracing::debug!(cart_key = %record.cart_key, expires_at = record.expires_at, "renewed cart expiry");
        }

        Ok(session)
    }

    /// Saves the session (at most once) and computes the cookie to send.
    ///
    /// Nothing is written unless the cart changed. An empty cart that has
    /// never been stored is not written at all; one that was stored is
    /// written so its old lines do not come back.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the store fails, or
    /// [`CartError::Conflict`] if a cleared cart still has lines when read
    /// back.
    pub async fn finish(&self, session: CartSession, now: i64) -> Result<SessionReceipt, CartError> {
        let CartSession {
            resolution,
            mut state,
            record,
            dirty,
            renewed: _,
            force_persist,
            verify_empty,
            pending_delete,
            migrated: _,
        } = session;

        let was_stored = record.is_some();
        let should_write = force_persist || (dirty && (was_stored || !state.is_empty()));

        let stored = if should_write {
            self.extensions.pre_persist(&resolution.key, &mut state);
            let record = match record {
                Some(mut record) => {
                    record.state = state;
                    if record.owner_user_id.is_none() {
                        record = record.with_owner(resolution.user_id);
                    }
                    record
                }
                None => CartRecord::new(
                    resolution.key.clone(),
                    state,
                    now,
                    self.policy,
                    self.source.clone(),
                )
                .with_owner(resolution.user_id),
            };
            let saved = self.store.upsert(record, now).await?;
            tracing::debug!(cart_key = %saved.cart_key, hash = %saved.content_hash, "saved cart");
            state = saved.state;
            true
        } else {
            was_stored
        };

        if let Some(guest_key) = pending_delete
            && guest_key != resolution.key
        {
            self.store.delete(&guest_key).await?;
        }

        if verify_empty {
            let fresh = self.store.get_fresh(&resolution.key, now).await?;
            if fresh.is_some_and(|record| !record.state.is_empty()) {
                tracing::warn!(cart_key = %resolution.key, "cart still has lines after clear");
                return Err(CartError::conflict(
                    "cart_clear_conflict",
                    "The cart could not be emptied because it was modified concurrently.",
                ));
            }
        }

        let cookie = match resolution.cookie {
            CookieIntent::Issue if stored => {
                Some(self.resolver.issue_cookie_header(&resolution.key, now))
            }
            CookieIntent::Clear => Some(self.resolver.clear_cookie_header()),
            CookieIntent::Issue | CookieIntent::None => None,
        };

        Ok(SessionReceipt {
            key: resolution.key,
            state,
            cookie,
            stored,
        })
    }

    /// Deletes the session's cart and clears the cookie.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the store fails.
    pub async fn destroy(&self, session: CartSession) -> Result<SessionReceipt, CartError> {
        let key = session.resolution.key.clone();
        let deleted = self.store.delete(&key).await?;
        if let Some(guest_key) = &session.pending_delete
            && *guest_key != key
        {
            self.store.delete(guest_key).await?;
        }
        tracing::info!(cart_key = %key, deleted, "destroyed cart");
        Ok(SessionReceipt {
            key,
            state: CartState::default(),
            cookie: Some(self.resolver.clear_cookie_header()),
            stored: false,
        })
    }

    /// Deletes expired carts.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StorageFailure`] if the store fails.
    pub async fn sweep(&self, now: i64) -> Result<u64, CartError> {
        self.store.sweep(now).await
    }
}
