//! Per-request cart session.

use crate::domain::{CartKey, CartRecord, CartState};
use crate::identity::Resolution;

/// Cart loaded for one request.
///
/// Created by [`super::SessionManager::open`] and consumed by
/// [`super::SessionManager::finish`], so a request saves at most once.
#[derive(Debug)]
pub struct CartSession {
    pub(super) resolution: Resolution,
    pub(super) state: CartState,
    pub(super) record: Option<CartRecord>,
    pub(super) dirty: bool,
    pub(super) renewed: bool,
    pub(super) force_persist: bool,
    pub(super) verify_empty: bool,
    pub(super) pending_delete: Option<CartKey>,
    pub(super) migrated: bool,
}

impl CartSession {
    pub(super) fn new(resolution: Resolution, record: Option<CartRecord>) -> Self {
        let state = record
            .as_ref()
            .map(|record| record.state.clone())
            .unwrap_or_default();
        Self {
            resolution,
            state,
            record,
            dirty: false,
            renewed: false,
            force_persist: false,
            verify_empty: false,
            pending_delete: None,
            migrated: false,
        }
    }

    /// Key of the cart this session addresses.
    #[must_use]
    pub fn key(&self) -> &CartKey {
        &self.resolution.key
    }

    /// Identity resolution for the request.
    #[must_use]
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Current cart contents.
    #[must_use]
    pub fn state(&self) -> &CartState {
        &self.state
    }

    /// Mutable cart contents. Marks the session dirty.
    pub fn state_mut(&mut self) -> &mut CartState {
        self.dirty = true;
        &mut self.state
    }

    /// Returns `true` if a record for this cart existed when the session
    /// was opened.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.record.is_some()
    }

    /// Returns `true` if the cart changed since it was loaded.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns `true` if the expiry was extended on load.
    #[must_use]
    pub fn was_renewed(&self) -> bool {
        self.renewed
    }

    /// Returns `true` if a guest cart was merged in on load. Merged lines
    /// have not been checked against product limits yet.
    #[must_use]
    pub fn was_migrated(&self) -> bool {
        self.migrated
    }

    /// Requests a write even for an empty cart, followed by a check that
    /// the stored cart really is empty.
    pub fn require_empty_persist(&mut self) {
        self.dirty = true;
        self.force_persist = true;
        self.verify_empty = true;
    }
}
